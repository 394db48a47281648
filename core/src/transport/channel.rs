//! Star-topology channels.
//!
//! Rank 0 coordinates; ranks `1..world_size` are workers. Each worker has its own channel in
//! each direction with the coordinator and none with other workers.

use super::TransportError;
use crate::{Error, Result};
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use std::fmt;
use std::str::FromStr;

/// Send semantics of every link in a star.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    /// Zero-capacity: a send completes only when the matching receive does.
    Rendezvous,
    /// Unbounded: a send never blocks.
    #[default]
    Buffered,
}

impl FromStr for ChannelMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rendezvous" | "sync" => Ok(ChannelMode::Rendezvous),
            "buffered" | "async" => Ok(ChannelMode::Buffered),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown channel mode `{other}` (expected rendezvous or buffered)"
            ))),
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelMode::Rendezvous => write!(f, "rendezvous"),
            ChannelMode::Buffered => write!(f, "buffered"),
        }
    }
}

fn channel<M>(mode: ChannelMode) -> (Sender<M>, Receiver<M>) {
    match mode {
        ChannelMode::Rendezvous => bounded(0),
        ChannelMode::Buffered => unbounded(),
    }
}

/// Identity of one participant.
pub trait Endpoint {
    fn rank(&self) -> usize;

    fn world_size(&self) -> usize;
}

struct Link<M> {
    tx: Sender<M>,
    rx: Receiver<M>,
}

/// Rank 0's side of the star.
pub struct Coordinator<M> {
    world_size: usize,
    links: Vec<Link<M>>,
}

impl<M> Coordinator<M> {
    fn link(&self, rank: usize) -> std::result::Result<&Link<M>, TransportError> {
        rank.checked_sub(1)
            .and_then(|i| self.links.get(i))
            .ok_or(TransportError::UnknownPeer {
                rank,
                world_size: self.world_size,
            })
    }

    pub fn send(&self, rank: usize, msg: M) -> std::result::Result<(), TransportError> {
        self.link(rank)?
            .tx
            .send(msg)
            .map_err(|_| TransportError::Disconnected { rank })
    }

    pub fn recv(&self, rank: usize) -> std::result::Result<M, TransportError> {
        self.link(rank)?
            .rx
            .recv()
            .map_err(|_| TransportError::Disconnected { rank })
    }
}

impl<M> Endpoint for Coordinator<M> {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        self.world_size
    }
}

/// A worker rank's side of the star.
pub struct Worker<M> {
    rank: usize,
    world_size: usize,
    tx: Sender<M>,
    rx: Receiver<M>,
}

impl<M> Worker<M> {
    pub fn send(&self, msg: M) -> std::result::Result<(), TransportError> {
        self.tx
            .send(msg)
            .map_err(|_| TransportError::Disconnected { rank: 0 })
    }

    pub fn recv(&self) -> std::result::Result<M, TransportError> {
        self.rx
            .recv()
            .map_err(|_| TransportError::Disconnected { rank: 0 })
    }
}

impl<M> Endpoint for Worker<M> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }
}

/// All endpoints of a freshly wired star.
pub struct Star<M> {
    pub coordinator: Coordinator<M>,
    /// Ranks `1..world_size`, in order.
    pub workers: Vec<Worker<M>>,
}

/// Wires a star of `world_size` ranks.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] when `world_size == 0`.
pub fn star<M>(world_size: usize, mode: ChannelMode) -> Result<Star<M>> {
    if world_size == 0 {
        return Err(Error::InvalidConfiguration(
            "a star needs at least one rank".to_string(),
        ));
    }

    let mut links = Vec::with_capacity(world_size - 1);
    let mut workers = Vec::with_capacity(world_size - 1);
    for rank in 1..world_size {
        let (down_tx, down_rx) = channel(mode);
        let (up_tx, up_rx) = channel(mode);
        links.push(Link {
            tx: down_tx,
            rx: up_rx,
        });
        workers.push(Worker {
            rank,
            world_size,
            tx: up_tx,
            rx: down_rx,
        });
    }

    Ok(Star {
        coordinator: Coordinator { world_size, links },
        workers,
    })
}
