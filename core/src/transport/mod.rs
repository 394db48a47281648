//! # Transport
//!
//! Moves chunks of input to the worker that computes them and brings partial results back to
//! the coordinator. Both CPU strategies share one contract, [`Transport::exchange`]: given a
//! partition and a zeroed output buffer, run every chunk and leave every region filled.
//!
//! - [`SharedMemory`]: rayon workers borrow the input and their disjoint output region
//!   directly. Nothing is copied.
//! - [`MessagePassing`]: ranks in a star topology; every worker owns only what it was sent.

use crate::combine::OutputLayout;
use crate::partition::{ChunkDescriptor, Partition};
use crate::workload::Workload;
use crate::Result;
use thiserror::Error;
use tracing::debug;

pub mod channel;
pub mod message;
pub mod shared;

pub use channel::{star, ChannelMode, Coordinator, Endpoint, Star, Worker};
pub use message::{Message, MessagePassing};
pub use shared::SharedMemory;

/// Failures of the message-passing protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Unknown peer rank {rank} (world size {world_size})")]
    UnknownPeer { rank: usize, world_size: usize },
    #[error("Rank {rank} disconnected")]
    Disconnected { rank: usize },
    #[error("Protocol violation from rank {rank}: expected {expected}, got {got}")]
    Protocol {
        rank: usize,
        expected: &'static str,
        got: &'static str,
    },
    #[error("Rank {rank} tagged its result {got:?}, expected {expected:?}")]
    TagMismatch {
        rank: usize,
        expected: ChunkDescriptor,
        got: ChunkDescriptor,
    },
    #[error("Rank {rank} returned {got} values, expected {expected}")]
    LengthMismatch {
        rank: usize,
        expected: usize,
        got: usize,
    },
    #[error("Worker rank {rank} panicked")]
    WorkerPanicked { rank: usize },
}

/// A strategy for scattering chunks and gathering partial results.
pub trait Transport {
    fn name(&self) -> &'static str;

    fn workers(&self) -> usize;

    /// Runs every chunk of `partition` and fills `out`, laid out by `workload.layout(input)`.
    fn exchange<W: Workload>(
        &self,
        workload: &W,
        input: &W::Input,
        partition: &Partition,
        out: &mut [W::Elem],
    ) -> Result<()>;
}

/// Partition, exchange and finish one workload run.
pub fn drive<T: Transport, W: Workload>(
    transport: &T,
    workload: &W,
    input: &W::Input,
) -> Result<W::Output> {
    let units = workload.units(input)?;
    let partition = Partition::new(units, transport.workers())?;
    let layout: OutputLayout = workload.layout(input);
    let mut out = vec![W::Elem::default(); layout.buffer_len(&partition)];

    debug!(
        workload = workload.name(),
        transport = transport.name(),
        units,
        workers = partition.workers(),
        "exchange"
    );
    transport.exchange(workload, input, &partition, &mut out)?;
    workload.finish(input, out)
}
