use super::channel::{star, ChannelMode, Coordinator, Endpoint, Star, Worker};
use super::{Transport, TransportError};
use crate::combine::{place, OutputLayout, PartialResult};
use crate::partition::{ChunkDescriptor, Partition};
use crate::workload::Workload;
use crate::{Error, Result};
use std::thread;
use tracing::{debug, trace};

/// Everything that travels over a link.
///
/// Scatter is `Descriptor` then `Shard`; gather is `Descriptor` (the tag) then `Partial`.
#[derive(Debug, Clone, PartialEq)]
pub enum Message<S, E> {
    Descriptor(ChunkDescriptor),
    Shard(S),
    Partial(Vec<E>),
}

impl<S, E> Message<S, E> {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Descriptor(_) => "Descriptor",
            Message::Shard(_) => "Shard",
            Message::Partial(_) => "Partial",
        }
    }
}

type WorkloadMessage<W> = Message<<W as Workload>::Shard, <W as Workload>::Elem>;

/// Message passing between ranks that share nothing.
///
/// Rank 0 keeps the input. For every worker, in ascending rank order, it sends the chunk
/// descriptor and a private copy of the chunk's input, then computes chunk 0 itself, then
/// receives each worker's tag and partial in the same fixed order. A worker that finishes early
/// waits to be polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagePassing {
    workers: usize,
    mode: ChannelMode,
}

impl MessagePassing {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::InvalidConfiguration(
                "message passing needs at least one rank".to_string(),
            ));
        }
        Ok(Self {
            workers,
            mode: ChannelMode::default(),
        })
    }

    pub fn with_mode(mut self, mode: ChannelMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }
}

impl Transport for MessagePassing {
    fn name(&self) -> &'static str {
        "processes"
    }

    fn workers(&self) -> usize {
        self.workers
    }

    fn exchange<W: Workload>(
        &self,
        workload: &W,
        input: &W::Input,
        partition: &Partition,
        out: &mut [W::Elem],
    ) -> Result<()> {
        let layout = workload.layout(input);
        let Star {
            coordinator,
            workers,
        } = star::<WorkloadMessage<W>>(partition.workers(), self.mode)?;

        thread::scope(|s| {
            let mut handles = Vec::with_capacity(workers.len());
            for endpoint in workers {
                let rank = endpoint.rank();
                let handle = thread::Builder::new()
                    .name(format!("parwork-rank-{rank}"))
                    .spawn_scoped(s, move || serve(workload, layout, endpoint))
                    .map_err(|e| Error::BackendSetup {
                        stage: "spawn rank",
                        reason: e.to_string(),
                    })?;
                handles.push((rank, handle));
            }

            let result = coordinate(workload, input, partition, layout, &coordinator, out);
            // Unblocks any worker still waiting on the coordinator.
            drop(coordinator);

            let mut failures = Vec::new();
            for (rank, handle) in handles {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => failures.push((rank, e)),
                    Err(_) => failures.push((rank, TransportError::WorkerPanicked { rank }.into())),
                }
            }

            reconcile(result, failures)
        })
    }
}

/// Picks the error to report. A coordinator that lost a worker reports why the worker went.
fn reconcile(result: Result<()>, mut failures: Vec<(usize, Error)>) -> Result<()> {
    match result {
        Err(Error::Transport(TransportError::Disconnected { rank })) => {
            match failures.iter().position(|(r, _)| *r == rank) {
                Some(i) => Err(failures.swap_remove(i).1),
                None => Err(TransportError::Disconnected { rank }.into()),
            }
        }
        Err(e) => Err(e),
        Ok(()) => match failures.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(()),
        },
    }
}

fn coordinate<W: Workload>(
    workload: &W,
    input: &W::Input,
    partition: &Partition,
    layout: OutputLayout,
    coordinator: &Coordinator<WorkloadMessage<W>>,
    out: &mut [W::Elem],
) -> Result<()> {
    let (local, remote) = partition
        .chunks()
        .split_first()
        .ok_or_else(|| Error::InvalidConfiguration("empty partition".to_string()))?;

    for chunk in remote {
        debug!(rank = chunk.owner, offset = chunk.offset, len = chunk.len, "scatter");
        coordinator.send(chunk.owner, Message::Descriptor(*chunk))?;
        coordinator.send(chunk.owner, Message::Shard(workload.shard(input, chunk)))?;
    }

    workload.announce(local, partition.workers());
    let region = layout.region(local);
    let total = out.len();
    let local_out = out.get_mut(region.clone()).ok_or(Error::ShapeMismatch {
        expected: vec![region.start, region.end],
        got: vec![total],
    })?;
    workload.execute(input, local, local_out)?;

    for chunk in remote {
        let rank = chunk.owner;
        let tag = match coordinator.recv(rank)? {
            Message::Descriptor(tag) => tag,
            other => return Err(protocol(rank, "Descriptor", &other)),
        };
        if tag != *chunk {
            return Err(TransportError::TagMismatch {
                rank,
                expected: *chunk,
                got: tag,
            }
            .into());
        }

        let data = match coordinator.recv(rank)? {
            Message::Partial(data) => data,
            other => return Err(protocol(rank, "Partial", &other)),
        };
        let expected = layout.region_len(chunk);
        if data.len() != expected {
            return Err(TransportError::LengthMismatch {
                rank,
                expected,
                got: data.len(),
            }
            .into());
        }

        debug!(rank, len = data.len(), "gather");
        place(out, layout, &PartialResult::new(tag, data))?;
    }

    Ok(())
}

fn serve<W: Workload>(
    workload: &W,
    layout: OutputLayout,
    endpoint: Worker<WorkloadMessage<W>>,
) -> Result<()> {
    let chunk = match endpoint.recv()? {
        Message::Descriptor(chunk) => chunk,
        other => return Err(protocol(0, "Descriptor", &other)),
    };
    let shard = match endpoint.recv()? {
        Message::Shard(shard) => shard,
        other => return Err(protocol(0, "Shard", &other)),
    };

    workload.announce(&chunk, endpoint.world_size());
    let mut partial = vec![W::Elem::default(); layout.region_len(&chunk)];
    workload.execute_shard(&shard, &chunk, &mut partial)?;
    trace!(rank = endpoint.rank(), len = partial.len(), "partial ready");

    endpoint.send(Message::Descriptor(chunk))?;
    endpoint.send(Message::Partial(partial))?;
    Ok(())
}

fn protocol<S, E>(rank: usize, expected: &'static str, got: &Message<S, E>) -> Error {
    TransportError::Protocol {
        rank,
        expected,
        got: got.kind(),
    }
    .into()
}
