use super::Transport;
use crate::combine::split_regions;
use crate::partition::Partition;
use crate::workload::Workload;
use crate::{Error, Result};
use tracing::trace;

/// Fork-join over a rayon pool of exactly `threads` threads.
///
/// The output buffer is split into one `&mut` region per chunk before any task starts, so the
/// tasks read the shared input and write their own region without locks. The scope join is the
/// only barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedMemory {
    threads: usize,
}

impl SharedMemory {
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::InvalidConfiguration(
                "shared memory needs at least one thread".to_string(),
            ));
        }
        Ok(Self { threads })
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("parwork-thread-{i}"))
            .build()
            .map_err(|e| Error::BackendSetup {
                stage: "thread pool",
                reason: e.to_string(),
            })
    }
}

impl Transport for SharedMemory {
    fn name(&self) -> &'static str {
        "threads"
    }

    fn workers(&self) -> usize {
        self.threads
    }

    fn exchange<W: Workload>(
        &self,
        workload: &W,
        input: &W::Input,
        partition: &Partition,
        out: &mut [W::Elem],
    ) -> Result<()> {
        let pool = self.pool()?;
        let layout = workload.layout(input);
        let chunks = partition.chunks();
        let workers = partition.workers();
        let regions = split_regions(out, layout, chunks)?;
        let mut results: Vec<Result<()>> = chunks.iter().map(|_| Ok(())).collect();

        pool.scope(|s| {
            for ((chunk, region), slot) in chunks.iter().zip(regions).zip(results.iter_mut()) {
                s.spawn(move |_| {
                    workload.announce(chunk, workers);
                    trace!(worker = chunk.owner, len = chunk.len, "task start");
                    *slot = workload.execute(input, chunk, region);
                });
            }
        });

        results.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::drive;
    use crate::workload::Hello;

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(
            SharedMemory::new(0),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_more_threads_than_items() {
        let shared = SharedMemory::new(6).unwrap();
        let ids = drive(&shared, &Hello, &4).unwrap();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }
}
