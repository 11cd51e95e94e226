//! Fan-out of comparison jobs over scoped worker threads.
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

/// Number of jobs sent through the queue at once.
const CHUNK_SIZE: usize = 256;

/// Plan of how many workers to run for a batch.
///
/// # Examples
///
/// ```
/// use find_neardup::scheduler::WorkerPlan;
///
/// assert_eq!(WorkerPlan::for_batch(50).workers(), 2);
/// assert!(WorkerPlan::for_batch(5000).workers() <= 32);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerPlan {
    workers: usize,
}

impl WorkerPlan {
    /// Plans the workers for a batch of `num_records` records.
    ///
    /// Two workers below 200 records, one per core up to 1000, and above that
    /// twice the cores capped at 32.
    pub fn for_batch(num_records: usize) -> Self {
        let cores = num_cpus::get().max(1);
        let workers = if num_records < 200 {
            2
        } else if num_records <= 1000 {
            cores
        } else {
            (cores * 2).min(32)
        };
        Self { workers }
    }

    /// Plans a fixed number of workers (at least one).
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Gets the number of workers.
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `work` on every job and collects the produced results, in no
    /// particular order.
    ///
    /// A producer thread feeds the jobs in chunks through a bounded queue shared
    /// by the workers. The queue closes once the jobs are exhausted, and the
    /// workers drain it and exit. The calling thread aggregates the results.
    ///
    /// The queue is owned by the workers. If they all exit early, e.g., by a
    /// panic in `work`, the producer stops and the panic is propagated.
    pub fn run<I, F, R>(&self, jobs: I, work: F) -> Vec<R>
    where
        I: IntoIterator,
        I::IntoIter: Send,
        I::Item: Send,
        F: Fn(I::Item) -> Option<R> + Sync,
        R: Send,
    {
        let (job_tx, job_rx) = mpsc::sync_channel::<Vec<I::Item>>(self.workers * 2);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, result_rx) = mpsc::channel();
        let jobs = jobs.into_iter();

        thread::scope(|s| {
            s.spawn(move || {
                let mut jobs = jobs.peekable();
                while jobs.peek().is_some() {
                    let chunk: Vec<_> = jobs.by_ref().take(CHUNK_SIZE).collect();
                    if job_tx.send(chunk).is_err() {
                        break;
                    }
                }
            });

            for _ in 0..self.workers {
                let (job_rx, work, result_tx) = (Arc::clone(&job_rx), &work, result_tx.clone());
                s.spawn(move || loop {
                    let chunk = match job_rx.lock().unwrap_or_else(PoisonError::into_inner).recv() {
                        Ok(chunk) => chunk,
                        Err(_) => break,
                    };
                    for result in chunk.into_iter().filter_map(work) {
                        if result_tx.send(result).is_err() {
                            return;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(result_tx);

            result_rx.into_iter().collect()
        })
    }
}
