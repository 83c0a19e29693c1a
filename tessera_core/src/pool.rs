use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use log::debug;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Error, Result};

/// Worker threads that process blocks of one call in parallel.
///
/// The pool is built on first parallel use and kept across calls until the
/// thread count changes or [`WorkerPool::release`] drops it.
#[derive(Debug)]
pub(crate) struct WorkerPool {
    nthreads: usize,
    pool: Option<ThreadPool>,
    /// Bumped every time a new set of threads is spawned.
    generation: u64,
}

impl WorkerPool {
    pub fn new(nthreads: usize) -> Self {
        Self {
            nthreads: nthreads.max(1),
            pool: None,
            generation: 0,
        }
    }

    pub fn nthreads(&self) -> usize {
        self.nthreads
    }

    /// Change the thread count, returning the previous one.
    ///
    /// Asking for the current count keeps the existing threads. Otherwise
    /// the old threads are dropped and new ones wait for the next call that
    /// has more than one block to work on.
    pub fn resize(&mut self, nthreads: usize) -> usize {
        let previous = self.nthreads;
        if nthreads != previous {
            self.nthreads = nthreads.max(1);
            self.release();
        }
        previous
    }

    /// Number of times a set of worker threads has been spawned.
    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop the worker threads; the next parallel call spawns new ones.
    ///
    /// Dropping a rayon pool does not join its threads: they finish the
    /// work already queued (none, between calls) and exit on their own.
    pub fn release(&mut self) {
        if self.pool.take().is_some() {
            debug!("pool: released {} workers", self.nthreads);
        }
    }

    fn ensure(&mut self) -> Result<&ThreadPool> {
        if self.pool.is_none() {
            let pool = ThreadPoolBuilder::new()
                .num_threads(self.nthreads)
                .thread_name(|i| format!("tessera-worker-{i}"))
                .build()
                .map_err(|e| Error::Internal(format!("cannot start worker threads: {e}")))?;
            self.generation += 1;
            debug!("pool: started {} workers (generation {})", self.nthreads, self.generation);
            self.pool = Some(pool);
        }
        self.pool
            .as_ref()
            .ok_or_else(|| Error::Internal("worker pool missing after start".into()))
    }

    /// Run `f(index, item)` for every item, in parallel when configured.
    ///
    /// Items are handed out in contiguous runs, one run per worker. The
    /// first error stops the remaining work and is returned.
    pub fn for_each_block<T, F>(&mut self, items: &mut [T], f: F) -> Result<()>
    where
        T: Send,
        F: Fn(usize, &mut T) -> Result<()> + Sync,
    {
        if self.nthreads <= 1 || items.len() <= 1 {
            return items.iter_mut().enumerate().try_for_each(|(i, item)| f(i, item));
        }

        let per_worker = items.len().div_ceil(self.nthreads.min(items.len()));
        let pool = self.ensure()?;
        let failed = AtomicBool::new(false);
        let first_error: Mutex<Option<Error>> = Mutex::new(None);

        pool.scope(|s| {
            for (run, chunk) in items.chunks_mut(per_worker).enumerate() {
                let (f, failed, first_error) = (&f, &failed, &first_error);
                s.spawn(move |_| {
                    for (k, item) in chunk.iter_mut().enumerate() {
                        if failed.load(Ordering::Relaxed) {
                            return;
                        }
                        if let Err(e) = f(run * per_worker + k, item) {
                            failed.store(true, Ordering::Relaxed);
                            first_error
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .get_or_insert(e);
                            return;
                        }
                    }
                });
            }
        });

        match first_error.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
