//! The worker pool.
//!
//! Every worker is an OS thread owning a private [`Instance`]: its own
//! kernel binding and its own arena. Workers share nothing; tasks and
//! their results cross the boundary as owned byte buffers over channels.
//! Tasks are taken from one FIFO queue by whichever worker is idle.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{error, info, trace};

use crate::arena::Instance;
use crate::config::EngineConfig;
use crate::kernel::Kernel;
use crate::task::Task;
use crate::{Error, Result};

/// Buffers returned by a task, in the order of its `Get` steps.
pub type Output = Vec<Vec<u8>>;

struct Job {
    task: Task,
    reply: Sender<Result<Output>>,
}

pub struct Worker {
    queue: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
    num_workers: usize,
}

impl Worker {
    /// Starts `config.num_workers` workers and blocks until every one of
    /// them has bound its kernel.
    pub fn new(kernel: Arc<dyn Kernel>, config: &EngineConfig) -> Result<Worker> {
        let num_workers = config.num_workers.max(1);
        let (queue, jobs) = unbounded::<Job>();
        let (ready_tx, ready_rx) = bounded::<()>(num_workers);

        let mut handles = Vec::with_capacity(num_workers);
        for id in 0..num_workers {
            let jobs = jobs.clone();
            let kernel = kernel.clone();
            let ready = ready_tx.clone();
            let (pages, max_pages) = (config.arena_pages, config.max_arena_pages);

            let handle = thread::Builder::new()
                .name(format!("curve-engine-{}", id))
                .spawn(move || {
                    let mut instance = Instance::new(kernel, pages, max_pages);
                    if ready.send(()).is_err() {
                        return;
                    }
                    drop(ready);
                    work(id, &mut instance, jobs);
                })
                .map_err(|e| {
                    error!("failed to start worker {}: {}", id, e);
                    Error::IoError(e)
                })?;
            handles.push(handle);
        }
        drop(ready_tx);

        for _ in 0..num_workers {
            ready_rx.recv().map_err(|_| Error::WorkerLost)?;
        }
        info!("started {} workers", num_workers);

        Ok(Worker {
            queue: Some(queue),
            handles,
            num_workers,
        })
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn log_num_workers(&self) -> u32 {
        log2_floor(self.num_workers)
    }

    /// Queues `task`. The returned [`Waiter`] yields the task's output.
    pub fn compute(&self, task: Task) -> Waiter {
        let (reply, receiver) = bounded(1);
        if let Some(queue) = self.queue.as_ref() {
            // A closed queue drops `reply`, which the waiter reports.
            let _ = queue.send(Job { task, reply });
        }
        Waiter { receiver }
    }

    /// Queues every task, then waits for all of them. Outputs are returned
    /// in submission order.
    pub fn compute_all(&self, tasks: Vec<Task>) -> Result<Vec<Output>> {
        let waiters: Vec<Waiter> = tasks.into_iter().map(|t| self.compute(t)).collect();
        waiters.into_iter().map(Waiter::wait).collect()
    }

    /// Stops every worker once its current task is done. Queued tasks are
    /// still drained.
    pub fn terminate(&mut self) {
        if self.queue.take().is_none() {
            return;
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("a worker panicked");
            }
        }
        info!("stopped {} workers", self.num_workers);
    }

    pub fn is_terminated(&self) -> bool {
        self.queue.is_none()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn work(id: usize, instance: &mut Instance, jobs: Receiver<Job>) {
    for job in jobs.iter() {
        trace!(
            "worker {} runs a task of {} steps",
            id,
            job.task.steps().len()
        );
        let result = instance.execute(&job.task);
        if let Err(e) = result.as_ref() {
            error!("task failed on worker {}: {}", id, e);
        }
        let _ = job.reply.send(result);
    }
}

pub struct Waiter {
    receiver: Receiver<Result<Output>>,
}

impl Waiter {
    /// Blocks until the task is done.
    pub fn wait(self) -> Result<Output> {
        self.receiver.recv().map_err(|_| Error::WorkerLost)?
    }
}

pub(crate) fn log2_floor(num: usize) -> u32 {
    assert!(num > 0);

    let mut pow = 0;

    while (1 << (pow + 1)) <= num {
        pow += 1;
    }

    pow
}
