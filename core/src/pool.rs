use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::{debug, info, warn};

use crate::error::ComputationError;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Somewhere to run jobs that should not block the caller.
pub trait ExecutionPool: Send + Sync {
  fn execute(&self, job: Job);
}

pub type PoolRef = Arc<dyn ExecutionPool>;

/// Handle to the result of a job submitted with [`submit`].
pub struct Task<T> {
  result_rx: Receiver<T>,
}

impl<T> Task<T> {
  pub fn wait(self) -> Result<T, ComputationError> {
    self
      .result_rx
      .recv()
      .map_err(|_| ComputationError::TaskDropped)
  }

  pub fn try_get(&self) -> Option<Result<T, ComputationError>> {
    match self.result_rx.try_recv() {
      Ok(result) => Some(Ok(result)),
      Err(TryRecvError::Empty) => None,
      Err(TryRecvError::Disconnected) => Some(Err(ComputationError::TaskDropped)),
    }
  }
}

pub fn submit<T, F>(pool: &dyn ExecutionPool, f: F) -> Task<T>
where
  T: Send + 'static,
  F: FnOnce() -> T + Send + 'static,
{
  let (result_tx, result_rx) = crossbeam_channel::bounded::<T>(1);
  pool.execute(Box::new(move || {
    drop(result_tx.send(f()));
  }));
  Task { result_rx }
}

/// Runs every job on the calling thread before returning.
pub struct InlinePool;

impl InlinePool {
  pub fn new_ref() -> PoolRef {
    Arc::new(InlinePool)
  }
}

impl ExecutionPool for InlinePool {
  fn execute(&self, job: Job) {
    job()
  }
}

pub struct ThreadPool {
  job_tx: Option<Sender<Job>>,
  handlers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
  pub fn new(workers: usize) -> ThreadPool {
    let workers = workers.max(1);
    info!("Starting {} pool workers ...", workers);

    let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();

    let handlers = (0..workers)
      .filter_map(|index| {
        let job_rx = job_rx.clone();
        thread::Builder::new()
          .name(format!("pool-worker-{}", index))
          .spawn(move || {
            for job in job_rx.iter() {
              if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                warn!("Pool worker {} recovered from a failed job", index);
              }
            }
            debug!("Pool worker {} finished", index);
          })
          .map_err(|err| warn!("Couldn't start pool worker {}: {}", index, err))
          .ok()
      })
      .collect();

    ThreadPool {
      job_tx: Some(job_tx),
      handlers,
    }
  }

  pub fn get_workers(&self) -> usize {
    self.handlers.len()
  }
}

impl ExecutionPool for ThreadPool {
  fn execute(&self, job: Job) {
    match (&self.job_tx, self.handlers.is_empty()) {
      (Some(job_tx), false) => {
        if let Err(err) = job_tx.send(job) {
          warn!("Pool is closed, running job inline");
          (err.into_inner())()
        }
      }
      _ => job(),
    }
  }
}

impl Drop for ThreadPool {
  fn drop(&mut self) {
    self.job_tx.take();
    for handler in self.handlers.drain(..) {
      drop(handler.join());
    }
  }
}
