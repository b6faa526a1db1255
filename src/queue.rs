//! Single worker queue. Jobs run one at a time, in the order they were
//! submitted, against a context owned by the worker thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::defaults::WORKER_THREAD_NAME;
use crate::error::FeedStoreError;
use crate::{log_debug, log_error, Result};

type Job<C> = Box<dyn FnOnce(&mut C) + Send>;

pub struct SerialQueue<C> {
    sender: Option<Sender<Job<C>>>,
    worker: Option<JoinHandle<()>>,
    recover: fn(&mut C),
}

impl<C: Send + 'static> SerialQueue<C> {
    /// Spawns the worker owning `context`. `recover` runs on the context
    /// after a job panicked, before the next job starts.
    pub fn new(context: C, recover: fn(&mut C)) -> Result<Self> {
        let (sender, receiver) = channel::<Job<C>>();
        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run(context, receiver))?;
        Ok(SerialQueue {
            sender: Some(sender),
            worker: Some(worker),
            recover,
        })
    }

    /// True when called from the worker, ex. from inside a completion.
    pub fn is_worker_thread(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| worker.thread().id() == thread::current().id())
    }

    /// Enqueues `work`. Its result, or a `WorkerPanicked` error if it
    /// panicked, is handed to `completion` on the worker thread before the
    /// next job starts.
    pub fn submit<T, W, F>(&self, work: W, completion: F)
    where
        T: 'static,
        W: FnOnce(&mut C) -> Result<T> + Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let recover = self.recover;
        let job: Job<C> = Box::new(move |context: &mut C| {
            let result = match panic::catch_unwind(AssertUnwindSafe(|| work(&mut *context))) {
                Ok(result) => result,
                Err(_) => {
                    recover(context);
                    Err(FeedStoreError::WorkerPanicked.into())
                }
            };
            completion(result);
        });
        let Some(sender) = self.sender.as_ref() else {
            return;
        };
        if sender.send(job).is_err() {
            // The worker only exits once the sender is dropped.
            log_error!("Store worker is gone, dropping submitted job");
        }
    }
}

fn run<C>(mut context: C, receiver: Receiver<Job<C>>) {
    for job in receiver.iter() {
        if panic::catch_unwind(AssertUnwindSafe(|| job(&mut context))).is_err() {
            log_error!("Completion handler panicked on the store worker");
        }
    }
    log_debug!("Store worker shutting down");
}

impl<C> Drop for SerialQueue<C> {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain the jobs already queued.
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            // Dropped from a completion running on the worker itself.
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                log_error!("Store worker terminated abnormally");
            }
        }
    }
}
