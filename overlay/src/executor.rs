//! Main-thread executor
//!
//! Windowing and GL handles must be used from the thread that created them
//! (on macOS that has to be the process main thread). All of that state
//! lives on one executor thread; everything else talks to it by submitting
//! jobs and blocking until they have run.
//!
//! The state is built INSIDE the executor thread by a factory closure and
//! handed to every job as `&mut S`, so non-`Send` handles never leave it.
//!
//! # Caller contract
//!
//! Jobs must not submit more jobs and wait on them. The executor is busy
//! running the outer job, so the inner one would never be picked up and the
//! thread deadlocks. This is not detected at runtime.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Errors from submitting work to the executor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("executor thread failed to start: {0}")]
    Startup(String),

    #[error("executor thread is no longer running")]
    Disconnected,
}

/// Handle for submitting jobs to the executor thread.
///
/// Cheap to clone; the executor keeps running while any handle exists.
pub struct MainThread<S> {
    tx: mpsc::UnboundedSender<Job<S>>,
}

impl<S> Clone for MainThread<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: 'static> MainThread<S> {
    /// Run `f` on the executor thread and block until it returns.
    ///
    /// Jobs submitted from one thread run in submission order and never
    /// interleave with jobs from other threads. There is no timeout.
    pub fn exec<R, F>(&self, f: F) -> Result<R, ExecutorError>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Box::new(move |state: &mut S| {
                let _ = reply_tx.send(f(state));
            }))
            .map_err(|_| ExecutorError::Disconnected)?;

        // A panicking job drops the reply sender while unwinding
        reply_rx
            .blocking_recv()
            .map_err(|_| ExecutorError::Disconnected)
    }

    /// Queue `f` without waiting for it. Only used for releasing resources
    /// from `Drop`, which may run on the executor thread itself.
    pub(crate) fn post<F>(&self, f: F) -> Result<(), ExecutorError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.tx
            .send(Box::new(f))
            .map_err(|_| ExecutorError::Disconnected)
    }

    /// A handle that does not keep the executor alive
    pub fn downgrade(&self) -> WeakMainThread<S> {
        WeakMainThread {
            tx: self.tx.downgrade(),
        }
    }
}

/// Non-owning executor handle, see [`MainThread::downgrade`]
pub struct WeakMainThread<S> {
    tx: mpsc::WeakUnboundedSender<Job<S>>,
}

impl<S> Clone for WeakMainThread<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S> WeakMainThread<S> {
    pub fn upgrade(&self) -> Option<MainThread<S>> {
        self.tx.upgrade().map(|tx| MainThread { tx })
    }
}

/// Owner of the executor thread.
pub struct Executor<S> {
    handle: MainThread<S>,
    thread: Option<JoinHandle<()>>,
}

impl<S: 'static> Executor<S> {
    /// Spawn a dedicated executor thread.
    ///
    /// `factory` runs on the new thread and builds the thread-affine state.
    /// Returns once the factory has finished; its error is passed back
    /// unchanged.
    pub fn spawn<F, E>(name: &str, factory: F) -> Result<Self, E>
    where
        F: FnOnce() -> Result<S, E> + Send + 'static,
        E: From<ExecutorError> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<Job<S>>();

        // Confirms creation back from the spawned thread
        let (confirm_tx, confirm_rx) = std::sync::mpsc::channel::<Result<(), E>>();

        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let state = match factory() {
                    Ok(state) => {
                        let _ = confirm_tx.send(Ok(()));
                        state
                    }
                    Err(e) => {
                        let _ = confirm_tx.send(Err(e));
                        return;
                    }
                };
                run_jobs(state, rx);
            })
            .map_err(|e| E::from(ExecutorError::Startup(e.to_string())))?;

        match confirm_rx.recv() {
            Ok(Ok(())) => {
                debug!(thread = name, "executor started");
                Ok(Self {
                    handle: MainThread { tx },
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(E::from(ExecutorError::Startup(
                "executor thread exited before confirming startup".to_string(),
            ))),
        }
    }

    /// Run the executor loop on the calling thread.
    ///
    /// Use this where the platform requires the process main thread. `app`
    /// runs on a spawned thread with an executor whose jobs run here. Returns
    /// `app`'s result after it has finished and every handle is gone. Panics
    /// from either side are resumed on this thread.
    pub fn run_on_current<F, E, A, R>(factory: F, app: A) -> Result<R, E>
    where
        F: FnOnce() -> Result<S, E>,
        E: From<ExecutorError>,
        A: FnOnce(Executor<S>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let state = factory()?;
        let (tx, rx) = mpsc::unbounded_channel::<Job<S>>();
        let executor = Executor {
            handle: MainThread { tx },
            thread: None,
        };

        let app_thread = thread::Builder::new()
            .name("regionshot-app".to_string())
            .spawn(move || app(executor))
            .map_err(|e| E::from(ExecutorError::Startup(e.to_string())))?;

        // rx is moved in, so a panicking job also disconnects the app side
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || run_jobs(state, rx)));
        let app_result = app_thread.join();

        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }
        match app_result {
            Ok(result) => Ok(result),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    pub fn handle(&self) -> &MainThread<S> {
        &self.handle
    }

    /// Shorthand for `self.handle().exec(f)`
    pub fn exec<R, F>(&self, f: F) -> Result<R, ExecutorError>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.exec(f)
    }
}

impl<S> Drop for Executor<S> {
    fn drop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // Close our sender; the loop ends once every other handle is gone too
        let (closed_tx, _) = mpsc::unbounded_channel();
        drop(std::mem::replace(&mut self.handle.tx, closed_tx));

        if thread.thread().id() == thread::current().id() {
            // Dropped from inside a job; the loop exits on its own
            return;
        }
        if thread.join().is_err() {
            warn!("executor thread panicked");
        }
    }
}

fn run_jobs<S>(mut state: S, mut rx: mpsc::UnboundedReceiver<Job<S>>) {
    while let Some(job) = rx.blocking_recv() {
        job(&mut state);
    }
    debug!("executor queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn counter() -> Executor<Vec<u32>> {
        Executor::spawn("test-executor", || Ok::<_, ExecutorError>(Vec::new())).unwrap()
    }

    #[test]
    fn test_exec_returns_value() {
        let executor = counter();
        let len = executor
            .exec(|state| {
                state.push(7);
                state.len()
            })
            .unwrap();
        assert_eq!(len, 1);
        assert_eq!(executor.exec(|state| state.clone()).unwrap(), vec![7]);
    }

    #[test]
    fn test_jobs_run_on_executor_thread() {
        let executor = counter();
        let caller = thread::current().id();
        let (id, name) = executor
            .exec(|_| {
                let current = thread::current();
                (current.id(), current.name().map(str::to_string))
            })
            .unwrap();
        assert_ne!(id, caller);
        assert_eq!(name.as_deref(), Some("test-executor"));

        // Every job lands on the same thread
        let again = executor.exec(|_| thread::current().id()).unwrap();
        assert_eq!(again, id);
    }

    #[test]
    fn test_single_caller_order_is_preserved() {
        let executor = counter();
        for i in 0..100 {
            executor.handle().post(move |state| state.push(i)).unwrap();
        }
        let seen = executor.exec(|state| state.clone()).unwrap();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrent_callers_do_not_interleave() {
        let executor = Arc::new(counter());
        let threads: Vec<_> = (0..4u32)
            .map(|t| {
                let executor = Arc::clone(&executor);
                thread::spawn(move || {
                    for _ in 0..50 {
                        // Both pushes happen inside one job
                        executor
                            .exec(move |state| {
                                state.push(t);
                                state.push(t);
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let seen = executor.exec(|state| state.clone()).unwrap();
        assert_eq!(seen.len(), 400);
        for pair in seen.chunks(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_factory_error_is_returned() {
        let result = Executor::<Vec<u32>>::spawn("failing", || {
            Err(ExecutorError::Startup("no display".to_string()))
        });
        assert_eq!(
            result.err(),
            Some(ExecutorError::Startup("no display".to_string()))
        );
    }

    #[test]
    fn test_panicking_job_disconnects() {
        let executor = counter();
        let result = executor.exec(|_| -> u32 { panic!("job failed") });
        assert_eq!(result, Err(ExecutorError::Disconnected));
        assert_eq!(executor.exec(|s| s.len()), Err(ExecutorError::Disconnected));
    }

    #[test]
    fn test_weak_handle_does_not_outlive_executor() {
        let executor = counter();
        let weak = executor.handle().downgrade();
        assert!(weak.upgrade().is_some());
        drop(executor);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_run_on_current_uses_calling_thread() {
        let caller = thread::current().id();
        let log = Arc::new(Mutex::new(Vec::new()));
        let app_log = Arc::clone(&log);

        let result = Executor::run_on_current(
            || Ok::<_, ExecutorError>(0u32),
            move |executor| {
                let job_thread = executor
                    .exec(|state| {
                        *state += 1;
                        thread::current().id()
                    })
                    .unwrap();
                app_log.lock().unwrap().push(job_thread);
                assert_ne!(thread::current().id(), job_thread);
                executor.exec(|state| *state).unwrap()
            },
        )
        .unwrap();

        assert_eq!(result, 1);
        assert_eq!(log.lock().unwrap().as_slice(), &[caller]);
    }
}
