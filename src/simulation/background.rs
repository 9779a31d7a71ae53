//! Running a solver on its own thread.
//!
//! Each tick locks the solver, runs `iteration_count` iterations (or a 25 ms
//! time-boxed batch when that is 0), copies the node positions out, releases
//! the lock and hands the copy to the render hook. Stopping is cooperative:
//! the flag is checked once per tick, so an in-flight tick and its render
//! always finish before the thread exits.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{Result, SolverError};
use crate::math::triple::Triple;
use crate::simulation::engine::Solver;
use crate::simulation::params::TIME_BOXED_TICK;

/// Called after every tick with a snapshot of the node positions
pub type RenderHook = Box<dyn FnMut(&[Triple]) + Send + 'static>;

pub struct BackgroundExecution {
    stop: Arc<AtomicBool>,
    ticks: Arc<AtomicUsize>,
    done: Receiver<()>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundExecution {
    pub fn start(solver: Arc<Mutex<Solver>>, mut render: Option<RenderHook>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let ticks = Arc::new(AtomicUsize::new(0));
        let (done_tx, done) = mpsc::channel();

        let worker = {
            let stop = Arc::clone(&stop);
            let ticks = Arc::clone(&ticks);
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    let positions = {
                        let mut solver = solver.lock();
                        let count = solver.params.iteration_count;
                        if count == 0 {
                            solver.iterate_for(TIME_BOXED_TICK);
                        } else {
                            solver.iterate_n(count);
                        }
                        solver.node_positions()
                    };
                    if let Some(hook) = render.as_mut() {
                        hook(&positions);
                    }
                    ticks.fetch_add(1, Ordering::Release);
                }
                // receiver may already be gone if the handle was dropped
                let _ = done_tx.send(());
            })
        };

        info!("background execution started");
        Self {
            stop,
            ticks,
            done,
            worker: Some(worker),
        }
    }

    /// Completed ticks so far
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Ask the loop to stop after its current tick, without waiting
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Request a stop and wait up to `timeout` for the loop to finish its
    /// current tick and render. Stopping an already stopped execution is a no-op.
    pub fn stop(&mut self, timeout: Duration) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.request_stop();

        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.join().is_err() {
                    warn!("background execution thread panicked");
                }
                info!(ticks = self.ticks(), "background execution stopped");
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "background execution did not stop in time");
                self.worker = Some(worker);
                Err(SolverError::StopTimeout(timeout))
            }
        }
    }
}

impl Drop for BackgroundExecution {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.request_stop();
        }
    }
}
