//! Single-slot background worker.
//!
//! The worker owns one thread and one pending-task slot. Scheduling a task
//! while another is still waiting replaces it: only the most recent request
//! matters (e.g. "index whichever file the user opened last"). A task that
//! has already started always runs to completion; its input is echoed back in
//! the [`TaskCompletion`] so the owner can decide whether it is still wanted.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::run_guarded;
use crate::error::Result;

/// Work executed on a [`ComputationWorker`] thread.
pub trait WorkerJob: Send + 'static {
    type Input: Clone + Send + 'static;
    type Output: Send + 'static;

    /// Short name used for the thread and in log lines.
    fn name(&self) -> &'static str;

    fn run(&mut self, input: &Self::Input) -> Result<Self::Output>;
}

/// Result of one task; `output` is `None` when the job failed or panicked.
#[derive(Debug)]
pub struct TaskCompletion<I, O> {
    pub input: I,
    pub output: Option<O>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Stopped,
}

enum Slot<I> {
    Empty,
    Task(I),
    /// Sentinel: the thread exits as soon as it observes it.
    Shutdown,
}

struct SlotState<I> {
    slot: Slot<I>,
    running: bool,
}

struct Shared<I> {
    state: Mutex<SlotState<I>>,
    wake: Condvar,
}

impl<I> Shared<I> {
    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState<I>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type CompletionOf<J> = TaskCompletion<<J as WorkerJob>::Input, <J as WorkerJob>::Output>;

pub struct ComputationWorker<J: WorkerJob> {
    name: &'static str,
    shared: Arc<Shared<J::Input>>,
    job: Option<J>,
    handle: Option<JoinHandle<()>>,
    completions_tx: Sender<CompletionOf<J>>,
    completions_rx: Receiver<CompletionOf<J>>,
}

impl<J: WorkerJob> ComputationWorker<J> {
    #[must_use]
    pub fn new(job: J) -> Self {
        let (completions_tx, completions_rx) = unbounded();
        Self {
            name: job.name(),
            shared: Arc::new(Shared {
                state: Mutex::new(SlotState {
                    slot: Slot::Empty,
                    running: false,
                }),
                wake: Condvar::new(),
            }),
            job: Some(job),
            handle: None,
            completions_tx,
            completions_rx,
        }
    }

    /// Spawn the worker thread. Calling it again, or after [`stop`](Self::stop),
    /// does nothing.
    pub fn start(&mut self) -> Result<()> {
        let Some(mut job) = self.job.take() else {
            return Ok(());
        };
        let shared = Arc::clone(&self.shared);
        let tx = self.completions_tx.clone();
        let name = self.name;
        let handle = thread::Builder::new()
            .name(format!("scrubline-{name}"))
            .spawn(move || run_loop(&mut job, &shared, &tx))?;
        self.handle = Some(handle);
        tracing::debug!(worker = name, "worker started");
        Ok(())
    }

    /// Put `input` in the pending slot, replacing any task that has not started.
    /// Returns `false` once the worker is stopped.
    pub fn schedule_task(&self, input: J::Input) -> bool {
        let mut state = self.shared.lock();
        match std::mem::replace(&mut state.slot, Slot::Task(input)) {
            Slot::Shutdown => {
                state.slot = Slot::Shutdown;
                return false;
            }
            Slot::Task(_) => {
                tracing::debug!(worker = self.name, "replacing unstarted task");
            }
            Slot::Empty => {}
        }
        drop(state);
        self.shared.wake.notify_one();
        true
    }

    /// Drop any unstarted task, wake the thread with the shutdown sentinel and
    /// join it. Safe to call without `start` and more than once.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.slot = Slot::Shutdown;
        }
        self.shared.wake.notify_all();
        self.job = None;

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!(worker = self.name, "worker thread terminated abnormally");
            } else {
                tracing::debug!(worker = self.name, "worker stopped");
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        let state = self.shared.lock();
        if matches!(state.slot, Slot::Shutdown) && !state.running {
            WorkerState::Stopped
        } else if state.running {
            WorkerState::Running
        } else {
            WorkerState::Idle
        }
    }

    /// Receiver of finished tasks, in completion order.
    #[must_use]
    pub fn completions(&self) -> &Receiver<CompletionOf<J>> {
        &self.completions_rx
    }

    pub fn try_completion(&self) -> Option<CompletionOf<J>> {
        self.completions_rx.try_recv().ok()
    }
}

impl<J: WorkerJob> Drop for ComputationWorker<J> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<J: WorkerJob>(job: &mut J, shared: &Shared<J::Input>, tx: &Sender<CompletionOf<J>>) {
    let name = job.name();
    loop {
        let input = {
            let mut state = shared.lock();
            loop {
                match std::mem::replace(&mut state.slot, Slot::Empty) {
                    Slot::Shutdown => {
                        state.slot = Slot::Shutdown;
                        return;
                    }
                    Slot::Task(input) => {
                        state.running = true;
                        break input;
                    }
                    Slot::Empty => {
                        state = shared
                            .wake
                            .wait(state)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                }
            }
        };

        let output = match run_guarded(|| job.run(&input)) {
            Ok(output) => Some(output),
            Err(err) => {
                tracing::error!(worker = name, error = %err, "task failed");
                None
            }
        };

        shared.lock().running = false;
        if tx.send(TaskCompletion { input, output }).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrublineError;
    use std::sync::mpsc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    /// Echoes its input doubled; blocks on a gate before the first task so
    /// tests can pile up scheduling requests behind it.
    struct GatedDouble {
        gate: Option<mpsc::Receiver<()>>,
    }

    impl WorkerJob for GatedDouble {
        type Input = i32;
        type Output = i32;

        fn name(&self) -> &'static str {
            "double"
        }

        fn run(&mut self, input: &i32) -> Result<i32> {
            if let Some(gate) = self.gate.take() {
                gate.recv().ok();
            }
            match *input {
                -1 => Err(ScrublineError::Decode {
                    reason: "negative".into(),
                }),
                -2 => panic!("boom"),
                n => Ok(n * 2),
            }
        }
    }

    #[test]
    fn latest_pending_task_wins() {
        let (release, gate) = mpsc::channel();
        let mut worker = ComputationWorker::new(GatedDouble { gate: Some(gate) });
        worker.start().unwrap();

        assert!(worker.schedule_task(1));
        while worker.state() != WorkerState::Running {
            std::thread::yield_now();
        }
        // Task 1 is blocked; 2 and 3 compete for the single pending slot.
        assert!(worker.schedule_task(2));
        assert!(worker.schedule_task(3));
        release.send(()).unwrap();

        let first = worker.completions().recv_timeout(WAIT).unwrap();
        assert_eq!((first.input, first.output), (1, Some(2)));
        let second = worker.completions().recv_timeout(WAIT).unwrap();
        assert_eq!((second.input, second.output), (3, Some(6)));
        assert!(
            worker
                .completions()
                .recv_timeout(Duration::from_millis(100))
                .is_err()
        );
        worker.stop();
    }

    #[test]
    fn failures_are_reported_as_absent_and_thread_survives() {
        let mut worker = ComputationWorker::new(GatedDouble { gate: None });
        worker.start().unwrap();

        worker.schedule_task(-1);
        let failed = worker.completions().recv_timeout(WAIT).unwrap();
        assert_eq!(failed.input, -1);
        assert!(failed.output.is_none());

        worker.schedule_task(-2);
        let panicked = worker.completions().recv_timeout(WAIT).unwrap();
        assert!(panicked.output.is_none());

        worker.schedule_task(21);
        let ok = worker.completions().recv_timeout(WAIT).unwrap();
        assert_eq!(ok.output, Some(42));
    }

    #[test]
    fn stop_without_start_or_tasks() {
        let mut never_started = ComputationWorker::new(GatedDouble { gate: None });
        never_started.stop();
        assert_eq!(never_started.state(), WorkerState::Stopped);
        assert!(!never_started.schedule_task(1));

        let mut idle = ComputationWorker::new(GatedDouble { gate: None });
        idle.start().unwrap();
        idle.stop();
        idle.stop();
        assert_eq!(idle.state(), WorkerState::Stopped);
    }

    #[test]
    fn stop_discards_unstarted_task() {
        let (release, gate) = mpsc::channel();
        let mut worker = ComputationWorker::new(GatedDouble { gate: Some(gate) });
        worker.start().unwrap();
        worker.schedule_task(5);
        while worker.state() != WorkerState::Running {
            std::thread::yield_now();
        }
        worker.schedule_task(6);

        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            release.send(()).ok();
        });
        worker.stop();
        releaser.join().unwrap();

        let completions: Vec<_> = worker.completions().try_iter().collect();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].input, 5);
    }
}
