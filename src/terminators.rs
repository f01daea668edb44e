//! Terminators for controlling and interrupting long-running solves.
//!
//! This module provides several implementations of the [`Terminator`] trait, including:
//! - [`InterruptTerminator`]: responds to Ctrl-C (SIGINT) or a programmatic interrupt.
//! - [`TimeOutTerminator`]: terminates after a specified time limit.
//! - [`MultipleTerminators`]: combines multiple terminators.
//!
//! # Note
//! [`InterruptTerminator`] installs a global signal handler and **can only be constructed once** per process. Attempting to create multiple instances will result in a panic.

use std::sync::{Arc, atomic::AtomicBool};

/// Why a [`Terminator`] asked the running solve to stop.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TerminationReason {
    Interrupted,
    TimeLimit,
}

/// Sampled once per inner iteration; signals the solver should stop
/// early with the returned reason.
pub trait Terminator {
    fn initialize(&mut self) {}

    fn terminate(&mut self) -> Option<TerminationReason>;
}

/// A terminator that never fires. Used where the caller has no
/// external interrupt source to wire in.
pub struct NoOpTerminator;

impl Terminator for NoOpTerminator {
    fn terminate(&mut self) -> Option<TerminationReason> {
        None
    }
}

/// Terminator that responds to Ctrl-C (SIGINT) or a programmatic interrupt.
///
/// # Note
/// Only one instance of `InterruptTerminator` can be constructed per process, as it installs a global signal handler.
/// Creating more than one will panic.
pub struct InterruptTerminator {
    interrupted: Arc<AtomicBool>,
}

impl InterruptTerminator {
    pub fn new() -> Self {
        let interrupted = Arc::new(AtomicBool::new(false));
        ctrlc::set_handler({
            let interrupted_clone = interrupted.clone();
            move || {
                interrupted_clone.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        })
        .expect("Error setting Ctrl-C handler");
        Self { interrupted }
    }

    /// Shares the interrupt flag so a caller can set it programmatically
    /// (e.g. from a test, or a driver's own signal handling).
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    pub fn interrupt(&mut self) {
        self.interrupted
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Terminator for InterruptTerminator {
    fn terminate(&mut self) -> Option<TerminationReason> {
        if self.interrupted.load(std::sync::atomic::Ordering::SeqCst) {
            Some(TerminationReason::Interrupted)
        } else {
            None
        }
    }
}

/// Terminator that triggers after a specified number of seconds.
pub struct TimeOutTerminator {
    max_time_secs: u64,
    start_time: std::time::Instant,
}

impl TimeOutTerminator {
    pub fn new(max_time_secs: u64) -> Self {
        Self {
            max_time_secs,
            start_time: std::time::Instant::now(),
        }
    }
}

impl Terminator for TimeOutTerminator {
    fn initialize(&mut self) {
        self.start_time = std::time::Instant::now();
    }

    fn terminate(&mut self) -> Option<TerminationReason> {
        if self.start_time.elapsed().as_secs() >= self.max_time_secs {
            Some(TerminationReason::TimeLimit)
        } else {
            None
        }
    }
}

/// Terminator that combines multiple terminators and triggers if any of them do.
pub struct MultipleTerminators {
    terminators: Vec<Box<dyn Terminator>>,
}

impl MultipleTerminators {
    pub fn new(terminators: Vec<Box<dyn Terminator>>) -> Self {
        Self { terminators }
    }
}

impl Terminator for MultipleTerminators {
    fn initialize(&mut self) {
        for terminator in &mut self.terminators {
            terminator.initialize();
        }
    }

    fn terminate(&mut self) -> Option<TerminationReason> {
        for terminator in &mut self.terminators {
            if let Some(reason) = terminator.as_mut().terminate() {
                return Some(reason);
            }
        }
        None
    }
}
