//! Per-iteration progress hooks for the inner (PANOC) and outer (ALM)
//! solvers, reported on stdout the way the teacher's `ConvergenceOutput`
//! does — no structured-logging crate is introduced since the teacher
//! doesn't reach for one for this concern either.

use crate::E;

/// Hook invoked once per PANOC inner iteration.
pub trait PanocCallback {
    fn call(&mut self, iteration: usize, psi: E, residual: E);
}

/// A callback that does nothing. Use when no per-iteration output is needed.
pub struct NoOpPanocCallback;

impl PanocCallback for NoOpPanocCallback {
    fn call(&mut self, _iteration: usize, _psi: E, _residual: E) {}
}

/// Prints `ψ` and the fixed-point residual norm to stdout each iteration.
pub struct PanocConvergenceOutput;

impl PanocCallback for PanocConvergenceOutput {
    fn call(&mut self, iteration: usize, psi: E, residual: E) {
        println!("| panoc {:4}: | psi = {:<12.6e} | residual = {:<8.2e} |", iteration, psi, residual);
    }
}

/// Hook invoked once per ALM outer iteration.
pub trait AlmCallback {
    fn call(&mut self, outer_iteration: usize, constraint_violation_inf: E, inner_tolerance: E);
}

/// A callback that does nothing.
pub struct NoOpAlmCallback;

impl AlmCallback for NoOpAlmCallback {
    fn call(&mut self, _outer_iteration: usize, _constraint_violation_inf: E, _inner_tolerance: E) {}
}

/// Prints the outer constraint violation and the tightening inner
/// tolerance to stdout each outer iteration.
pub struct AlmConvergenceOutput;

impl AlmCallback for AlmConvergenceOutput {
    fn call(&mut self, outer_iteration: usize, constraint_violation_inf: E, inner_tolerance: E) {
        println!(
            "| alm {:4}: | ||e||_inf = {:<8.2e} | eps_k = {:<8.2e} |",
            outer_iteration, constraint_violation_inf, inner_tolerance
        );
    }
}
