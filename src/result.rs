//! The solver result record returned by the ALM outer driver (§6.2).

use std::time::Duration;

use faer::Col;
use serde::{Deserialize, Serialize};

use crate::E;
use crate::counters::EvalCounts;

/// Why a solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Converged,
    MaxIter,
    MaxTime,
    NotFinite,
    Interrupted,
    InteriorStepFailed,
    InvalidArgument,
}

/// The full result of an ALM/PANOC solve.
#[derive(Debug, Clone)]
pub struct SolverResult {
    pub status: Status,
    pub x: Col<E>,
    pub y: Col<E>,
    pub sigma: Col<E>,
    pub f: E,
    pub psi: E,
    pub grad_psi_inf_norm: E,
    pub r_gamma_inf_norm: E,
    pub constraint_violation_inf_norm: E,
    pub outer_iterations: usize,
    pub total_inner_iterations: usize,
    pub counters: EvalCounts,
    pub elapsed: Duration,
}
