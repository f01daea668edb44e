//! An Augmented Lagrangian Method (ALM) outer driver around a PANOC
//! proximal-gradient inner solver, for nonlinear programs of the form
//!
//! ```text
//!   minimize   f(x)              x in R^n
//!   subject to x in C            (box constraint on the decision variables)
//!              g(x) in D         (general constraints in a box, g: R^n -> R^m)
//! ```
//!
//! The outer driver ([`alm::Alm`]) repeatedly updates Lagrange
//! multipliers and a diagonal penalty, handing each resulting
//! sub-problem to the inner solver ([`panoc::Panoc`]), which combines a
//! forward-backward proximal step with an L-BFGS-accelerated line
//! search on the forward-backward envelope.

pub type E = f64;

pub mod alm;
pub mod box_constraints;
pub mod callback;
pub mod counters;
pub mod error;
pub mod lbfgs;
pub mod linalg;
pub mod panoc;
pub mod problem;
pub mod result;
pub mod terminators;

pub use alm::{Alm, AlmParams};
pub use box_constraints::Box;
pub use error::SolveError;
pub use panoc::{Panoc, PanocParams, PanocStatus};
pub use problem::{Capability, Problem};
pub use result::{SolverResult, Status};
