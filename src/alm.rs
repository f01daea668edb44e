//! The outer Augmented Lagrangian Method driver: penalty and multiplier
//! updates, inner-tolerance shrinking, and the overall iteration loop
//! around repeated PANOC sub-solves.

use std::time::Instant;

use faer::{Col, ColRef, unzip, zip};
use serde::{Deserialize, Serialize};

use crate::E;
use crate::callback::{AlmCallback, PanocCallback};
use crate::counters::CountedProblem;
use crate::error::{InvalidArgument, SolveError};
use crate::linalg::vector_ops;
use crate::panoc::{Panoc, PanocParams, PanocStatus};
use crate::problem::Problem;
use crate::result::{SolverResult, Status};
use crate::terminators::{Terminator, TerminationReason};

/// Parameters governing the ALM outer driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlmParams {
    /// Initial-penalty scale `σ₀`, used only when `Σ` is not supplied.
    pub sigma_0: E,
    pub sigma_min: E,
    pub sigma_max: E,
    /// Penalty growth factor `Δ > 1`.
    pub penalty_growth: E,
    /// `θ ∈ (0, 1)`: grow the penalty when `‖e‖ > θ‖e_old‖`.
    pub penalty_update_threshold: E,
    /// `ρ ∈ (0, 1)`: `ε_{k+1} = max(ε_final, ρ·ε_k)`.
    pub tolerance_shrink_factor: E,
    pub max_outer_iterations: usize,
    pub initial_tolerance: E,
    pub final_tolerance: E,
    /// Outer convergence tolerance `δ` on `‖e‖∞`.
    pub outer_tolerance: E,
    /// Uniform-mode penalty update (`true`) vs. per-constraint mode (`false`).
    pub single_penalty_factor: bool,
    /// Safeguard bound `M` on multiplier components.
    pub max_multiplier: E,
    /// Tolerance-mix factor `τ_c` fed into PANOC's stopping residual.
    pub tolerance_mix_factor: E,
}

impl Default for AlmParams {
    fn default() -> Self {
        Self {
            sigma_0: 2.0,
            sigma_min: 1e-8,
            sigma_max: 1e12,
            penalty_growth: 10.0,
            penalty_update_threshold: 0.25,
            tolerance_shrink_factor: 0.1,
            max_outer_iterations: 20,
            initial_tolerance: 1e-2,
            final_tolerance: 1e-8,
            outer_tolerance: 1e-6,
            single_penalty_factor: false,
            max_multiplier: 1e9,
            tolerance_mix_factor: 1.0,
        }
    }
}

impl AlmParams {
    pub fn validate(&self) -> Result<(), SolveError> {
        if !(self.sigma_min > 0.0 && self.sigma_min <= self.sigma_max) {
            return Err(InvalidArgument::new("sigma_min/sigma_max", "require 0 < sigma_min <= sigma_max").into());
        }
        if self.penalty_growth <= 1.0 {
            return Err(InvalidArgument::new("penalty_growth", "must be > 1").into());
        }
        if !(self.penalty_update_threshold > 0.0 && self.penalty_update_threshold < 1.0) {
            return Err(InvalidArgument::new("penalty_update_threshold", "must lie in (0, 1)").into());
        }
        if !(self.tolerance_shrink_factor > 0.0 && self.tolerance_shrink_factor < 1.0) {
            return Err(InvalidArgument::new("tolerance_shrink_factor", "must lie in (0, 1)").into());
        }
        if self.max_outer_iterations < 1 {
            return Err(InvalidArgument::new("max_outer_iterations", "must be >= 1").into());
        }
        if self.initial_tolerance < self.final_tolerance {
            return Err(InvalidArgument::new("initial_tolerance", "must be >= final_tolerance").into());
        }
        if self.final_tolerance <= 0.0 {
            return Err(InvalidArgument::new("final_tolerance", "must be > 0").into());
        }
        if self.max_multiplier <= 0.0 {
            return Err(InvalidArgument::new("max_multiplier", "must be > 0").into());
        }
        Ok(())
    }
}

/// The ALM outer driver.
pub struct Alm<'p, P: Problem + ?Sized> {
    problem: &'p P,
    alm_params: AlmParams,
    panoc_params: PanocParams,
}

impl<'p, P: Problem + ?Sized> Alm<'p, P> {
    pub fn new(problem: &'p P, alm_params: AlmParams, panoc_params: PanocParams) -> Result<Self, SolveError> {
        alm_params.validate()?;
        panoc_params.validate()?;
        Ok(Self {
            problem,
            alm_params,
            panoc_params,
        })
    }

    /// Initial penalty per §4.5.1: not charged against inner iteration
    /// limits.
    fn initial_penalty(&self, x0: ColRef<E>) -> Result<Col<E>, SolveError> {
        let m = self.problem.m();
        let f0 = self.problem.eval_f(x0)?;
        let mut g0 = Col::<E>::zeros(m);
        self.problem.eval_g(x0, &mut g0)?;
        let g_norm_sq = vector_ops::dot(g0.as_ref(), g0.as_ref());

        let sigma = self.alm_params.sigma_0 * f0.abs().max(1.0) / (0.5 * g_norm_sq).max(1.0);
        let sigma = sigma.clamp(self.alm_params.sigma_min, self.alm_params.sigma_max);
        Ok(Col::from_fn(m, |_| sigma))
    }

    /// `Y(M)`: projects a candidate multiplier onto the safeguard
    /// region, substituting `0` for any non-finite component first
    /// (per the NaN-in-multiplier-projection resolution).
    fn project_multiplier(&self, yhat: ColRef<E>, out: &mut Col<E>) {
        let box_d = self.problem.box_d();
        zip!(out.as_mut(), yhat, box_d.lower(), box_d.upper()).for_each(
            |unzip!(o, yhat_i, lo, up)| {
                let v = if yhat_i.is_finite() { *yhat_i } else { 0.0 };
                let lb = if *lo == E::NEG_INFINITY { 0.0 } else { -self.alm_params.max_multiplier };
                let ub = if *up == E::INFINITY { 0.0 } else { self.alm_params.max_multiplier };
                *o = crate::box_constraints::clamp(v, lb, ub);
            },
        );
    }

    fn update_penalty(&self, sigma: &mut Col<E>, e: ColRef<E>, e_old: Option<ColRef<E>>, e_norm: E) {
        let theta = self.alm_params.penalty_update_threshold;
        let delta = self.alm_params.penalty_growth;
        let sigma_max = self.alm_params.sigma_max;

        let should_grow = |e_i: E, e_old_i: Option<E>| match e_old_i {
            None => true,
            Some(e_old_i) => e_i.abs() > theta * e_old_i.abs(),
        };

        if self.alm_params.single_penalty_factor {
            let grow = match e_old {
                None => true,
                Some(e_old) => e_norm > theta * vector_ops::norm_inf(e_old),
            };
            if grow {
                zip!(sigma.as_mut()).for_each(|unzip!(s)| *s = (delta * *s).min(sigma_max));
            }
        } else {
            let n = sigma.nrows();
            for i in 0..n {
                let e_old_i = e_old.map(|eo| eo[i]);
                if should_grow(e[i], e_old_i) {
                    let factor = (delta * e[i].abs() / e_norm.max(E::EPSILON)).max(1.0);
                    sigma[i] = (factor * sigma[i]).min(sigma_max);
                }
            }
        }
    }

    /// Runs the ALM outer loop starting from `(x0, y0)`. `y0` may be
    /// empty (`m == 0`); `sigma0` is computed per §4.5.1 when `None`.
    pub fn solve(
        &self,
        x0: ColRef<E>,
        y0: Option<ColRef<E>>,
        sigma0: Option<ColRef<E>>,
        panoc_callback: &mut dyn PanocCallback,
        alm_callback: &mut dyn AlmCallback,
        terminator: &mut dyn Terminator,
    ) -> Result<SolverResult, SolveError> {
        let start = Instant::now();
        let m = self.problem.m();
        let n = self.problem.n();
        assert_eq!(x0.nrows(), n);

        let counted = CountedProblem::new(self.problem);
        let panoc = Panoc::new(&counted, self.panoc_params.clone())?;

        let mut y = match y0 {
            Some(y0) => vector_ops::to_owned(y0),
            None => Col::zeros(m),
        };
        let mut sigma = match sigma0 {
            Some(s) => vector_ops::to_owned(s),
            None => self.initial_penalty(x0)?,
        };

        let mut x = vector_ops::to_owned(x0);
        let mut tol = self.alm_params.initial_tolerance;
        let mut e_old: Option<Col<E>> = None;
        let mut total_inner_iterations = 0usize;
        let mut last_psi = 0.0;
        let mut last_yhat = Col::<E>::zeros(m);

        for outer_iter in 0..self.alm_params.max_outer_iterations {
            let out = panoc.solve(
                y.as_ref(),
                sigma.as_ref(),
                x.as_ref(),
                tol,
                self.alm_params.tolerance_mix_factor,
                panoc_callback,
                terminator,
            )?;

            total_inner_iterations += out.iterations;
            x = out.x;
            last_yhat = out.yhat;
            last_psi = out.psi;

            if out.status == PanocStatus::Interrupted {
                return Ok(self.make_result(Status::Interrupted, x, y, sigma, last_psi, out.grad_psi_inf_norm, out.r_gamma_inf_norm, E::NAN, outer_iter, total_inner_iterations, &counted, start));
            }
            if out.status == PanocStatus::NotFinite {
                return Ok(self.make_result(Status::NotFinite, x, y, sigma, last_psi, out.grad_psi_inf_norm, out.r_gamma_inf_norm, E::NAN, outer_iter, total_inner_iterations, &counted, start));
            }
            if out.status == PanocStatus::InteriorStepFailed {
                return Ok(self.make_result(Status::InteriorStepFailed, x, y, sigma, last_psi, out.grad_psi_inf_norm, out.r_gamma_inf_norm, E::NAN, outer_iter, total_inner_iterations, &counted, start));
            }

            // e = (yhat - y) / sigma, componentwise.
            let mut e = Col::<E>::zeros(m);
            zip!(e.as_mut(), last_yhat.as_ref(), y.as_ref(), sigma.as_ref())
                .for_each(|unzip!(o, yhat_i, y_i, s_i)| *o = (*yhat_i - *y_i) / *s_i);
            let e_norm = vector_ops::norm_inf(e.as_ref());

            alm_callback.call(outer_iter, e_norm, tol);

            if e_norm <= self.alm_params.outer_tolerance {
                let y_final = vector_ops::to_owned(last_yhat.as_ref());
                return Ok(self.make_result(Status::Converged, x, y_final, sigma, last_psi, out.grad_psi_inf_norm, out.r_gamma_inf_norm, e_norm, outer_iter + 1, total_inner_iterations, &counted, start));
            }

            if terminator.terminate() == Some(TerminationReason::Interrupted) {
                return Ok(self.make_result(Status::Interrupted, x, y, sigma, last_psi, out.grad_psi_inf_norm, out.r_gamma_inf_norm, e_norm, outer_iter + 1, total_inner_iterations, &counted, start));
            }

            // Multiplier update.
            let mut y_next = Col::<E>::zeros(m);
            self.project_multiplier(last_yhat.as_ref(), &mut y_next);

            // Penalty update (uses the pre-update e/e_old pair).
            self.update_penalty(&mut sigma, e.as_ref(), e_old.as_ref().map(|c| c.as_ref()), e_norm);

            y = y_next;
            e_old = Some(e);
            tol = self.alm_params.final_tolerance.max(self.alm_params.tolerance_shrink_factor * tol);
        }

        let grad_psi_inf = E::NAN;
        let r_gamma_inf = E::NAN;
        let e_norm = e_old.as_ref().map(|e| vector_ops::norm_inf(e.as_ref())).unwrap_or(E::NAN);
        Ok(self.make_result(Status::MaxIter, x, y, sigma, last_psi, grad_psi_inf, r_gamma_inf, e_norm, self.alm_params.max_outer_iterations, total_inner_iterations, &counted, start))
    }

    #[allow(clippy::too_many_arguments)]
    fn make_result(
        &self,
        status: Status,
        x: Col<E>,
        y: Col<E>,
        sigma: Col<E>,
        psi: E,
        grad_psi_inf_norm: E,
        r_gamma_inf_norm: E,
        constraint_violation_inf_norm: E,
        outer_iterations: usize,
        total_inner_iterations: usize,
        counted: &CountedProblem<'_, P>,
        start: Instant,
    ) -> SolverResult {
        let f = self.problem.eval_f(x.as_ref()).unwrap_or(E::NAN);
        SolverResult {
            status,
            x,
            y,
            sigma,
            f,
            psi,
            grad_psi_inf_norm,
            r_gamma_inf_norm,
            constraint_violation_inf_norm,
            outer_iterations,
            total_inner_iterations,
            counters: counted.counts(),
            elapsed: start.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::box_constraints::Box as Bx;
    use crate::callback::{NoOpAlmCallback, NoOpPanocCallback};
    use crate::terminators::NoOpTerminator;

    struct LinearEqualityLp {
        box_c: Bx,
        box_d: Bx,
    }

    impl Problem for LinearEqualityLp {
        fn n(&self) -> usize {
            2
        }
        fn m(&self) -> usize {
            1
        }
        fn box_c(&self) -> &Bx {
            &self.box_c
        }
        fn box_d(&self) -> &Bx {
            &self.box_d
        }
        fn eval_f(&self, x: ColRef<E>) -> Result<E, SolveError> {
            Ok(0.5 * vector_ops::dot(x, x))
        }
        fn eval_grad_f(&self, x: ColRef<E>, out: &mut Col<E>) -> Result<(), SolveError> {
            zip!(out.as_mut(), x).for_each(|unzip!(o, x_i)| *o = *x_i);
            Ok(())
        }
        fn eval_g(&self, x: ColRef<E>, gx: &mut Col<E>) -> Result<(), SolveError> {
            gx[0] = x[0] + x[1] - 1.0;
            Ok(())
        }
        fn eval_grad_g_prod(&self, _x: ColRef<E>, y: ColRef<E>, out: &mut Col<E>) -> Result<(), SolveError> {
            out[0] = y[0];
            out[1] = y[0];
            Ok(())
        }
    }

    #[test]
    fn linear_equality_lp_converges_to_half_half() {
        let problem = LinearEqualityLp {
            box_c: Bx::unbounded(2),
            box_d: Bx::new(Col::from_fn(1, |_| 0.0), Col::from_fn(1, |_| 0.0)),
        };
        let alm = Alm::new(&problem, AlmParams::default(), PanocParams::default()).unwrap();

        let x0 = Col::from_fn(2, |_| 0.0);
        let y0 = Col::from_fn(1, |_| 0.0);

        let mut panoc_cb = NoOpPanocCallback;
        let mut alm_cb = NoOpAlmCallback;
        let mut term = NoOpTerminator;
        let result = alm
            .solve(x0.as_ref(), Some(y0.as_ref()), None, &mut panoc_cb, &mut alm_cb, &mut term)
            .unwrap();

        assert_eq!(result.status, Status::Converged);
        assert!((result.x[0] - 0.5).abs() < 1e-3);
        assert!((result.x[1] - 0.5).abs() < 1e-3);
        assert!(result.outer_iterations <= 5);
    }

    #[test]
    fn infeasible_start_still_converges() {
        let problem = LinearEqualityLp {
            box_c: Bx::unbounded(2),
            box_d: Bx::new(Col::from_fn(1, |_| 0.0), Col::from_fn(1, |_| 0.0)),
        };
        let mut params = AlmParams::default();
        params.max_outer_iterations = 10;
        let alm = Alm::new(&problem, params, PanocParams::default()).unwrap();

        let x0 = Col::from_fn(2, |_| 10.0);
        let y0 = Col::from_fn(1, |_| 0.0);

        let mut panoc_cb = NoOpPanocCallback;
        let mut alm_cb = NoOpAlmCallback;
        let mut term = NoOpTerminator;
        let result = alm
            .solve(x0.as_ref(), Some(y0.as_ref()), None, &mut panoc_cb, &mut alm_cb, &mut term)
            .unwrap();

        assert_eq!(result.status, Status::Converged);
        assert!(result.constraint_violation_inf_norm <= AlmParams::default().outer_tolerance);
    }

    #[test]
    fn sigma_is_monotonically_non_decreasing() {
        let problem = LinearEqualityLp {
            box_c: Bx::unbounded(2),
            box_d: Bx::new(Col::from_fn(1, |_| 0.0), Col::from_fn(1, |_| 0.0)),
        };
        let alm = Alm::new(&problem, AlmParams::default(), PanocParams::default()).unwrap();

        let mut sigma = Col::from_fn(1, |_| 1.0);
        let e1 = Col::from_fn(1, |_| 1.0);
        alm.update_penalty(&mut sigma, e1.as_ref(), None, 1.0);
        let after_first = sigma[0];

        let e2 = Col::from_fn(1, |_| 0.9);
        alm.update_penalty(&mut sigma, e2.as_ref(), Some(e1.as_ref()), 0.9);
        assert!(sigma[0] >= after_first);
    }

    /// Fires `Interrupted` the first time `terminate()` is sampled after
    /// the configured inner iteration has been crossed.
    struct FireAfter {
        calls: std::cell::Cell<usize>,
        fire_after: usize,
    }

    impl Terminator for FireAfter {
        fn terminate(&mut self) -> Option<TerminationReason> {
            let calls = self.calls.get() + 1;
            self.calls.set(calls);
            if calls > self.fire_after {
                Some(TerminationReason::Interrupted)
            } else {
                None
            }
        }
    }

    #[test]
    fn interrupt_after_third_inner_iteration_reports_interrupted_finite_iterate() {
        let problem = LinearEqualityLp {
            box_c: Bx::unbounded(2),
            box_d: Bx::new(Col::from_fn(1, |_| 0.0), Col::from_fn(1, |_| 0.0)),
        };
        let alm = Alm::new(&problem, AlmParams::default(), PanocParams::default()).unwrap();

        let x0 = Col::from_fn(2, |_| 10.0);
        let mut panoc_cb = NoOpPanocCallback;
        let mut alm_cb = NoOpAlmCallback;
        let mut term = FireAfter { calls: std::cell::Cell::new(0), fire_after: 3 };
        let result = alm
            .solve(x0.as_ref(), None, None, &mut panoc_cb, &mut alm_cb, &mut term)
            .unwrap();

        assert_eq!(result.status, Status::Interrupted);
        assert!(vector_ops::is_finite(result.x.as_ref()));
    }
}
