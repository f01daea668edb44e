//! PANOC: the proximal-gradient / quasi-Newton inner solver that
//! minimizes `ψ(x) + I_C(x)` for one fixed augmented-Lagrangian
//! sub-problem `(y, Σ)`.

use std::time::{Duration, Instant};

use faer::{Col, ColRef, unzip, zip};
use serde::{Deserialize, Serialize};

use crate::E;
use crate::callback::PanocCallback;
use crate::error::{InvalidArgument, SolveError};
use crate::lbfgs::LbfgsBuffer;
use crate::linalg::vector_ops;
use crate::problem::Problem;
use crate::terminators::Terminator;

/// Parameters governing one PANOC sub-solve (§4.4.3 of the parameter
/// contract). Validated once at construction; defaults are the spec's
/// suggested values, not mandatory ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanocParams {
    /// Hard iteration cap, must be `>= 1`.
    pub max_iter: usize,
    /// Wall-clock cap; `None` means unbounded.
    pub max_time: Option<Duration>,
    /// Smallest line-search `τ`, in `(0, 1)`.
    pub tau_min: E,
    /// Lower clamp for the Lipschitz estimate, `0 < l_min <= l_max`.
    pub l_min: E,
    /// Upper clamp for the Lipschitz estimate.
    pub l_max: E,
    /// `α` in `γ = α / L`, `α ∈ (0, 1)`.
    pub lipschitz_factor: E,
    /// Relative slack `τ_rtol` in the Lipschitz backtracking test, `>= 0`.
    pub quadratic_upperbound_tolerance_factor: E,
    /// L-BFGS history length `M`, `>= 1`.
    pub lbfgs_memory: usize,
    /// Curvature-rejection threshold for L-BFGS updates.
    pub curvature_eps: E,
    /// Sufficient-decrease factor `σ` in the FBE line search.
    pub sufficient_decrease: E,
    /// Number of Lipschitz doublings allowed before `interior-step-failed`.
    pub max_lipschitz_backtracks: usize,
    /// Number of consecutive `τ = 0` steps before the L-BFGS history resets.
    pub lbfgs_reset_after_failures: usize,
}

impl Default for PanocParams {
    fn default() -> Self {
        Self {
            max_iter: 500,
            max_time: None,
            tau_min: 1.0 / 256.0,
            l_min: 1e-10,
            l_max: 1e20,
            lipschitz_factor: 0.95,
            quadratic_upperbound_tolerance_factor: 1e-14,
            lbfgs_memory: 10,
            curvature_eps: crate::lbfgs::DEFAULT_CURVATURE_EPS,
            sufficient_decrease: 0.1,
            max_lipschitz_backtracks: 50,
            lbfgs_reset_after_failures: 5,
        }
    }
}

impl PanocParams {
    pub fn validate(&self) -> Result<(), SolveError> {
        if self.max_iter < 1 {
            return Err(InvalidArgument::new("max_iter", "must be >= 1").into());
        }
        if matches!(self.max_time, Some(d) if d.is_zero()) {
            return Err(InvalidArgument::new("max_time", "must be > 0").into());
        }
        if !(self.tau_min > 0.0 && self.tau_min < 1.0) {
            return Err(InvalidArgument::new("tau_min", "must lie in (0, 1)").into());
        }
        if !(self.l_min > 0.0 && self.l_min <= self.l_max) {
            return Err(InvalidArgument::new("l_min/l_max", "require 0 < l_min <= l_max").into());
        }
        if !(self.lipschitz_factor > 0.0 && self.lipschitz_factor < 1.0) {
            return Err(
                InvalidArgument::new("lipschitz_factor", "must lie in (0, 1)").into(),
            );
        }
        if self.quadratic_upperbound_tolerance_factor < 0.0 {
            return Err(InvalidArgument::new(
                "quadratic_upperbound_tolerance_factor",
                "must be >= 0",
            )
            .into());
        }
        if self.lbfgs_memory < 1 {
            return Err(InvalidArgument::new("lbfgs_memory", "must be >= 1").into());
        }
        Ok(())
    }
}

/// Why a PANOC sub-solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanocStatus {
    Converged,
    MaxIter,
    MaxTime,
    NotFinite,
    InteriorStepFailed,
    Interrupted,
}

/// The outcome of one PANOC sub-solve.
pub struct PanocOutput {
    pub status: PanocStatus,
    pub x: Col<E>,
    /// The `ŷ` by-product of the final `eval_psi_yhat`/`eval_psi_grad_psi`
    /// call, i.e. the implied Lagrange candidate.
    pub yhat: Col<E>,
    pub psi: E,
    pub grad_psi_inf_norm: E,
    pub r_gamma_inf_norm: E,
    pub iterations: usize,
}

/// All buffers PANOC needs, pre-allocated once per solve so the hot
/// loop performs no allocation.
struct Workspace {
    xk: Col<E>,
    xhat: Col<E>,
    grad_psi: Col<E>,
    yhat: Col<E>,
    r_gamma: Col<E>,
    direction: Col<E>,
    x_next: Col<E>,
    grad_psi_next: Col<E>,
    yhat_next: Col<E>,
    r_gamma_next: Col<E>,
    /// Forward-step projection temp (`x − γ∇ψ(x)`, pre-projection).
    /// Transient within a single step; never holds a value that survives
    /// across the `p`/`direction` computation below it.
    scratch_n: Col<E>,
    /// `pₖ = x̂ₖ − xₖ`, the proximal-gradient step. Kept in its own
    /// buffer, separate from `scratch_n`, since it is read throughout the
    /// line-search loop while `scratch_n` is reused as a forward-step
    /// temp on every finite candidate.
    p: Col<E>,
    xhat_next: Col<E>,
    s: Col<E>,
    y_pair: Col<E>,
    dual_diff: Col<E>,
}

impl Workspace {
    fn new(n: usize, m: usize) -> Self {
        Self {
            xk: Col::zeros(n),
            xhat: Col::zeros(n),
            grad_psi: Col::zeros(n),
            yhat: Col::zeros(m),
            r_gamma: Col::zeros(n),
            direction: Col::zeros(n),
            x_next: Col::zeros(n),
            grad_psi_next: Col::zeros(n),
            yhat_next: Col::zeros(m),
            r_gamma_next: Col::zeros(n),
            scratch_n: Col::zeros(n),
            p: Col::zeros(n),
            xhat_next: Col::zeros(n),
            s: Col::zeros(n),
            y_pair: Col::zeros(n),
            dual_diff: Col::zeros(m),
        }
    }
}

/// Estimates an initial Lipschitz constant of `∇ψ` by finite-differencing
/// the gradient along itself, clamped to `[l_min, l_max]`.
fn estimate_initial_lipschitz<P: Problem + ?Sized>(
    problem: &P,
    x0: ColRef<E>,
    grad0: ColRef<E>,
    y: ColRef<E>,
    sigma: ColRef<E>,
    params: &PanocParams,
) -> Result<E, SolveError> {
    let grad_norm = vector_ops::norm_l2(grad0);
    if grad_norm == 0.0 {
        return Ok(params.l_min);
    }
    let h = (1e-6_f64).max(1e-6 * grad_norm);
    let mut x_perturbed = vector_ops::to_owned(x0);
    zip!(x_perturbed.as_mut(), grad0).for_each(|unzip!(x_i, g_i)| *x_i -= h * g_i / grad_norm);

    let mut grad_perturbed = Col::<E>::zeros(x0.nrows());
    problem.eval_grad_psi(x_perturbed.as_ref(), y, sigma, &mut grad_perturbed)?;

    let mut diff = Col::<E>::zeros(x0.nrows());
    zip!(diff.as_mut(), grad_perturbed.as_ref(), grad0)
        .for_each(|unzip!(d, gp, g)| *d = *gp - *g);
    let l = vector_ops::norm_l2(diff.as_ref()) / h;
    Ok(l.clamp(params.l_min, params.l_max))
}

/// `R_γ(x) = (x − Π_C(x − γ∇ψ(x))) / γ`, computed from an already-taken
/// forward step `x̂ = Π_C(x − γ∇ψ(x))`: `R_γ(x) = (x − x̂) / γ`.
fn residual_from_forward_step(x: ColRef<E>, xhat: ColRef<E>, gamma: E, out: &mut Col<E>) {
    zip!(out.as_mut(), x, xhat).for_each(|unzip!(o, x_i, xhat_i)| *o = (*x_i - *xhat_i) / gamma);
}

/// The PANOC inner solver.
pub struct Panoc<'p, P: Problem + ?Sized> {
    problem: &'p P,
    params: PanocParams,
}

impl<'p, P: Problem + ?Sized> Panoc<'p, P> {
    pub fn new(problem: &'p P, params: PanocParams) -> Result<Self, SolveError> {
        params.validate()?;
        Ok(Self { problem, params })
    }

    /// Solves `minimize ψ(x) + I_C(x)` for the sub-problem `(y, Σ)`,
    /// starting from `x0`, to inner tolerance `tol`. `tau_c` mixes in
    /// the dual-residual term of the stopping criterion (only active
    /// when `m > 0`); it is an ALM-level parameter threaded through.
    pub fn solve(
        &self,
        y: ColRef<E>,
        sigma: ColRef<E>,
        x0: ColRef<E>,
        tol: E,
        tau_c: E,
        callback: &mut dyn PanocCallback,
        terminator: &mut dyn Terminator,
    ) -> Result<PanocOutput, SolveError> {
        let n = self.problem.n();
        let m = self.problem.m();
        let start = Instant::now();
        let mut ws = Workspace::new(n, m);
        let mut lbfgs = LbfgsBuffer::new(self.params.lbfgs_memory, self.params.curvature_eps);

        zip!(ws.xk.as_mut(), x0).for_each(|unzip!(o, x_i)| *o = *x_i);
        let mut psi_k = self
            .problem
            .eval_psi_grad_psi(ws.xk.as_ref(), y, sigma, &mut ws.grad_psi)?;
        // eval_psi_grad_psi above recomputed yhat internally but did not
        // expose it; recover it with one extra (cheap, m-length) call so
        // the reported/iterated yhat is always in sync with xk.
        self.problem
            .eval_psi_yhat(ws.xk.as_ref(), y, sigma, &mut ws.yhat)?;

        if !psi_k.is_finite() || !vector_ops::is_finite(ws.grad_psi.as_ref()) {
            return Ok(PanocOutput {
                status: PanocStatus::NotFinite,
                x: ws.xk,
                yhat: ws.yhat,
                psi: psi_k,
                grad_psi_inf_norm: E::NAN,
                r_gamma_inf_norm: E::NAN,
                iterations: 0,
            });
        }

        let mut l = estimate_initial_lipschitz(self.problem, ws.xk.as_ref(), ws.grad_psi.as_ref(), y, sigma, &self.params)?;
        let mut consecutive_pure_steps = 0usize;

        terminator.initialize();

        for iter in 0..self.params.max_iter {
            if let Some(max_time) = self.params.max_time {
                if start.elapsed() >= max_time {
                    return Ok(self.finish(PanocStatus::MaxTime, ws, psi_k, iter));
                }
            }
            if terminator.terminate().is_some() {
                return Ok(self.finish(PanocStatus::Interrupted, ws, psi_k, iter));
            }

            // 1. Forward step + 2. Lipschitz backtracking test.
            let mut gamma = self.params.lipschitz_factor / l;
            zip!(ws.scratch_n.as_mut(), ws.xk.as_ref(), ws.grad_psi.as_ref())
                .for_each(|unzip!(o, x_i, g_i)| *o = *x_i - gamma * *g_i);
            self.problem
                .box_c()
                .project_into(ws.scratch_n.as_ref(), &mut ws.xhat);
            residual_from_forward_step(ws.xk.as_ref(), ws.xhat.as_ref(), gamma, &mut ws.r_gamma);

            let mut backtracks = 0usize;
            loop {
                let psi_hat = self
                    .problem
                    .eval_psi_yhat(ws.xhat.as_ref(), y, sigma, &mut ws.yhat_next)?;
                if !psi_hat.is_finite() {
                    return Ok(self.finish(PanocStatus::NotFinite, ws, psi_k, iter));
                }

                zip!(ws.p.as_mut(), ws.xhat.as_ref(), ws.xk.as_ref())
                    .for_each(|unzip!(o, xh, x_i)| *o = *xh - *x_i);
                let p_dot_grad = vector_ops::dot(ws.grad_psi.as_ref(), ws.p.as_ref());
                let p_norm_sq = vector_ops::dot(ws.p.as_ref(), ws.p.as_ref());
                let rhs = psi_k
                    + p_dot_grad
                    + 0.5 * l * p_norm_sq
                    + self.params.quadratic_upperbound_tolerance_factor * psi_k.abs();

                if psi_hat <= rhs {
                    break;
                }
                backtracks += 1;
                if l >= self.params.l_max || backtracks > self.params.max_lipschitz_backtracks {
                    return Ok(self.finish(PanocStatus::InteriorStepFailed, ws, psi_k, iter));
                }
                l = (2.0 * l).min(self.params.l_max);
                gamma = self.params.lipschitz_factor / l;
                zip!(ws.scratch_n.as_mut(), ws.xk.as_ref(), ws.grad_psi.as_ref())
                    .for_each(|unzip!(o, x_i, g_i)| *o = *x_i - gamma * *g_i);
                self.problem
                    .box_c()
                    .project_into(ws.scratch_n.as_ref(), &mut ws.xhat);
                residual_from_forward_step(ws.xk.as_ref(), ws.xhat.as_ref(), gamma, &mut ws.r_gamma);
            }

            // pk = xhat - xk, already current in `ws.p` from the final
            // (accepted) backtracking iteration above.

            // 3. Quasi-Newton direction.
            if lbfgs.is_empty() {
                zip!(ws.direction.as_mut(), ws.p.as_ref()).for_each(|unzip!(d, p)| *d = *p);
            } else {
                lbfgs.apply(ws.r_gamma.as_ref(), &mut ws.direction);
                zip!(ws.direction.as_mut()).for_each(|unzip!(d)| *d = -*d);
            }

            // 4. Line search on the FBE.
            let phi_k = psi_k - 0.5 * gamma * vector_ops::dot(ws.grad_psi.as_ref(), ws.grad_psi.as_ref())
                + 0.5 * gamma * vector_ops::dot(ws.r_gamma.as_ref(), ws.r_gamma.as_ref());
            let r_gamma_norm_sq = vector_ops::dot(ws.r_gamma.as_ref(), ws.r_gamma.as_ref());

            let mut tau = 1.0;
            let mut accepted_tau = None;
            loop {
                zip!(
                    ws.x_next.as_mut(),
                    ws.xk.as_ref(),
                    ws.p.as_ref(),
                    ws.direction.as_ref()
                )
                .for_each(|unzip!(o, x_i, p_i, d_i)| *o = *x_i + (1.0 - tau) * *p_i + tau * *d_i);

                let psi_next =
                    self.problem
                        .eval_psi_grad_psi(ws.x_next.as_ref(), y, sigma, &mut ws.grad_psi_next)?;

                if psi_next.is_finite() && vector_ops::is_finite(ws.grad_psi_next.as_ref()) {
                    let gamma_c = self.params.lipschitz_factor / l;
                    zip!(ws.scratch_n.as_mut(), ws.x_next.as_ref(), ws.grad_psi_next.as_ref())
                        .for_each(|unzip!(o, x_i, g_i)| *o = *x_i - gamma_c * *g_i);
                    self.problem
                        .box_c()
                        .project_into(ws.scratch_n.as_ref(), &mut ws.xhat_next);
                    residual_from_forward_step(ws.x_next.as_ref(), ws.xhat_next.as_ref(), gamma_c, &mut ws.r_gamma_next);

                    let phi_next = psi_next
                        - 0.5 * gamma_c * vector_ops::dot(ws.grad_psi_next.as_ref(), ws.grad_psi_next.as_ref())
                        + 0.5 * gamma_c * vector_ops::dot(ws.r_gamma_next.as_ref(), ws.r_gamma_next.as_ref());

                    if phi_next <= phi_k - self.params.sufficient_decrease * gamma * r_gamma_norm_sq {
                        accepted_tau = Some((tau, psi_next));
                        break;
                    }
                }

                tau *= 0.5;
                if tau < self.params.tau_min {
                    break;
                }
            }

            let (tau_used, psi_next) = match accepted_tau {
                Some((tau, psi_next)) => {
                    // `xhat_next`/`r_gamma_next` were already populated for
                    // this `x_next` by the accepted candidate above; only
                    // the `ŷ` by-product still needs recovering, and only
                    // for the one candidate that was actually kept.
                    self.problem
                        .eval_psi_yhat(ws.x_next.as_ref(), y, sigma, &mut ws.yhat_next)?;
                    (tau, psi_next)
                }
                None => {
                    // Pure proximal-gradient fallback: x_next = xhat.
                    zip!(ws.x_next.as_mut(), ws.xhat.as_ref()).for_each(|unzip!(o, xh)| *o = *xh);
                    let psi_next = self.problem.eval_psi_grad_psi(
                        ws.x_next.as_ref(),
                        y,
                        sigma,
                        &mut ws.grad_psi_next,
                    )?;
                    self.problem
                        .eval_psi_yhat(ws.x_next.as_ref(), y, sigma, &mut ws.yhat_next)?;
                    if !psi_next.is_finite() {
                        return Ok(self.finish(PanocStatus::NotFinite, ws, psi_k, iter));
                    }
                    // The line search above never reached an accepted
                    // candidate, so `xhat_next`/`r_gamma_next` still hold
                    // whatever the last rejected candidate left behind;
                    // recompute them at the fallback iterate.
                    let gamma_next = self.params.lipschitz_factor / l;
                    zip!(ws.scratch_n.as_mut(), ws.x_next.as_ref(), ws.grad_psi_next.as_ref())
                        .for_each(|unzip!(o, x_i, g_i)| *o = *x_i - gamma_next * *g_i);
                    self.problem
                        .box_c()
                        .project_into(ws.scratch_n.as_ref(), &mut ws.xhat_next);
                    residual_from_forward_step(ws.x_next.as_ref(), ws.xhat_next.as_ref(), gamma_next, &mut ws.r_gamma_next);
                    (0.0, psi_next)
                }
            };

            if tau_used == 0.0 {
                consecutive_pure_steps += 1;
                if consecutive_pure_steps >= self.params.lbfgs_reset_after_failures {
                    lbfgs.reset();
                    consecutive_pure_steps = 0;
                }
            } else {
                consecutive_pure_steps = 0;
            }

            // 5. L-BFGS update: s = x_next - xk, y = r_gamma_next - r_gamma.
            zip!(ws.s.as_mut(), ws.x_next.as_ref(), ws.xk.as_ref()).for_each(|unzip!(o, a, b)| *o = *a - *b);
            zip!(ws.y_pair.as_mut(), ws.r_gamma_next.as_ref(), ws.r_gamma.as_ref())
                .for_each(|unzip!(o, a, b)| *o = *a - *b);
            lbfgs.update(ws.s.as_ref(), ws.y_pair.as_ref());

            // 6. Stopping criterion.
            let r_gamma_inf = vector_ops::norm_inf(ws.r_gamma_next.as_ref());
            let dual_term = if m > 0 {
                zip!(ws.dual_diff.as_mut(), ws.yhat_next.as_ref(), y).for_each(|unzip!(o, a, b)| *o = *a - *b);
                tau_c * vector_ops::norm_inf(ws.dual_diff.as_ref())
            } else {
                0.0
            };
            let residual = r_gamma_inf.max(dual_term);

            // Commit the new iterate.
            zip!(ws.xk.as_mut(), ws.x_next.as_ref()).for_each(|unzip!(o, n_)| *o = *n_);
            zip!(ws.grad_psi.as_mut(), ws.grad_psi_next.as_ref()).for_each(|unzip!(o, n_)| *o = *n_);
            zip!(ws.r_gamma.as_mut(), ws.r_gamma_next.as_ref()).for_each(|unzip!(o, n_)| *o = *n_);
            zip!(ws.yhat.as_mut(), ws.yhat_next.as_ref()).for_each(|unzip!(o, n_)| *o = *n_);
            psi_k = psi_next;

            callback.call(iter, psi_k, residual);

            if residual <= tol {
                return Ok(PanocOutput {
                    status: PanocStatus::Converged,
                    x: ws.xk,
                    yhat: ws.yhat,
                    psi: psi_k,
                    grad_psi_inf_norm: vector_ops::norm_inf(ws.grad_psi.as_ref()),
                    r_gamma_inf_norm: r_gamma_inf,
                    iterations: iter + 1,
                });
            }
        }

        Ok(self.finish(PanocStatus::MaxIter, ws, psi_k, self.params.max_iter))
    }

    fn finish(&self, status: PanocStatus, ws: Workspace, psi: E, iterations: usize) -> PanocOutput {
        PanocOutput {
            grad_psi_inf_norm: vector_ops::norm_inf(ws.grad_psi.as_ref()),
            r_gamma_inf_norm: vector_ops::norm_inf(ws.r_gamma.as_ref()),
            status,
            x: ws.xk,
            yhat: ws.yhat,
            psi,
            iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::box_constraints::Box as Bx;
    use crate::callback::NoOpPanocCallback;
    use crate::terminators::NoOpTerminator;

    struct Quadratic1D {
        box_c: Bx,
        box_d: Bx,
    }

    impl Problem for Quadratic1D {
        fn n(&self) -> usize {
            1
        }
        fn m(&self) -> usize {
            0
        }
        fn box_c(&self) -> &Bx {
            &self.box_c
        }
        fn box_d(&self) -> &Bx {
            &self.box_d
        }
        fn eval_f(&self, x: ColRef<E>) -> Result<E, SolveError> {
            Ok(0.5 * x[0] * x[0])
        }
        fn eval_grad_f(&self, x: ColRef<E>, out: &mut Col<E>) -> Result<(), SolveError> {
            out[0] = x[0];
            Ok(())
        }
        fn eval_g(&self, _x: ColRef<E>, _gx: &mut Col<E>) -> Result<(), SolveError> {
            Ok(())
        }
        fn eval_grad_g_prod(
            &self,
            _x: ColRef<E>,
            _y: ColRef<E>,
            out: &mut Col<E>,
        ) -> Result<(), SolveError> {
            out[0] = 0.0;
            Ok(())
        }
    }

    #[test]
    fn unconstrained_quadratic_converges_to_origin() {
        let problem = Quadratic1D {
            box_c: Bx::unbounded(1),
            box_d: Bx::unbounded(0),
        };
        let solver = Panoc::new(&problem, PanocParams::default()).unwrap();
        let x0 = Col::from_fn(1, |_| 3.0);
        let y = Col::<E>::zeros(0);
        let sigma = Col::<E>::zeros(0);

        let mut cb = NoOpPanocCallback;
        let mut term = NoOpTerminator;
        let out = solver
            .solve(y.as_ref(), sigma.as_ref(), x0.as_ref(), 1e-8, 0.0, &mut cb, &mut term)
            .unwrap();

        assert_eq!(out.status, PanocStatus::Converged);
        assert!(out.x[0].abs() < 1e-6);
        assert!(out.iterations <= 20);
    }

    struct BoxOnlyQp {
        center: Col<E>,
        box_c: Bx,
        box_d: Bx,
    }

    impl Problem for BoxOnlyQp {
        fn n(&self) -> usize {
            2
        }
        fn m(&self) -> usize {
            0
        }
        fn box_c(&self) -> &Bx {
            &self.box_c
        }
        fn box_d(&self) -> &Bx {
            &self.box_d
        }
        fn eval_f(&self, x: ColRef<E>) -> Result<E, SolveError> {
            let mut diff = Col::<E>::zeros(2);
            zip!(diff.as_mut(), x, self.center.as_ref()).for_each(|unzip!(o, a, b)| *o = *a - *b);
            Ok(0.5 * vector_ops::dot(diff.as_ref(), diff.as_ref()))
        }
        fn eval_grad_f(&self, x: ColRef<E>, out: &mut Col<E>) -> Result<(), SolveError> {
            zip!(out.as_mut(), x, self.center.as_ref()).for_each(|unzip!(o, a, b)| *o = *a - *b);
            Ok(())
        }
        fn eval_g(&self, _x: ColRef<E>, _gx: &mut Col<E>) -> Result<(), SolveError> {
            Ok(())
        }
        fn eval_grad_g_prod(
            &self,
            _x: ColRef<E>,
            _y: ColRef<E>,
            out: &mut Col<E>,
        ) -> Result<(), SolveError> {
            zip!(out.as_mut()).for_each(|unzip!(o)| *o = 0.0);
            Ok(())
        }
    }

    #[test]
    fn box_only_qp_converges_to_corner() {
        let problem = BoxOnlyQp {
            center: Col::from_fn(2, |i| [2.0, -3.0][i]),
            box_c: Bx::new(Col::from_fn(2, |i| [0.0, -1.0][i]), Col::from_fn(2, |i| [1.0, 1.0][i])),
            box_d: Bx::unbounded(0),
        };
        let solver = Panoc::new(&problem, PanocParams::default()).unwrap();
        let x0 = Col::from_fn(2, |_| 0.0);
        let y = Col::<E>::zeros(0);
        let sigma = Col::<E>::zeros(0);

        let mut cb = NoOpPanocCallback;
        let mut term = NoOpTerminator;
        let out = solver
            .solve(y.as_ref(), sigma.as_ref(), x0.as_ref(), 1e-10, 0.0, &mut cb, &mut term)
            .unwrap();

        assert_eq!(out.status, PanocStatus::Converged);
        assert!((out.x[0] - 1.0).abs() < 1e-4);
        assert!((out.x[1] - (-1.0)).abs() < 1e-4);
    }

    /// f(x) = (x1^2 + x2 - 11)^2 + (x1 + x2^2 - 7)^2, boxed to a region
    /// containing the minimizer near (3, 1.8) but no other local minimum.
    struct HimmelblauBoxed {
        box_c: Bx,
        box_d: Bx,
    }

    impl Problem for HimmelblauBoxed {
        fn n(&self) -> usize {
            2
        }
        fn m(&self) -> usize {
            0
        }
        fn box_c(&self) -> &Bx {
            &self.box_c
        }
        fn box_d(&self) -> &Bx {
            &self.box_d
        }
        fn eval_f(&self, x: ColRef<E>) -> Result<E, SolveError> {
            let a = x[0] * x[0] + x[1] - 11.0;
            let b = x[0] + x[1] * x[1] - 7.0;
            Ok(a * a + b * b)
        }
        fn eval_grad_f(&self, x: ColRef<E>, out: &mut Col<E>) -> Result<(), SolveError> {
            let a = x[0] * x[0] + x[1] - 11.0;
            let b = x[0] + x[1] * x[1] - 7.0;
            out[0] = 4.0 * a * x[0] + 2.0 * b;
            out[1] = 2.0 * a + 4.0 * b * x[1];
            Ok(())
        }
        fn eval_g(&self, _x: ColRef<E>, _gx: &mut Col<E>) -> Result<(), SolveError> {
            Ok(())
        }
        fn eval_grad_g_prod(
            &self,
            _x: ColRef<E>,
            _y: ColRef<E>,
            out: &mut Col<E>,
        ) -> Result<(), SolveError> {
            zip!(out.as_mut()).for_each(|unzip!(o)| *o = 0.0);
            Ok(())
        }
    }

    #[test]
    fn himmelblau_boxed_converges_to_known_minimizer() {
        let problem = HimmelblauBoxed {
            box_c: Bx::new(Col::from_fn(2, |i| [-1.0, -1.0][i]), Col::from_fn(2, |i| [4.0, 1.8][i])),
            box_d: Bx::unbounded(0),
        };
        let solver = Panoc::new(&problem, PanocParams { max_iter: 500, ..PanocParams::default() })
            .unwrap();
        let x0 = Col::from_fn(2, |_| 0.0);
        let y = Col::<E>::zeros(0);
        let sigma = Col::<E>::zeros(0);

        let mut cb = NoOpPanocCallback;
        let mut term = NoOpTerminator;
        let out = solver
            .solve(y.as_ref(), sigma.as_ref(), x0.as_ref(), 1e-6, 0.0, &mut cb, &mut term)
            .unwrap();

        assert_eq!(out.status, PanocStatus::Converged);
        assert!((out.x[0] - 3.0).abs() < 1e-3);
        assert!((out.x[1] - 1.8).abs() < 1e-3);
        assert!((out.psi - 13.70).abs() < 1e-1);
        assert!(out.r_gamma_inf_norm <= 1e-6 + 1e-9);
    }
}
