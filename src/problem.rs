//! The problem capability record and its composite ψ/ŷ/∇ψ evaluations.

use faer::{Col, ColRef, unzip, zip};

use crate::E;
use crate::box_constraints::Box;
use crate::error::SolveError;
use crate::linalg::vector_ops;

/// What a [`Problem`] advertises it can do. Queried up front by the
/// solver instead of attempting a call and handling a not-implemented
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// `eval_f`, `eval_grad_f`, `eval_g`, `eval_grad_g_prod` only.
    Basic,
    /// Basic plus problem-supplied `eval_psi_yhat`/`eval_grad_psi`/
    /// `eval_psi_grad_psi` overrides.
    Composite,
    /// Basic (or composite) plus Hessian-of-Lagrangian products.
    SecondOrder,
}

/// A nonlinear program `minimize f(x) s.t. x ∈ C, g(x) ∈ D`.
///
/// Implementors are held by shared read-only reference by solvers;
/// evaluation methods must be reentrant if the same `Problem` is used
/// across threads (a capability the caller asserts by sharing it).
///
/// All outputs are written into caller-supplied buffers that are
/// distinct from the inputs; no method is allowed to alias its output
/// with an input.
pub trait Problem {
    /// Number of decision variables.
    fn n(&self) -> usize;

    /// Number of general constraints (`0` when there are none).
    fn m(&self) -> usize;

    /// The box `C` bounding the decision variables.
    fn box_c(&self) -> &Box;

    /// The box `D` bounding the general constraints `g(x)` (dimension
    /// `m`; unused when `m() == 0`).
    fn box_d(&self) -> &Box;

    fn capability(&self) -> Capability {
        Capability::Basic
    }

    /// `f(x)`.
    fn eval_f(&self, x: ColRef<E>) -> Result<E, SolveError>;

    /// Writes `∇f(x)` into `grad_fx` (length `n`).
    fn eval_grad_f(&self, x: ColRef<E>, grad_fx: &mut Col<E>) -> Result<(), SolveError>;

    /// Writes `g(x)` into `gx` (length `m`).
    fn eval_g(&self, x: ColRef<E>, gx: &mut Col<E>) -> Result<(), SolveError>;

    /// Writes `∇g(x)ᵀ y` into `out` (length `n`).
    fn eval_grad_g_prod(
        &self,
        x: ColRef<E>,
        y: ColRef<E>,
        out: &mut Col<E>,
    ) -> Result<(), SolveError>;

    /// Writes `∇g_i(x)` into `out` (length `n`), `0 <= i < m`.
    fn eval_grad_gi(&self, _x: ColRef<E>, _i: usize, _out: &mut Col<E>) -> Result<(), SolveError> {
        Err(crate::error::MissingCapability::new("eval_grad_gi").into())
    }

    /// `(∇²_x L(x, y)) v`, optional (second-order capability).
    fn eval_hess_l_prod(
        &self,
        _x: ColRef<E>,
        _y: ColRef<E>,
        _v: ColRef<E>,
        _out: &mut Col<E>,
    ) -> Result<(), SolveError> {
        Err(crate::error::MissingCapability::new("eval_hess_l_prod").into())
    }

    /// `ψ(x) = f(x) + ½ distₛ²(g(x) + Σ⁻¹y, D)`, also writing the
    /// by-product `ŷ = Σ · (g(x) + Σ⁻¹y − Π_D(g(x) + Σ⁻¹y))` into
    /// `yhat` (length `m`). Collapses to `f(x)` when `m == 0`.
    ///
    /// The default implementation composes `eval_f`/`eval_g`; override
    /// when a problem can compute this more directly.
    fn eval_psi_yhat(
        &self,
        x: ColRef<E>,
        y: ColRef<E>,
        sigma: ColRef<E>,
        yhat: &mut Col<E>,
    ) -> Result<E, SolveError> {
        let fx = self.eval_f(x)?;
        if self.m() == 0 {
            return Ok(fx);
        }
        self.eval_g(x, yhat)?;
        Ok(fx + psi_yhat_into(self.box_d(), y, sigma, yhat))
    }

    /// `∇ψ(x) = ∇f(x) + ∇g(x) ŷ`, written into `out` (length `n`).
    fn eval_grad_psi(
        &self,
        x: ColRef<E>,
        y: ColRef<E>,
        sigma: ColRef<E>,
        out: &mut Col<E>,
    ) -> Result<(), SolveError> {
        let mut yhat = Col::<E>::zeros(self.m());
        self.eval_g(x, &mut yhat)?;
        psi_yhat_into(self.box_d(), y, sigma, &mut yhat);
        self.eval_grad_f(x, out)?;
        grad_psi_into(self, x, yhat.as_ref(), out)
    }

    /// Fused `(ψ(x), ∇ψ(x))`; must be bit-identical to calling
    /// `eval_psi_yhat` then deriving `∇ψ` from the same `ŷ`. Problems
    /// that can share work between the two should override this.
    fn eval_psi_grad_psi(
        &self,
        x: ColRef<E>,
        y: ColRef<E>,
        sigma: ColRef<E>,
        grad_out: &mut Col<E>,
    ) -> Result<E, SolveError> {
        let mut yhat = Col::<E>::zeros(self.m());
        let fx = self.eval_f(x)?;
        let psi = if self.m() == 0 {
            fx
        } else {
            self.eval_g(x, &mut yhat)?;
            fx + psi_yhat_into(self.box_d(), y, sigma, &mut yhat)
        };
        self.eval_grad_f(x, grad_out)?;
        grad_psi_into(self, x, yhat.as_ref(), grad_out)?;
        Ok(psi)
    }
}

/// Steps 2-5 of `eval_psi_yhat`'s algorithm: given `gx` already written
/// into `yhat`, overwrites `yhat` in place with the `ŷ` by-product and
/// returns the `½ dᵀŷ` contribution to `ψ`. Shared by the default
/// `eval_psi_yhat`/`eval_psi_grad_psi` implementations and PANOC's
/// zero-allocation hot path (which owns `yhat` as a persistent
/// workspace buffer instead of allocating it per call).
pub(crate) fn psi_yhat_into(box_d: &Box, y: ColRef<E>, sigma: ColRef<E>, yhat: &mut Col<E>) -> E {
    // yhat currently holds g(x). ζ = g(x) + Σ⁻¹y, in place.
    zip!(yhat.as_mut(), y, sigma).for_each(|unzip!(gx_i, y_i, s_i)| {
        *gx_i += *y_i / *s_i;
    });
    let d = box_d.projecting_difference(yhat.as_ref());
    let mut half_weighted_sq = 0.;
    zip!(yhat.as_mut(), d.as_ref(), sigma).for_each(|unzip!(yhat_i, d_i, s_i)| {
        half_weighted_sq += *s_i * *d_i * *d_i;
        *yhat_i = *s_i * *d_i;
    });
    0.5 * half_weighted_sq
}

/// `out += ∇g(x)ᵀ ŷ`, i.e. finishes `∇ψ(x) = ∇f(x) + ∇g(x)ᵀŷ` given
/// `out` already holding `∇f(x)`.
pub(crate) fn grad_psi_into<P: Problem + ?Sized>(
    problem: &P,
    x: ColRef<E>,
    yhat: ColRef<E>,
    out: &mut Col<E>,
) -> Result<(), SolveError> {
    if problem.m() == 0 {
        return Ok(());
    }
    let mut grad_g_prod = Col::<E>::zeros(problem.n());
    problem.eval_grad_g_prod(x, yhat, &mut grad_g_prod)?;
    zip!(out.as_mut(), grad_g_prod.as_ref()).for_each(|unzip!(o, g)| *o += *g);
    Ok(())
}

/// Tiny helper so tests can assemble a reference `Col` without typing
/// out `Col::from_fn` everywhere.
#[cfg(test)]
pub(crate) fn col(data: &[E]) -> Col<E> {
    Col::from_fn(data.len(), |i| data[i])
}
