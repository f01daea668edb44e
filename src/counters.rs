//! Evaluation-counting decorator around a [`Problem`].
//!
//! Per the design note, the "with-counters" wrapper is a decorator that
//! atomically increments counters rather than a hidden global; the
//! counts end up in the [`crate::result::SolverResult`], not squirreled
//! away in solver-private state.

use std::sync::atomic::{AtomicU64, Ordering};

use faer::{Col, ColRef};

use crate::E;
use crate::box_constraints::Box;
use crate::error::SolveError;
use crate::problem::{Capability, Problem};

/// Evaluation counts accumulated by a [`CountedProblem`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalCounts {
    pub f: u64,
    pub grad_f: u64,
    pub g: u64,
    pub grad_g_prod: u64,
    pub psi_yhat: u64,
    pub grad_psi: u64,
    pub psi_grad_psi: u64,
}

#[derive(Debug, Default)]
struct AtomicEvalCounts {
    f: AtomicU64,
    grad_f: AtomicU64,
    g: AtomicU64,
    grad_g_prod: AtomicU64,
    psi_yhat: AtomicU64,
    grad_psi: AtomicU64,
    psi_grad_psi: AtomicU64,
}

impl AtomicEvalCounts {
    fn snapshot(&self) -> EvalCounts {
        EvalCounts {
            f: self.f.load(Ordering::Relaxed),
            grad_f: self.grad_f.load(Ordering::Relaxed),
            g: self.g.load(Ordering::Relaxed),
            grad_g_prod: self.grad_g_prod.load(Ordering::Relaxed),
            psi_yhat: self.psi_yhat.load(Ordering::Relaxed),
            grad_psi: self.grad_psi.load(Ordering::Relaxed),
            psi_grad_psi: self.psi_grad_psi.load(Ordering::Relaxed),
        }
    }
}

/// Wraps a `Problem` and counts every evaluation performed through it.
pub struct CountedProblem<'a, P: Problem + ?Sized> {
    inner: &'a P,
    counts: AtomicEvalCounts,
}

impl<'a, P: Problem + ?Sized> CountedProblem<'a, P> {
    pub fn new(inner: &'a P) -> Self {
        Self {
            inner,
            counts: AtomicEvalCounts::default(),
        }
    }

    pub fn counts(&self) -> EvalCounts {
        self.counts.snapshot()
    }
}

impl<'a, P: Problem + ?Sized> Problem for CountedProblem<'a, P> {
    fn n(&self) -> usize {
        self.inner.n()
    }

    fn m(&self) -> usize {
        self.inner.m()
    }

    fn box_c(&self) -> &Box {
        self.inner.box_c()
    }

    fn box_d(&self) -> &Box {
        self.inner.box_d()
    }

    fn capability(&self) -> Capability {
        self.inner.capability()
    }

    fn eval_f(&self, x: ColRef<E>) -> Result<E, SolveError> {
        self.counts.f.fetch_add(1, Ordering::Relaxed);
        self.inner.eval_f(x)
    }

    fn eval_grad_f(&self, x: ColRef<E>, grad_fx: &mut Col<E>) -> Result<(), SolveError> {
        self.counts.grad_f.fetch_add(1, Ordering::Relaxed);
        self.inner.eval_grad_f(x, grad_fx)
    }

    fn eval_g(&self, x: ColRef<E>, gx: &mut Col<E>) -> Result<(), SolveError> {
        self.counts.g.fetch_add(1, Ordering::Relaxed);
        self.inner.eval_g(x, gx)
    }

    fn eval_grad_g_prod(
        &self,
        x: ColRef<E>,
        y: ColRef<E>,
        out: &mut Col<E>,
    ) -> Result<(), SolveError> {
        self.counts.grad_g_prod.fetch_add(1, Ordering::Relaxed);
        self.inner.eval_grad_g_prod(x, y, out)
    }

    fn eval_grad_gi(&self, x: ColRef<E>, i: usize, out: &mut Col<E>) -> Result<(), SolveError> {
        self.inner.eval_grad_gi(x, i, out)
    }

    fn eval_hess_l_prod(
        &self,
        x: ColRef<E>,
        y: ColRef<E>,
        v: ColRef<E>,
        out: &mut Col<E>,
    ) -> Result<(), SolveError> {
        self.inner.eval_hess_l_prod(x, y, v, out)
    }

    fn eval_psi_yhat(
        &self,
        x: ColRef<E>,
        y: ColRef<E>,
        sigma: ColRef<E>,
        yhat: &mut Col<E>,
    ) -> Result<E, SolveError> {
        self.counts.psi_yhat.fetch_add(1, Ordering::Relaxed);
        self.inner.eval_psi_yhat(x, y, sigma, yhat)
    }

    fn eval_grad_psi(
        &self,
        x: ColRef<E>,
        y: ColRef<E>,
        sigma: ColRef<E>,
        out: &mut Col<E>,
    ) -> Result<(), SolveError> {
        self.counts.grad_psi.fetch_add(1, Ordering::Relaxed);
        self.inner.eval_grad_psi(x, y, sigma, out)
    }

    fn eval_psi_grad_psi(
        &self,
        x: ColRef<E>,
        y: ColRef<E>,
        sigma: ColRef<E>,
        grad_out: &mut Col<E>,
    ) -> Result<E, SolveError> {
        self.counts.psi_grad_psi.fetch_add(1, Ordering::Relaxed);
        self.inner.eval_psi_grad_psi(x, y, sigma, grad_out)
    }
}
