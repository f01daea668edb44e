//! Limited-memory BFGS accelerator: a bounded FIFO history of curvature
//! pairs plus the two-loop recursion that turns a gradient into a
//! quasi-Newton direction.

use std::collections::VecDeque;

use faer::{Col, ColRef};

use crate::E;
use crate::linalg::vector_ops;

/// Curvature threshold below which a new `(s, y)` pair is rejected
/// instead of inserted (keeps the implicit Hessian approximation
/// positive definite).
pub const DEFAULT_CURVATURE_EPS: E = 1e-10;

struct Pair {
    s: Col<E>,
    y: Col<E>,
    rho: E,
}

/// A bounded history of `(s, y)` curvature pairs with the Nocedal
/// two-loop recursion for applying the implicit inverse-Hessian
/// approximation.
pub struct LbfgsBuffer {
    memory: usize,
    curvature_eps: E,
    history: VecDeque<Pair>,
}

impl LbfgsBuffer {
    /// `memory` is the maximum number of stored pairs (`M` in the
    /// parameter contract); must be at least 1.
    pub fn new(memory: usize, curvature_eps: E) -> Self {
        assert!(memory >= 1, "lbfgs memory must be at least 1");
        Self {
            memory,
            curvature_eps,
            history: VecDeque::with_capacity(memory),
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Clears the history. Called when the solver falls back to a pure
    /// proximal-gradient step `K` times in a row.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Attempts to insert the pair `(s, y)`, evicting the oldest entry
    /// if the history is full. Returns `true` if inserted, `false` if
    /// the curvature test `yᵀs > ε‖s‖‖y‖` failed and the pair was
    /// silently rejected.
    pub fn update(&mut self, s: ColRef<E>, y: ColRef<E>) -> bool {
        let sy = vector_ops::dot(s, y);
        let threshold = self.curvature_eps * vector_ops::norm_l2(s) * vector_ops::norm_l2(y);
        if sy <= threshold {
            return false;
        }
        if self.history.len() == self.memory {
            self.history.pop_front();
        }
        self.history.push_back(Pair {
            s: vector_ops::to_owned(s),
            y: vector_ops::to_owned(y),
            rho: 1.0 / sy,
        });
        true
    }

    /// `out ← H · grad` via the two-loop recursion over the stored
    /// pairs in LIFO order. With empty history, `out ← grad` (the
    /// initial-Hessian scaling γ̂ defaults to 1 in that case).
    pub fn apply(&self, grad: ColRef<E>, out: &mut Col<E>) {
        if self.history.is_empty() {
            zip_copy(grad, out);
            return;
        }

        zip_copy(grad, out);
        let n = self.history.len();
        let mut alpha = vec![0.0; n];

        for (idx, pair) in self.history.iter().enumerate().rev() {
            let a = pair.rho * vector_ops::dot(pair.s.as_ref(), out.as_ref());
            alpha[idx] = a;
            axpy(-a, pair.y.as_ref(), out);
        }

        let last = self.history.back().unwrap();
        let syy = vector_ops::dot(last.y.as_ref(), last.y.as_ref());
        let gamma = if syy > 0.0 {
            1.0 / (last.rho * syy)
        } else {
            1.0
        };
        scale(gamma, out);

        for (idx, pair) in self.history.iter().enumerate() {
            let beta = pair.rho * vector_ops::dot(pair.y.as_ref(), out.as_ref());
            axpy(alpha[idx] - beta, pair.s.as_ref(), out);
        }
    }
}

fn zip_copy(src: ColRef<E>, dst: &mut Col<E>) {
    faer::zip!(dst.as_mut(), src).for_each(|faer::unzip!(d, s)| *d = *s);
}

fn axpy(alpha: E, x: ColRef<E>, y: &mut Col<E>) {
    faer::zip!(y.as_mut(), x).for_each(|faer::unzip!(y_i, x_i)| *y_i += alpha * *x_i);
}

fn scale(alpha: E, x: &mut Col<E>) {
    faer::zip!(x.as_mut()).for_each(|faer::unzip!(x_i)| *x_i *= alpha);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(data: &[E]) -> Col<E> {
        Col::from_fn(data.len(), |i| data[i])
    }

    #[test]
    fn reset_then_apply_is_identity() {
        let mut lbfgs = LbfgsBuffer::new(5, DEFAULT_CURVATURE_EPS);
        lbfgs.update(col(&[1.0, 0.0]).as_ref(), col(&[1.0, 1.0]).as_ref());
        lbfgs.reset();

        let grad = col(&[3.0, -4.0]);
        let mut out = Col::<E>::zeros(2);
        lbfgs.apply(grad.as_ref(), &mut out);
        assert_eq!((out[0], out[1]), (grad[0], grad[1]));
    }

    #[test]
    fn curvature_rejection_is_silent() {
        let mut lbfgs = LbfgsBuffer::new(5, DEFAULT_CURVATURE_EPS);
        // yTs = 0, should be rejected.
        let inserted = lbfgs.update(col(&[1.0, 0.0]).as_ref(), col(&[0.0, 1.0]).as_ref());
        assert!(!inserted);
        assert_eq!(lbfgs.len(), 0);
    }

    #[test]
    fn eviction_respects_memory_bound() {
        let mut lbfgs = LbfgsBuffer::new(2, DEFAULT_CURVATURE_EPS);
        for i in 0..5 {
            let s = col(&[1.0 + i as E, 0.0]);
            let y = col(&[1.0, 1.0]);
            lbfgs.update(s.as_ref(), y.as_ref());
        }
        assert_eq!(lbfgs.len(), 2);
    }

    #[test]
    fn two_loop_matches_reference_on_single_pair() {
        // With a single pair (s, y), applying H to y must return s
        // exactly (property 4 of the stopping-criterion tests).
        let mut lbfgs = LbfgsBuffer::new(5, DEFAULT_CURVATURE_EPS);
        let s = col(&[2.0, -1.0]);
        let y = col(&[1.0, 3.0]);
        assert!(lbfgs.update(s.as_ref(), y.as_ref()));

        let mut out = Col::<E>::zeros(2);
        lbfgs.apply(y.as_ref(), &mut out);

        let lhs = vector_ops::dot(y.as_ref(), out.as_ref());
        let rhs = vector_ops::dot(y.as_ref(), s.as_ref());
        assert!((lhs - rhs).abs() / rhs.abs() < 1e-10);
    }
}
