//! Axis-aligned boxes and Euclidean projection onto them.

use faer::{Col, ColRef, unzip, zip};

use crate::E;

/// An axis-aligned box `[lower, upper] ⊆ (ℝ∪{±∞})ᵈ`.
///
/// `lower` and `upper` may contain `±∞` to express one-sided or absent
/// bounds. The invariant `lower_i <= upper_i` is checked once at
/// construction and assumed to hold for the box's lifetime.
#[derive(Debug, Clone)]
pub struct Box {
    lower: Col<E>,
    upper: Col<E>,
}

impl Box {
    /// Builds a box from componentwise lower/upper bounds.
    ///
    /// Panics if the two vectors differ in length or if `lower_i > upper_i`
    /// for some finite pair (NaN bounds are rejected the same way).
    pub fn new(lower: Col<E>, upper: Col<E>) -> Self {
        assert_eq!(lower.nrows(), upper.nrows(), "lower/upper length mismatch");
        zip!(lower.as_ref(), upper.as_ref()).for_each(|unzip!(lo, up)| {
            assert!(lo <= up, "box lower bound exceeds upper bound");
        });
        Self { lower, upper }
    }

    /// An unbounded box of dimension `n`: `[-∞, +∞]ⁿ`.
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: Col::from_fn(n, |_| E::NEG_INFINITY),
            upper: Col::from_fn(n, |_| E::INFINITY),
        }
    }

    pub fn dim(&self) -> usize {
        self.lower.nrows()
    }

    pub fn lower(&self) -> ColRef<E> {
        self.lower.as_ref()
    }

    pub fn upper(&self) -> ColRef<E> {
        self.upper.as_ref()
    }

    /// `w_i = min(max(v_i, lower_i), upper_i)`, written into `out`.
    ///
    /// NaN components of `v` propagate to `out` (a NaN is neither `<` nor
    /// `>` any bound, so it passes through the clamp unchanged).
    pub fn project_into(&self, v: ColRef<E>, out: &mut Col<E>) {
        assert_eq!(v.nrows(), self.dim());
        zip!(v, self.lower.as_ref(), self.upper.as_ref(), out.as_mut()).for_each(
            |unzip!(v_i, lo, up, out_i)| {
                *out_i = clamp(*v_i, *lo, *up);
            },
        );
    }

    /// `project(v, B)`, allocating the result.
    pub fn project(&self, v: ColRef<E>) -> Col<E> {
        let mut out = Col::<E>::zeros(self.dim());
        self.project_into(v, &mut out);
        out
    }

    /// `v − project(v, B)`, written into `out`.
    pub fn projecting_difference_into(&self, v: ColRef<E>, out: &mut Col<E>) {
        assert_eq!(v.nrows(), self.dim());
        zip!(v, self.lower.as_ref(), self.upper.as_ref(), out.as_mut()).for_each(
            |unzip!(v_i, lo, up, out_i)| {
                *out_i = *v_i - clamp(*v_i, *lo, *up);
            },
        );
    }

    /// `projecting_difference(v, B)`, allocating the result.
    pub fn projecting_difference(&self, v: ColRef<E>) -> Col<E> {
        let mut out = Col::<E>::zeros(self.dim());
        self.projecting_difference_into(v, &mut out);
        out
    }
}

/// NaN-preserving clamp: `f64::max`/`f64::min` silently discard a NaN
/// operand, which would turn a NaN input into a finite output. Compare
/// explicitly so NaN passes straight through.
#[inline]
pub(crate) fn clamp(v: E, lower: E, upper: E) -> E {
    if v.is_nan() {
        return v;
    }
    if v < lower {
        lower
    } else if v > upper {
        upper
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(data: &[E]) -> Col<E> {
        Col::from_fn(data.len(), |i| data[i])
    }

    #[test]
    fn projection_lands_in_box_and_is_idempotent() {
        let b = Box::new(col(&[0.0, -1.0]), col(&[1.0, 1.0]));
        let v = col(&[2.0, -5.0]);
        let once = b.project(v.as_ref());
        let twice = b.project(once.as_ref());
        assert_eq!((once[0], once[1]), (1.0, -1.0));
        assert_eq!((once[0], once[1]), (twice[0], twice[1]));
    }

    #[test]
    fn unbounded_box_is_identity() {
        let b = Box::unbounded(3);
        let v = col(&[1.5, -7.0, 1e300]);
        let out = b.project(v.as_ref());
        assert_eq!((out[0], out[1], out[2]), (v[0], v[1], v[2]));
    }

    #[test]
    fn nan_propagates_through_projection() {
        let b = Box::new(col(&[0.0]), col(&[1.0]));
        let v = col(&[E::NAN]);
        let out = b.project(v.as_ref());
        assert!(out[0].is_nan());
    }

    #[test]
    fn projecting_difference_is_zero_inside_box() {
        let b = Box::new(col(&[0.0]), col(&[1.0]));
        let out = b.projecting_difference(col(&[0.5]).as_ref());
        assert_eq!(out[0], 0.0);
        let out = b.projecting_difference(col(&[2.0]).as_ref());
        assert_eq!(out[0], 1.0);
    }
}
