use faer::{Col, ColRef, unzip, zip};

use crate::E;

pub(crate) fn col_min(x: ColRef<E>) -> E {
    let mut minimum = E::INFINITY;

    zip!(x).for_each(|unzip!(x)| minimum = E::min(minimum, *x));

    minimum
}

pub(crate) fn is_col_positive(x: ColRef<E>) -> bool {
    let mut res = true;
    zip!(x).for_each(|unzip!(x)| {
        if *x <= 0. {
            res = false
        }
    });
    res
}

/// Copies a borrowed column into a freshly owned one.
pub(crate) fn to_owned(x: ColRef<E>) -> Col<E> {
    let mut out = Col::<E>::zeros(x.nrows());
    zip!(x, out.as_mut()).for_each(|unzip!(x, out)| *out = *x);
    out
}

/// Euclidean inner product `aᵀb`.
pub(crate) fn dot(a: ColRef<E>, b: ColRef<E>) -> E {
    let mut acc = 0.;
    zip!(a, b).for_each(|unzip!(a, b)| acc += *a * *b);
    acc
}

/// `‖a‖∞`.
pub(crate) fn norm_inf(a: ColRef<E>) -> E {
    let mut m = 0.;
    zip!(a).for_each(|unzip!(a)| {
        let v = a.abs();
        if v > m {
            m = v;
        }
    });
    m
}

/// `‖a‖₂`.
pub(crate) fn norm_l2(a: ColRef<E>) -> E {
    dot(a, a).sqrt()
}

/// `true` iff every component of `a` is finite.
pub(crate) fn is_finite(a: ColRef<E>) -> bool {
    let mut ok = true;
    zip!(a).for_each(|unzip!(a)| {
        if !a.is_finite() {
            ok = false;
        }
    });
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_col_min() {
        let x1 = Col::from_fn(3, |i| [1.0, 2.0, 3.0][i]);
        let x2 = Col::from_fn(3, |i| [1.0, -2.0, 3.0][i]);
        assert!(is_col_positive(x1.as_ref()));
        assert!(!is_col_positive(x2.as_ref()));
        assert_eq!(col_min(x2.as_ref()), -2.0);
    }

    #[test]
    fn test_dot_and_norms() {
        let a = Col::from_fn(3, |i| [1.0, 2.0, -3.0][i]);
        let b = Col::from_fn(3, |i| [4.0, -5.0, 6.0][i]);
        assert_eq!(dot(a.as_ref(), b.as_ref()), 4.0 - 10.0 - 18.0);
        assert!((norm_l2(a.as_ref()) - (1.0f64 + 4.0 + 9.0).sqrt()).abs() < 1e-12);
        assert_eq!(norm_inf(a.as_ref()), 3.0);
    }

    #[test]
    fn test_is_finite() {
        let ok = Col::from_fn(2, |i| [1.0, 2.0][i]);
        let bad = Col::from_fn(2, |i| [1.0, f64::NAN][i]);
        assert!(is_finite(ok.as_ref()));
        assert!(!is_finite(bad.as_ref()));
    }
}
