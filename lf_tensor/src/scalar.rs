//! Numerically stable scalar kernels shared by backends and losses.

use crate::element::Element;

/// Logistic sigmoid. Only ever exponentiates a non-positive argument.
#[inline]
pub fn sigmoid<T: Element>(x: T) -> T {
    if x >= T::zero() {
        T::one() / (T::one() + (-x).exp())
    } else {
        let e = x.exp();
        e / (T::one() + e)
    }
}

/// softplus(x) = ln(1 + e^x), without overflow for large x.
#[inline]
pub fn softplus<T: Element>(x: T) -> T {
    x.max(T::zero()) + (-x.abs()).exp().ln_1p()
}

/// ln(cosh(x)) = |x| + ln(1 + e^(-2|x|)) - ln 2.
#[inline]
pub fn log_cosh<T: Element>(x: T) -> T {
    let a = x.abs();
    a + (T::constant(-2.0) * a).exp().ln_1p() - T::constant(std::f64::consts::LN_2)
}

/// Sign with `signum(0) == 0`, unlike `Float::signum`.
#[inline]
pub fn sign<T: Element>(x: T) -> T {
    if x > T::zero() {
        T::one()
    } else if x < T::zero() {
        -T::one()
    } else {
        T::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_extremes() {
        assert_eq!(sigmoid(0.0f64), 0.5);
        assert!(sigmoid(800.0f64).is_finite());
        assert!((sigmoid(800.0f64) - 1.0).abs() < 1e-12);
        assert!(sigmoid(-800.0f64) >= 0.0);
    }

    #[test]
    fn test_softplus_matches_naive() {
        for &x in &[-3.0f64, -0.5, 0.0, 0.5, 3.0] {
            let naive = (1.0 + x.exp()).ln();
            assert!((softplus(x) - naive).abs() < 1e-12);
        }
        assert!((softplus(1000.0f64) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_log_cosh_matches_naive() {
        for &x in &[-2.0f64, -0.1, 0.0, 0.8, 2.0] {
            assert!((log_cosh(x) - x.cosh().ln()).abs() < 1e-12);
        }
        assert!(log_cosh(1000.0f64).is_finite());
    }

    #[test]
    fn test_sign_zero() {
        assert_eq!(sign(0.0f64), 0.0);
        assert_eq!(sign(-0.0f64), 0.0);
        assert_eq!(sign(-2.0f32), -1.0);
    }
}
