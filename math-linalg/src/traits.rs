//! Scalar and operator abstractions shared by every kernel in the crate
//!
//! - [`ComplexField`]: scalar types the multigrid engine can run on
//! - [`Preconditioner`]: approximate inverse `M⁻¹` used inside relaxation smoothers

use ndarray::Array1;
use num_complex::{Complex32, Complex64};
use num_traits::{Float, FromPrimitive, NumAssign, One, ToPrimitive, Zero};
use std::fmt::Debug;
use std::ops::Neg;

/// Scalar field the hierarchy is built over.
///
/// Real problems (Poisson, diffusion) use `f64`; indefinite or damped wave
/// problems use `Complex64`. All transfer, Galerkin and smoothing kernels are
/// written once against this trait.
pub trait ComplexField:
    NumAssign + Clone + Copy + Send + Sync + Debug + Zero + One + Neg<Output = Self> + 'static
{
    /// The real number type underlying this field
    type Real: Float + NumAssign + FromPrimitive + ToPrimitive + Send + Sync + Debug + 'static;

    /// Complex conjugate
    fn conj(&self) -> Self;

    /// Squared magnitude |z|²
    fn norm_sqr(&self) -> Self::Real;

    /// Magnitude |z|
    fn norm(&self) -> Self::Real {
        self.norm_sqr().sqrt()
    }

    /// Create from a real value
    fn from_real(r: Self::Real) -> Self;

    /// Create from an `f64` constant
    fn from_real_f64(v: f64) -> Self {
        Self::from_real(Self::Real::from_f64(v).unwrap_or_else(Self::Real::nan))
    }

    /// Real part
    fn re(&self) -> Self::Real;

    /// Check if this is approximately zero
    fn is_zero_approx(&self, tol: Self::Real) -> bool {
        self.norm_sqr() < tol * tol
    }

    /// Multiplicative inverse (1/z)
    fn inv(&self) -> Self;
}

macro_rules! impl_complex_field {
    ($ty:ty, $real:ty) => {
        impl ComplexField for $ty {
            type Real = $real;

            #[inline]
            fn conj(&self) -> Self {
                <$ty>::conj(self)
            }

            #[inline]
            fn norm_sqr(&self) -> $real {
                self.re * self.re + self.im * self.im
            }

            #[inline]
            fn from_real(r: $real) -> Self {
                <$ty>::new(r, 0.0)
            }

            #[inline]
            fn re(&self) -> $real {
                self.re
            }

            #[inline]
            fn inv(&self) -> Self {
                let denom = ComplexField::norm_sqr(self);
                <$ty>::new(self.re / denom, -self.im / denom)
            }
        }
    };
}

macro_rules! impl_real_field {
    ($ty:ty) => {
        impl ComplexField for $ty {
            type Real = $ty;

            #[inline]
            fn conj(&self) -> Self {
                *self
            }

            #[inline]
            fn norm_sqr(&self) -> $ty {
                *self * *self
            }

            #[inline]
            fn norm(&self) -> $ty {
                self.abs()
            }

            #[inline]
            fn from_real(r: $ty) -> Self {
                r
            }

            #[inline]
            fn re(&self) -> $ty {
                *self
            }

            #[inline]
            fn inv(&self) -> Self {
                1.0 / *self
            }
        }
    };
}

impl_complex_field!(Complex64, f64);
impl_complex_field!(Complex32, f32);
impl_real_field!(f64);
impl_real_field!(f32);

/// Approximate inverse `M ≈ A⁻¹` applied inside a relaxation step.
pub trait Preconditioner<T: ComplexField>: Send + Sync {
    /// Apply the preconditioner: y = M * r
    fn apply(&self, r: &Array1<T>) -> Array1<T>;
}

/// Identity preconditioner (plain Richardson relaxation)
#[derive(Clone, Debug, Default)]
pub struct IdentityPreconditioner;

impl<T: ComplexField> Preconditioner<T> for IdentityPreconditioner {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        r.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_complex64_field() {
        let z = Complex64::new(3.0, 4.0);
        assert_relative_eq!(ComplexField::norm_sqr(&z), 25.0);
        assert_relative_eq!(ComplexField::norm(&z), 5.0);

        let z_conj = ComplexField::conj(&z);
        assert_relative_eq!(z_conj.re, 3.0);
        assert_relative_eq!(z_conj.im, -4.0);

        let product = z * ComplexField::inv(&z);
        assert_relative_eq!(product.re, 1.0, epsilon = 1e-10);
        assert_relative_eq!(product.im, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_f64_field() {
        let x: f64 = -3.0;
        assert_relative_eq!(ComplexField::norm_sqr(&x), 9.0);
        assert_relative_eq!(ComplexField::norm(&x), 3.0);
        assert_relative_eq!(ComplexField::inv(&x), -1.0 / 3.0);
        assert_relative_eq!(<f64 as ComplexField>::from_real_f64(0.25), 0.25);
    }

    #[test]
    fn test_identity_preconditioner() {
        let precond = IdentityPreconditioner;
        let r = Array1::from_vec(vec![Complex64::new(1.0, 2.0), Complex64::new(3.0, 4.0)]);
        let y = precond.apply(&r);
        assert_eq!(r, y);
    }
}
