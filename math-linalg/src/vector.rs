//! Vector kernels used by smoothers and the cycle engine

use crate::traits::ComplexField;
use ndarray::Array1;
use num_traits::{Float, ToPrimitive, Zero};

/// Compute vector 2-norm: ||x||_2 = sqrt(Σ |x_i|^2)
#[inline]
pub fn vector_norm<T: ComplexField>(x: &Array1<T>) -> T::Real {
    vector_norm_sqr(x).sqrt()
}

/// Compute vector norm squared: ||x||_2^2 = Σ |x_i|^2
#[inline]
pub fn vector_norm_sqr<T: ComplexField>(x: &Array1<T>) -> T::Real {
    let mut sum = T::Real::zero();
    for xi in x.iter() {
        sum += xi.norm_sqr();
    }
    sum
}

/// 2-norm as `f64`, NaN when the value does not fit
#[inline]
pub fn vector_norm_f64<T: ComplexField>(x: &Array1<T>) -> f64 {
    vector_norm(x).to_f64().unwrap_or(f64::NAN)
}

/// Compute axpy: y = α * x + y
#[inline]
pub fn axpy<T: ComplexField>(alpha: T, x: &Array1<T>, y: &mut Array1<T>) {
    y.zip_mut_with(x, |yi, &xi| *yi += alpha * xi);
}

/// Element-wise product in place: y = y ∘ w
#[inline]
pub fn pointwise_mult<T: ComplexField>(y: &mut Array1<T>, w: &Array1<T>) {
    assert_eq!(y.len(), w.len(), "Vector lengths must match for pointwise product");
    y.zip_mut_with(w, |yi, &wi| *yi *= wi);
}

/// Scale vector in place: x = α * x
#[inline]
pub fn scale_inplace<T: ComplexField>(alpha: T, x: &mut Array1<T>) {
    x.mapv_inplace(|v| alpha * v);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_norms() {
        let x = array![3.0_f64, 4.0];
        assert_relative_eq!(vector_norm(&x), 5.0);
        assert_relative_eq!(vector_norm_sqr(&x), 25.0);
        assert_relative_eq!(vector_norm_f64(&x), 5.0);
    }

    #[test]
    fn test_axpy_and_pointwise() {
        let mut y = array![1.0_f64, 2.0];
        axpy(2.0, &array![1.0, 1.0], &mut y);
        assert_relative_eq!(y[1], 4.0);
        pointwise_mult(&mut y, &array![0.5, 0.25]);
        assert_relative_eq!(y[0], 1.5);
        assert_relative_eq!(y[1], 1.0);
        scale_inplace(-1.0, &mut y);
        assert_relative_eq!(y[0], -1.5);
    }
}
