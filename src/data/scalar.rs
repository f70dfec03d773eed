//! Scalar types a parallel vector can hold.
//!
//! Real (`f64`) and complex (`Complex64`) entries share one code path. The
//! communicator only reduces `f64`, so every scalar knows how to flatten itself
//! into reals for a global sum.

use std::fmt::{Debug, Display};
use std::ops::{AddAssign, MulAssign};

use bytemuck::Pod;
use num_complex::Complex64;
use num_traits::Num;

/// Entry type of a parallel vector.
pub trait Scalar:
    Num + Copy + Pod + Debug + Display + AddAssign + MulAssign + Send + Sync + 'static
{
    /// Whether the scalar carries an imaginary part.
    const IS_COMPLEX: bool;
    /// Number of `f64` lanes used when reducing across processes.
    const REDUCE_LANES: usize;

    fn conj(self) -> Self;
    /// `|x|²`.
    fn abs_sqr(self) -> f64;

    /// Write the reduction lanes into `out[..REDUCE_LANES]`.
    fn to_lanes(self, out: &mut [f64]);
    /// Inverse of [`Scalar::to_lanes`].
    fn from_lanes(lanes: &[f64]) -> Self;
}

impl Scalar for f64 {
    const IS_COMPLEX: bool = false;
    const REDUCE_LANES: usize = 1;

    #[inline]
    fn conj(self) -> Self {
        self
    }
    #[inline]
    fn abs_sqr(self) -> f64 {
        self * self
    }
    #[inline]
    fn to_lanes(self, out: &mut [f64]) {
        out[0] = self;
    }
    #[inline]
    fn from_lanes(lanes: &[f64]) -> Self {
        lanes[0]
    }
}

impl Scalar for Complex64 {
    const IS_COMPLEX: bool = true;
    const REDUCE_LANES: usize = 2;

    #[inline]
    fn conj(self) -> Self {
        Complex64::conj(&self)
    }
    #[inline]
    fn abs_sqr(self) -> f64 {
        self.norm_sqr()
    }
    #[inline]
    fn to_lanes(self, out: &mut [f64]) {
        out[0] = self.re;
        out[1] = self.im;
    }
    #[inline]
    fn from_lanes(lanes: &[f64]) -> Self {
        Complex64::new(lanes[0], lanes[1])
    }
}

static_assertions::assert_eq_size!(Complex64, [f64; 2]);
