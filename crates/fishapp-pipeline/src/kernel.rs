//! Convolution kernels and the separable convolution used by the filters.
//!
//! Blur and gradients need exact control over kernel size and border
//! handling: the caller picks an odd kernel width rather than a sigma, and
//! borders are reflected without repeating the edge pixel (`dcb|abcd|cba`).
//! `imageproc`'s filters only pad by repeating the edge, so those two
//! passes run through [`FloatPlane::convolve_separable`] instead.

use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Widest kernel a caller may request.
pub const MAX_KERNEL_SIZE: i32 = 255;

/// A validated, odd, positive square kernel width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct KernelSize(usize);

impl KernelSize {
    /// Validate a caller-supplied kernel width.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if `k` is even, not
    /// positive, or above [`MAX_KERNEL_SIZE`].
    pub fn new(k: i32) -> Result<Self, PipelineError> {
        if k <= 0 || k % 2 == 0 {
            return Err(PipelineError::InvalidArgument(format!(
                "kernel size must be a positive odd integer, got {k}"
            )));
        }
        if k > MAX_KERNEL_SIZE {
            return Err(PipelineError::InvalidArgument(format!(
                "kernel size {k} exceeds the maximum of {MAX_KERNEL_SIZE}"
            )));
        }
        Ok(Self(k.unsigned_abs() as usize))
    }

    /// A kernel size fixed at compile time.
    ///
    /// Intended for `const` items, where an even or zero width fails the
    /// build instead of reaching runtime.
    #[must_use]
    pub const fn fixed(k: usize) -> Self {
        assert!(k % 2 == 1, "kernel size must be odd");
        Self(k)
    }

    /// The kernel width in pixels.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Half-width: the number of taps on each side of the centre.
    #[must_use]
    pub const fn radius(self) -> usize {
        self.0 / 2
    }
}

impl TryFrom<i32> for KernelSize {
    type Error = PipelineError;

    fn try_from(k: i32) -> Result<Self, Self::Error> {
        Self::new(k)
    }
}

impl From<KernelSize> for i32 {
    fn from(size: KernelSize) -> Self {
        // Constructed from an i32, so it fits.
        Self::try_from(size.0).unwrap_or(Self::MAX)
    }
}

/// How samples outside the image are synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Border {
    /// Mirror without repeating the edge pixel: `dcb|abcd|cba`.
    Reflect101,
}

impl Border {
    /// Map a possibly out-of-range index into `0..len`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn index(self, i: isize, len: usize) -> usize {
        let n = len as isize;
        if (0..n).contains(&i) {
            return i as usize;
        }
        if n <= 1 {
            return 0;
        }
        match self {
            Self::Reflect101 => {
                // Reflect-101 is periodic with period 2(n - 1).
                let period = 2 * (n - 1);
                let folded = i.rem_euclid(period);
                (if folded >= n { period - folded } else { folded }) as usize
            }
        }
    }
}

/// Normalized 1-D Gaussian weights for an odd kernel width.
///
/// Widths up to 7 use the fixed binomial tables; wider kernels sample a
/// Gaussian with `sigma = 0.3 * ((k - 1) * 0.5 - 1) + 0.8`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn gaussian_kernel(size: KernelSize) -> Vec<f64> {
    match size.get() {
        1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => vec![
            0.031_25, 0.109_375, 0.218_75, 0.281_25, 0.218_75, 0.109_375, 0.031_25,
        ],
        k => {
            let sigma = 0.3_f64.mul_add((k as f64 - 1.0).mul_add(0.5, -1.0), 0.8);
            let centre = size.radius() as f64;
            let raw: Vec<f64> = (0..k)
                .map(|i| {
                    let d = i as f64 - centre;
                    (-(d * d) / (2.0 * sigma * sigma)).exp()
                })
                .collect();
            let sum: f64 = raw.iter().sum();
            raw.into_iter().map(|w| w / sum).collect()
        }
    }
}

/// A single floating-point plane with the dimensions it was sampled at.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatPlane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f64>,
}

impl FloatPlane {
    /// Widen an 8-bit gray image.
    #[must_use]
    pub fn from_gray(img: &image::GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw().iter().map(|&v| f64::from(v)).collect(),
        }
    }

    /// Sample at `(x, y)`, resolving out-of-range coordinates with `border`.
    #[must_use]
    pub fn sample(&self, x: isize, y: isize, border: Border) -> f64 {
        let x = border.index(x, self.width);
        let y = border.index(y, self.height);
        self.data[y * self.width + x]
    }

    /// Convolve rows with `kx`, then columns with `ky`.
    ///
    /// Both kernels must have odd length; the centre tap is aligned with
    /// the output pixel.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn convolve_separable(&self, kx: &[f64], ky: &[f64], border: Border) -> Self {
        let rx = (kx.len() / 2) as isize;
        let ry = (ky.len() / 2) as isize;

        let mut horizontal = Vec::with_capacity(self.data.len());
        for y in 0..self.height as isize {
            for x in 0..self.width as isize {
                let acc: f64 = kx
                    .iter()
                    .zip(-rx..=rx)
                    .map(|(w, dx)| w * self.sample(x + dx, y, border))
                    .sum();
                horizontal.push(acc);
            }
        }
        let horizontal = Self {
            width: self.width,
            height: self.height,
            data: horizontal,
        };

        let mut out = Vec::with_capacity(self.data.len());
        for y in 0..self.height as isize {
            for x in 0..self.width as isize {
                let acc: f64 = ky
                    .iter()
                    .zip(-ry..=ry)
                    .map(|(w, dy)| w * horizontal.sample(x, y + dy, border))
                    .sum();
                out.push(acc);
            }
        }
        Self {
            width: self.width,
            height: self.height,
            data: out,
        }
    }

    /// Round and saturate back to an 8-bit gray image.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_gray(&self) -> image::GrayImage {
        let pixels = self.data.iter().map(|&v| saturate_u8(v)).collect();
        let (width, height) = (self.width as u32, self.height as u32);
        image::GrayImage::from_raw(width, height, pixels)
            .unwrap_or_else(|| image::GrayImage::new(width, height))
    }
}

/// Round to nearest and clamp into `0..=255`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn saturate_u8(v: f64) -> u8 {
    // Clamped into range first, so the cast cannot truncate.
    v.round().clamp(0.0, 255.0) as u8
}
