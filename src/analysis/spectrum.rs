//! Real-input spectral transform
//!
//! A frame of `n` real samples yields `n / 2 + 1` complex bins from the real
//! FFT. Bin 0 (DC) and bin `n / 2` (Nyquist) are purely real, so the Nyquist
//! value is packed into the imaginary part of bin 0 and exactly `n / 2` bins
//! are kept. Every magnitude is derived from the stored bin, so
//! `magnitude[0]` combines DC and Nyquist.
//!
//! Values are raw DFT sums, not divided by `n`: a full-scale cosine landing
//! on bin `k` has modulus `n / 2` there.

use std::f32::consts::PI;
use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

pub use realfft::num_complex::Complex32;

use super::AnalysisError;

/// How a complex bin is reduced to a non-negative magnitude
///
/// The smoothers see these values directly, so the choice changes their
/// effective dynamic range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnitudeScale {
    /// `|z|`
    #[default]
    Modulus,
    /// `|z|²`
    Power,
    /// `sqrt(|z|)`, compresses loud bins
    Root,
}

impl MagnitudeScale {
    #[inline]
    pub fn apply(self, bin: Complex32) -> f32 {
        match self {
            Self::Modulus => bin.norm(),
            Self::Power => bin.norm_sqr(),
            Self::Root => bin.norm().sqrt(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Modulus => "Modulus",
            Self::Power => "Power",
            Self::Root => "Root",
        }
    }
}

/// Analysis window applied to a copy of the frame before the transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    #[default]
    Rectangular,
    Hann,
}

impl Window {
    /// Per-sample coefficients, `None` when the window is a no-op
    pub fn coefficients(self, len: usize) -> Option<Vec<f32>> {
        match self {
            Self::Rectangular => None,
            Self::Hann if len < 2 => Some(vec![1.0; len]),
            Self::Hann => Some(
                (0..len)
                    .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (len - 1) as f32).cos()))
                    .collect(),
            ),
        }
    }
}

/// Planned real FFT plus the scratch space it needs
///
/// All buffers are allocated up front; [`SpectralTransform::transform`]
/// does not allocate.
pub struct SpectralTransform {
    fft: Arc<dyn RealToComplex<f32>>,
    scale: MagnitudeScale,
    window: Option<Vec<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectralTransform {
    /// Plan a transform for frames of `frame_len` samples
    ///
    /// # Panics
    ///
    /// Panics if `frame_len` is odd or less than 2. [`crate::settings::AnalyzerSettings::validate`]
    /// rejects such lengths before an analyzer is built.
    pub fn new(frame_len: usize, scale: MagnitudeScale, window: Window) -> Self {
        assert!(
            frame_len >= 2 && frame_len % 2 == 0,
            "frame length must be even and at least 2, got {frame_len}"
        );

        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(frame_len);
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        Self {
            fft,
            scale,
            window: window.coefficients(frame_len),
            input: vec![0.0; frame_len],
            spectrum,
            scratch,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.input.len()
    }

    pub fn bin_count(&self) -> usize {
        self.input.len() / 2
    }

    pub fn scale(&self) -> MagnitudeScale {
        self.scale
    }

    /// Transform `frame` into packed `bins` and their `magnitudes`
    pub fn transform(
        &mut self,
        frame: &[f32],
        bins: &mut [Complex32],
        magnitudes: &mut [f32],
    ) -> Result<(), AnalysisError> {
        let n = self.frame_len();
        let half = n / 2;
        check_len(n, frame.len())?;
        check_len(half, bins.len())?;
        check_len(half, magnitudes.len())?;

        match &self.window {
            Some(window) => {
                for ((dst, &sample), &w) in self.input.iter_mut().zip(frame).zip(window) {
                    *dst = sample * w;
                }
            }
            None => self.input.copy_from_slice(frame),
        }

        // The input buffer is used as scratch by the FFT and gets overwritten
        self.fft
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .map_err(|_| AnalysisError::DimensionMismatch {
                expected: n,
                actual: frame.len(),
            })?;

        bins.copy_from_slice(&self.spectrum[..half]);
        bins[0].im = self.spectrum[half].re;

        for (mag, bin) in magnitudes.iter_mut().zip(bins.iter()) {
            *mag = self.scale.apply(*bin);
        }

        Ok(())
    }

    /// Allocating convenience wrapper around [`SpectralTransform::transform`]
    pub fn spectrum(&mut self, frame: &[f32]) -> Result<(Vec<Complex32>, Vec<f32>), AnalysisError> {
        let half = self.bin_count();
        let mut bins = vec![Complex32::new(0.0, 0.0); half];
        let mut magnitudes = vec![0.0; half];
        self.transform(frame, &mut bins, &mut magnitudes)?;
        Ok((bins, magnitudes))
    }
}

fn check_len(expected: usize, actual: usize) -> Result<(), AnalysisError> {
    if expected == actual {
        Ok(())
    } else {
        Err(AnalysisError::DimensionMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    fn cosine(len: usize, bin: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * bin as f32 * i as f32 / len as f32).cos())
            .collect()
    }

    #[test]
    fn test_bin_count_is_half_frame() {
        for len in [2, 8, 64, 512, 1000] {
            let mut t = SpectralTransform::new(len, MagnitudeScale::Modulus, Window::Rectangular);
            let (bins, mags) = t.spectrum(&vec![0.1; len]).unwrap();
            assert_eq!(bins.len(), len / 2);
            assert_eq!(mags.len(), len / 2);
        }
    }

    #[test]
    fn test_deterministic_output() {
        let frame: Vec<f32> = (0..512).map(|i| ((i * 37 % 101) as f32 / 50.0) - 1.0).collect();
        let mut a = SpectralTransform::new(512, MagnitudeScale::Modulus, Window::Hann);
        let mut b = SpectralTransform::new(512, MagnitudeScale::Modulus, Window::Hann);

        let (bins_a, mags_a) = a.spectrum(&frame).unwrap();
        let (bins_b, mags_b) = b.spectrum(&frame).unwrap();
        let (bins_c, _) = a.spectrum(&frame).unwrap();

        let bits = |bins: &[Complex32]| -> Vec<(u32, u32)> {
            bins.iter().map(|c| (c.re.to_bits(), c.im.to_bits())).collect()
        };
        assert_eq!(bits(&bins_a), bits(&bins_b));
        assert_eq!(bits(&bins_a), bits(&bins_c));
        let mag_bits = |m: &[f32]| -> Vec<u32> { m.iter().map(|v| v.to_bits()).collect() };
        assert_eq!(mag_bits(&mags_a), mag_bits(&mags_b));
    }

    #[test]
    fn test_constant_frame_is_dc_only() {
        let mut t = SpectralTransform::new(8, MagnitudeScale::Modulus, Window::Rectangular);
        let (bins, mags) = t.spectrum(&[1.0; 8]).unwrap();

        assert!((bins[0].re - 8.0).abs() < EPS);
        assert!(bins[0].im.abs() < EPS);
        assert!((mags[0] - 8.0).abs() < EPS);
        assert!(mags[1..].iter().all(|&m| m.abs() < EPS));
    }

    #[test]
    fn test_nyquist_packed_into_bin_zero() {
        let frame: Vec<f32> = (0..8).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let mut t = SpectralTransform::new(8, MagnitudeScale::Modulus, Window::Rectangular);
        let (bins, mags) = t.spectrum(&frame).unwrap();

        assert!(bins[0].re.abs() < EPS);
        assert!((bins[0].im - 8.0).abs() < EPS);
        assert!((mags[0] - 8.0).abs() < EPS);
        assert!(mags[1..].iter().all(|&m| m.abs() < EPS));
    }

    #[test]
    fn test_magnitudes_derive_from_stored_bins() {
        // DC and Nyquist both present: bin 0 holds (4, 4)
        let frame = [1.0_f32, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        for scale in [MagnitudeScale::Modulus, MagnitudeScale::Power, MagnitudeScale::Root] {
            let mut t = SpectralTransform::new(8, scale, Window::Rectangular);
            let (bins, mags) = t.spectrum(&frame).unwrap();

            assert!((bins[0].re - 4.0).abs() < EPS);
            assert!((bins[0].im - 4.0).abs() < EPS);
            for (i, (bin, &mag)) in bins.iter().zip(&mags).enumerate() {
                assert_eq!(mag, scale.apply(*bin), "{} bin {i}", scale.name());
            }
        }

        let mut t = SpectralTransform::new(8, MagnitudeScale::Modulus, Window::Rectangular);
        let (_, mags) = t.spectrum(&frame).unwrap();
        assert!((mags[0] - 32.0_f32.sqrt()).abs() < EPS);
    }

    #[test]
    fn test_magnitude_scales() {
        let frame = cosine(16, 2, 1.0);

        let mut modulus = SpectralTransform::new(16, MagnitudeScale::Modulus, Window::Rectangular);
        let mut power = SpectralTransform::new(16, MagnitudeScale::Power, Window::Rectangular);
        let mut root = SpectralTransform::new(16, MagnitudeScale::Root, Window::Rectangular);

        let (_, m) = modulus.spectrum(&frame).unwrap();
        let (_, p) = power.spectrum(&frame).unwrap();
        let (_, r) = root.spectrum(&frame).unwrap();

        assert!((m[2] - 8.0).abs() < EPS);
        assert!((p[2] - 64.0).abs() < 1e-2);
        assert!((r[2] - 8.0_f32.sqrt()).abs() < EPS);

        for i in [0, 1, 3, 7] {
            assert!(m[i].abs() < EPS, "bin {i} leaked: {}", m[i]);
        }
        assert!(m.iter().chain(&p).chain(&r).all(|&v| v >= 0.0));
    }

    #[test]
    fn test_hann_window_shape() {
        let w = Window::Hann.coefficients(1024).unwrap();
        assert!(w[0].abs() < 0.01);
        assert!(w[1023].abs() < 0.01);
        assert!((w[512] - 1.0).abs() < 0.01);
        assert!(Window::Rectangular.coefficients(1024).is_none());
    }

    #[test]
    fn test_window_does_not_touch_caller_frame() {
        let frame = vec![1.0_f32; 16];
        let mut t = SpectralTransform::new(16, MagnitudeScale::Modulus, Window::Hann);
        let (_, mags) = t.spectrum(&frame).unwrap();

        assert!(frame.iter().all(|&s| s == 1.0));
        // Sum of a symmetric Hann over 16 points is 7.5
        assert!((mags[0] - 7.5).abs() < EPS);
    }

    #[test]
    #[should_panic]
    fn test_odd_frame_len_panics() {
        SpectralTransform::new(7, MagnitudeScale::Modulus, Window::Rectangular);
    }

    #[test]
    fn test_rejects_wrong_lengths() {
        let mut t = SpectralTransform::new(8, MagnitudeScale::Modulus, Window::Rectangular);
        let mut bins = vec![Complex32::new(0.0, 0.0); 4];
        let mut mags = vec![0.0; 4];

        assert_eq!(
            t.transform(&[0.0; 6], &mut bins, &mut mags),
            Err(AnalysisError::DimensionMismatch {
                expected: 8,
                actual: 6
            })
        );
        assert_eq!(
            t.transform(&[0.0; 8], &mut bins[..3], &mut mags),
            Err(AnalysisError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        );
    }
}
