//! # Fast Fourier Transform (FFT) Module
//!
//! FFT-backed autocorrelation. It produces the same lags as the direct sum in
//! [`crate::pitch::autocorrelate`] in O(M log M), which matters once frames
//! grow past a few thousand samples.
//!
//! The window is zero-padded to at least `2M - 1` samples so the circular
//! correlation computed by the FFT does not wrap around.

use rustfft::{FftPlanner, num_complex::Complex};

/// FFT length needed to correlate `window_len` samples without wrap-around.
pub fn padded_len(window_len: usize) -> usize {
    (2 * window_len).saturating_sub(1).max(1).next_power_of_two()
}

/// Autocorrelation of `window` for lags `0..window.len()`.
///
/// 1. Zero-pad and transform forward
/// 2. Multiply each bin by its conjugate (power spectrum)
/// 3. Transform back and scale by 1/N
pub fn autocorrelate(window: &[f32]) -> Vec<f64> {
    let len = window.len();
    if len == 0 {
        return Vec::new();
    }
    let fft_len = padded_len(len);

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    let mut buffer: Vec<Complex<f64>> = window
        .iter()
        .map(|&sample| Complex::new(sample as f64, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(fft_len)
        .collect();

    forward.process(&mut buffer);
    for bin in buffer.iter_mut() {
        *bin = Complex::new(bin.norm_sqr(), 0.0);
    }
    inverse.process(&mut buffer);

    let scale = 1.0 / fft_len as f64;
    buffer.iter().take(len).map(|c| c.re * scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch;

    #[test]
    fn padding_avoids_wrap_around() {
        assert_eq!(padded_len(1), 1);
        assert_eq!(padded_len(3), 8);
        assert_eq!(padded_len(4096), 8192);
        assert_eq!(padded_len(3000), 8192);
    }

    #[test]
    fn matches_direct_sum() {
        let window: Vec<f32> = (0..300)
            .map(|i| (i as f32 * 0.13).sin() * 0.7 + (i as f32 * 0.41).cos() * 0.2)
            .collect();
        let direct = pitch::autocorrelate(&window);
        let fast = autocorrelate(&window);
        assert_eq!(direct.len(), fast.len());
        for (lag, (d, f)) in direct.iter().zip(&fast).enumerate() {
            assert!((d - f).abs() < 1e-6, "lag {lag}: direct {d}, fft {f}");
        }
    }

    #[test]
    fn empty_window() {
        assert!(autocorrelate(&[]).is_empty());
    }
}
