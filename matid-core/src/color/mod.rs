//! Iteration-indexed color sequence for material ID shaders.
//!
//! Each generated material gets `color_for(iteration)`. Hue advances in
//! twelfths; saturation or value drifts downward depending on the parity of
//! the rounded hue. The drift is never clamped from below, so very large
//! iterations produce negative channels. That output is kept as-is because
//! downstream masks may already depend on it.

use glam::Vec4;
use serde::{Deserialize, Serialize};

/// Hue advance per iteration (roughly 1/12).
pub const HUE_STEP: f64 = 0.08333;
/// Saturation drop per unit of accumulated hue on even rounded hues.
pub const SATURATION_DRIFT: f64 = 0.02;
/// Value drop per unit of accumulated hue on odd rounded hues.
pub const VALUE_DRIFT: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self { Self { r, g, b, a } }
    pub fn to_array(self) -> [f64; 4] { [self.r, self.g, self.b, self.a] }
    /// Narrow to the `f32` socket representation used by shader nodes.
    pub fn to_vec4(self) -> Vec4 { Vec4::from_array(self.to_array().map(|c| c as f32)) }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

/// Wrap `n` into `max` the way the color sequence expects: equal stays,
/// greater wraps by modulo, anything smaller (negatives included) passes
/// through untouched.
pub fn keep_in(n: f64, max: f64) -> f64 {
    if n == max {
        n
    } else if n > max {
        n % max
    } else {
        n
    }
}

/// Rounded-hue parity used to pick between saturation and value drift.
/// Ties round to even.
pub fn is_even_band(h: f64) -> bool {
    h.round_ties_even().rem_euclid(2.0) == 0.0
}

/// Post-wrap HSV triple for an iteration.
pub fn hsv_for(iteration: u64) -> Hsv {
    let mut h = 0.0_f64;
    let mut s = 1.0_f64;
    let mut v = 1.0_f64;

    h += HUE_STEP * iteration as f64;
    if is_even_band(h) {
        s -= h * SATURATION_DRIFT;
    } else {
        v -= h * VALUE_DRIFT;
    }

    Hsv { h: keep_in(h, 1.0), s: keep_in(s, 1.0), v: keep_in(v, 1.0) }
}

/// Color assigned to the material at `iteration`. Alpha is always 1.0.
pub fn color_for(iteration: u64) -> Rgba {
    let Hsv { h, s, v } = hsv_for(iteration);
    let (r, g, b) = hsv_to_rgb(h, s, v);
    Rgba::new(r, g, b, 1.0)
}

/// Six-sector HSV to RGB conversion. Inputs are not clamped.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let i = (h * 6.0).trunc();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (i as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// Endless iterator over `color_for(start)`, `color_for(start + 1)`, ...
#[derive(Debug, Clone, Default)]
pub struct ColorSequence {
    next: u64,
}

impl ColorSequence {
    pub fn new() -> Self { Self { next: 0 } }
    pub fn starting_at(iteration: u64) -> Self { Self { next: iteration } }
}

impl Iterator for ColorSequence {
    type Item = Rgba;

    fn next(&mut self) -> Option<Rgba> {
        let c = color_for(self.next);
        self.next = self.next.saturating_add(1);
        Some(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn alpha_is_always_one() {
        for n in [0u64, 1, 5, 11, 12, 99, 253, 1200, 50_000, u32::MAX as u64] {
            assert_eq!(color_for(n).a, 1.0);
        }
    }

    #[test]
    fn first_color_is_pure_red() {
        assert_eq!(color_for(0), Rgba::new(1.0, 0.0, 0.0, 1.0));
        let (r, g, b) = hsv_to_rgb(0.0, 1.0, 1.0);
        assert_eq!(color_for(0).to_array(), [r, g, b, 1.0]);
    }

    #[test]
    fn first_cycle_branches_on_rounded_hue() {
        for n in 0..12u64 {
            let raw = HUE_STEP * n as f64;
            let hsv = hsv_for(n);
            assert_abs_diff_eq!(hsv.h, raw, epsilon = 1e-12);
            if n <= 6 {
                assert!(is_even_band(raw), "n={n}");
                assert_abs_diff_eq!(hsv.s, 1.0 - raw * SATURATION_DRIFT, epsilon = 1e-12);
                assert_eq!(hsv.v, 1.0);
            } else {
                assert!(!is_even_band(raw), "n={n}");
                assert_eq!(hsv.s, 1.0);
                assert_abs_diff_eq!(hsv.v, 1.0 - raw * VALUE_DRIFT, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn same_iteration_is_bit_identical() {
        for n in [0u64, 3, 17, 640, 12_345] {
            let a = color_for(n).to_array().map(f64::to_bits);
            let b = color_for(n).to_array().map(f64::to_bits);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn one_hue_cycle_has_no_repeats() {
        let colors: Vec<_> = ColorSequence::new().take(12).collect();
        for i in 0..colors.len() {
            for j in (i + 1)..colors.len() {
                assert_ne!(colors[i], colors[j], "{i} vs {j}");
            }
        }
    }

    #[test]
    fn keep_in_wraps_only_above_max() {
        assert_eq!(keep_in(1.0, 1.0), 1.0);
        assert_abs_diff_eq!(keep_in(1.25, 1.0), 0.25, epsilon = 1e-12);
        assert_eq!(keep_in(2.0, 1.0), 0.0);
        assert_eq!(keep_in(0.4, 1.0), 0.4);
        assert_eq!(keep_in(-0.3, 1.0), -0.3);
    }

    // Large iterations push value or saturation below zero; the sequence
    // keeps those negative channels instead of clamping them.
    #[test]
    fn negative_value_is_not_clamped() {
        let n = 253;
        let raw = HUE_STEP * n as f64;
        assert!(!is_even_band(raw));
        let hsv = hsv_for(n);
        assert!(hsv.v < 0.0);
        assert_abs_diff_eq!(hsv.v, 1.0 - raw * VALUE_DRIFT, epsilon = 1e-12);
        assert_abs_diff_eq!(hsv.h, raw % 1.0, epsilon = 1e-12);
        assert!(color_for(n).r < 0.0);
    }

    #[test]
    fn negative_saturation_is_not_clamped() {
        let n = 1200;
        let raw = HUE_STEP * n as f64;
        assert!(is_even_band(raw));
        let hsv = hsv_for(n);
        assert!(hsv.s < 0.0);
        assert_abs_diff_eq!(hsv.s, 1.0 - raw * SATURATION_DRIFT, epsilon = 1e-12);
        assert_eq!(hsv.v, 1.0);
    }

    #[test]
    fn grey_when_saturation_is_zero() {
        assert_eq!(hsv_to_rgb(0.7, 0.0, 0.25), (0.25, 0.25, 0.25));
    }

    #[test]
    fn sequence_resumes_from_offset() {
        let mut seq = ColorSequence::starting_at(7);
        assert_eq!(seq.next(), Some(color_for(7)));
        assert_eq!(seq.next(), Some(color_for(8)));
    }
}
