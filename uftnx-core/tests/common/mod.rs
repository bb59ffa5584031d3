//! Common test utilities and trace generators for integration tests
//!
//! Every generator is deterministic: noise comes from a seeded
//! linear-congruential generator, never from system entropy.

#![allow(dead_code)]

/// Seeded LCG (Numerical Recipes constants)
pub struct TestRng {
    state: u32,
}

impl TestRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.state
    }

    /// Uniform in `[0, 1)`
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / 16_777_216.0
    }

    pub fn gen_range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }
}

/// DC level with alternating ±`ripple`, the quietest trace that still moves
/// every sample.
pub fn carrier(n: usize, level: f32, ripple: f32) -> Vec<f32> {
    (0..n)
        .map(|i| level + if i % 2 == 0 { ripple } else { -ripple })
        .collect()
}

/// Sum of two incommensurate sines, period-free over a few thousand samples.
pub fn two_tone(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| {
            let t = i as f32;
            0.6 * (0.031 * t).sin() + 0.3 * (0.113 * t).sin()
        })
        .collect()
}

/// `clean` plus uniform noise in `[-amp, amp)`.
pub fn noisy(clean: &[f32], amp: f32, rng: &mut TestRng) -> Vec<f32> {
    clean.iter().map(|&v| v + rng.gen_range(-amp, amp)).collect()
}

/// Zero-padded delay: `out[i] = x[i - s]`.
pub fn delayed(x: &[f32], s: usize) -> Vec<f32> {
    let mut out = vec![0.0; x.len()];
    out[s..].copy_from_slice(&x[..x.len() - s]);
    out
}

pub fn mse(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = (x - y) as f64;
            d * d
        })
        .sum::<f64>()
        / a.len() as f64
}
