use super::lerp;

/// Root-mean-square level of `samples`, 0 for an empty slice
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Slow loudness follower driven by per-frame RMS
///
/// Each update keeps `decay` of the previous value and takes `1 - decay` of
/// the new reading. Starts at 0.
#[derive(Debug, Clone)]
pub struct RmsEnvelope {
    decay: f32,
    value: f32,
}

impl RmsEnvelope {
    pub fn new(decay: f32) -> Self {
        Self { decay, value: 0.0 }
    }

    pub fn update(&mut self, rms: f32) -> f32 {
        self.value = lerp(rms, self.value, self.decay);
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_silence_is_zero() {
        assert_eq!(rms(&[0.0; 512]), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_of_constant_is_amplitude() {
        assert_eq!(rms(&[0.5; 8]), 0.5);
        assert_eq!(rms(&[-0.5; 8]), 0.5);
        assert!((rms(&[-0.3; 512]) - 0.3).abs() < 1e-4);
    }

    #[test]
    fn test_rms_of_square_wave() {
        let samples: Vec<f32> = (0..64).map(|i| if i % 2 == 0 { 0.8 } else { -0.8 }).collect();
        assert!((rms(&samples) - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_envelope_starts_at_zero_and_decays_toward_input() {
        let mut env = RmsEnvelope::new(0.9);
        assert_eq!(env.value(), 0.0);

        assert!((env.update(1.0) - 0.1).abs() < 1e-6);
        assert!((env.update(1.0) - 0.19).abs() < 1e-6);

        for _ in 0..500 {
            env.update(1.0);
        }
        assert!((env.value() - 1.0).abs() < 1e-4);

        env.reset();
        assert_eq!(env.value(), 0.0);
    }
}
