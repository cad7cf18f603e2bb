//! Helper utilities for benchmarks

/// Generate sine wave test signal
pub fn generate_sine_wave(freq: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * freq * t).sin()
        })
        .collect()
}

/// Generate white noise with a fixed seed, in [-1, 1]
pub fn generate_white_noise(frames: usize) -> Vec<f32> {
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    (0..frames)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as i32) as f32 / i32::MAX as f32
        })
        .collect()
}

/// Generate silence
pub fn generate_silence(frames: usize) -> Vec<f32> {
    vec![0.0; frames]
}

/// Calculate RMS level
pub fn calc_rms(buffer: &[f32]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = buffer.iter().map(|&s| s * s).sum();
    (sum_sq / buffer.len() as f32).sqrt()
}

/// Calculate peak level
pub fn calc_peak(buffer: &[f32]) -> f32 {
    buffer.iter().map(|&s| s.abs()).fold(0.0f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sine_wave() {
        let wave = generate_sine_wave(440.0, 48000, 512);
        assert_eq!(wave.len(), 512);
        assert!(wave.iter().all(|&s| (-1.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_generate_white_noise() {
        let noise = generate_white_noise(512);
        assert_eq!(noise.len(), 512);
        assert!(noise.iter().all(|&s| (-1.0..=1.0).contains(&s)));
        assert_eq!(noise, generate_white_noise(512));
        assert!(calc_rms(&noise) > 0.3);
    }

    #[test]
    fn test_calc_rms() {
        let signal = vec![1.0, -1.0, 1.0, -1.0];
        assert!((calc_rms(&signal) - 1.0).abs() < 0.01);
        assert_eq!(calc_rms(&generate_silence(16)), 0.0);
        assert_eq!(calc_rms(&[]), 0.0);
    }

    #[test]
    fn test_calc_peak() {
        let signal = vec![0.5, -0.8, 0.3, -0.2];
        assert!((calc_peak(&signal) - 0.8).abs() < 0.01);
    }
}
