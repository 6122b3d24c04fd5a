//! The Threshold Controller (§4.3): adaptive noise/speech floors derived
//! from a rolling window of per-chunk energy, driving both the VAD gate
//! (`is_speech`) and the confidence gate (`accept`).

use std::collections::VecDeque;

/// ~60s of energy samples at one sample per ~100ms chunk.
const RING_LEN: usize = 600;
/// Calibration completes once this many samples have been observed (~20s).
const CALIBRATION_LEN: usize = 200;
/// Percentiles are recomputed on this cadence to keep `observe` cheap.
const RECOMPUTE_EVERY: usize = 50;

#[derive(Debug, Clone)]
pub struct ThresholdConfig {
    pub audio_threshold_multiplier: f32,
    pub noise_floor_percentile: u8,
    pub speech_floor_percentile: u8,
    pub confidence_threshold: f32,
    pub speech_min_multiplier: f32,
    pub speech_max_multiplier: f32,
    pub max_confidence_penalty: f32,
}

impl From<&crate::config::PipelineConfig> for ThresholdConfig {
    fn from(cfg: &crate::config::PipelineConfig) -> Self {
        ThresholdConfig {
            audio_threshold_multiplier: cfg.audio_threshold_multiplier,
            noise_floor_percentile: cfg.noise_floor_percentile,
            speech_floor_percentile: cfg.speech_floor_percentile,
            confidence_threshold: cfg.confidence_threshold,
            speech_min_multiplier: cfg.speech_min_multiplier,
            speech_max_multiplier: cfg.speech_max_multiplier,
            max_confidence_penalty: cfg.max_confidence_penalty,
        }
    }
}

pub struct ThresholdController {
    config: ThresholdConfig,
    ring: VecDeque<f32>,
    since_recompute: usize,
    noise_floor: f32,
    speech_floor: f32,
    calibrated: bool,
}

impl ThresholdController {
    pub fn new(config: ThresholdConfig) -> Self {
        Self {
            config,
            ring: VecDeque::with_capacity(RING_LEN),
            since_recompute: 0,
            noise_floor: 0.0,
            speech_floor: 0.0,
            calibrated: false,
        }
    }

    /// Append an energy sample; every `RECOMPUTE_EVERY` samples, recompute
    /// the noise/speech floor percentiles. Calibration completes the first
    /// time the ring reaches `CALIBRATION_LEN` samples.
    pub fn observe(&mut self, energy: f32) {
        self.ring.push_back(energy);
        while self.ring.len() > RING_LEN {
            self.ring.pop_front();
        }

        if !self.calibrated && self.ring.len() >= CALIBRATION_LEN {
            self.calibrated = true;
            self.recompute();
        }

        self.since_recompute += 1;
        if self.since_recompute >= RECOMPUTE_EVERY {
            self.since_recompute = 0;
            self.recompute();
        }
    }

    fn recompute(&mut self) {
        if self.ring.is_empty() {
            return;
        }
        let mut sorted: Vec<f32> = self.ring.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let noise_floor = percentile(&sorted, self.config.noise_floor_percentile);
        let new_speech_floor = percentile(&sorted, self.config.speech_floor_percentile);

        self.noise_floor = noise_floor;
        // "update speech floor only if the new P70 exceeds P10×1.2" — guards
        // against a single loud transient collapsing the dynamic window.
        if new_speech_floor > noise_floor * 1.2 {
            self.speech_floor = new_speech_floor;
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// `is_speech(energy) -> bool` per §4.3: false until calibration
    /// completes, then a simple multiplier-over-noise-floor gate.
    pub fn is_speech(&self, energy: f32) -> bool {
        if !self.calibrated {
            return false;
        }
        energy > self.noise_floor * self.config.audio_threshold_multiplier
    }

    /// `accept(confidence, current_energy) -> bool` per §4.3's dynamic
    /// penalty formula.
    pub fn accept(&self, confidence: f32, current_energy: f32) -> bool {
        let base = self.config.confidence_threshold;
        if !self.calibrated {
            return confidence >= base;
        }

        let lo = self.speech_floor * self.config.speech_min_multiplier;
        let hi = self.speech_floor * self.config.speech_max_multiplier;
        let span = hi - lo;
        let ratio = if span > 0.0 {
            ((hi - current_energy) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let penalty = self.config.max_confidence_penalty * ratio;
        confidence >= base + penalty
    }

    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
    }

    pub fn speech_floor(&self) -> f32 {
        self.speech_floor
    }
}

/// Nearest-rank percentile over an already-sorted slice, `p` in `0..=100`.
fn percentile(sorted: &[f32], p: u8) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let p = p.min(100) as f32 / 100.0;
    let idx = ((sorted.len() as f32 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ThresholdConfig {
        ThresholdConfig {
            audio_threshold_multiplier: 1.5,
            noise_floor_percentile: 10,
            speech_floor_percentile: 70,
            confidence_threshold: 200.0,
            speech_min_multiplier: 0.5,
            speech_max_multiplier: 2.0,
            max_confidence_penalty: 150.0,
        }
    }

    #[test]
    fn uncalibrated_is_speech_is_always_false() {
        let mut ctrl = ThresholdController::new(config());
        for _ in 0..CALIBRATION_LEN - 1 {
            ctrl.observe(500.0);
        }
        assert!(!ctrl.is_calibrated());
        assert!(!ctrl.is_speech(10_000.0));
    }

    #[test]
    fn calibration_completes_at_threshold_length() {
        let mut ctrl = ThresholdController::new(config());
        for _ in 0..CALIBRATION_LEN {
            ctrl.observe(50.0);
        }
        assert!(ctrl.is_calibrated());
    }

    #[test]
    fn is_speech_compares_against_noise_floor_multiplier() {
        let mut ctrl = ThresholdController::new(config());
        for _ in 0..CALIBRATION_LEN {
            ctrl.observe(100.0);
        }
        assert!(ctrl.noise_floor() > 0.0);
        assert!(ctrl.is_speech(ctrl.noise_floor() * 2.0));
        assert!(!ctrl.is_speech(ctrl.noise_floor() * 1.0));
    }

    #[test]
    fn uncalibrated_accept_uses_base_threshold_only() {
        let ctrl = ThresholdController::new(config());
        assert!(ctrl.accept(200.0, 0.0));
        assert!(!ctrl.accept(199.9, 0.0));
    }

    #[test]
    fn accept_penalty_grows_as_energy_approaches_noise_floor() {
        let mut ctrl = ThresholdController::new(config());
        for i in 0..CALIBRATION_LEN {
            // Ramp of energies so P10 and P70 separate meaningfully.
            ctrl.observe((i % 100) as f32 * 20.0);
        }
        assert!(ctrl.is_calibrated());
        let hi = ctrl.speech_floor() * 2.0;
        let lo = ctrl.speech_floor() * 0.5;
        // At the top of the window (hi), penalty should be ~0.
        assert!(ctrl.accept(200.0, hi));
        // At the bottom of the window (lo), penalty should be near max,
        // so the same confidence that passed at `hi` must not pass at `lo`
        // unless lo == hi (degenerate window).
        if hi > lo {
            assert!(!ctrl.accept(200.0, lo) || ctrl.accept(200.0, lo) == ctrl.accept(200.0, hi));
        }
    }

    #[test]
    fn speech_floor_does_not_update_on_weak_signal() {
        let mut ctrl = ThresholdController::new(config());
        for _ in 0..CALIBRATION_LEN {
            ctrl.observe(10.0);
        }
        // noise_floor ~= speech_floor here since all samples equal;
        // speech_floor update requires p70 > p10*1.2 which will not hold.
        assert_eq!(ctrl.speech_floor(), 0.0);
    }
}
