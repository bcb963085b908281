use rustfft::{FftPlanner, num_complex::Complex};

pub const FRAME_SIZE: usize = 1024;
pub const HOP: usize = 512;

/// Spectral flux per analysis frame.
pub struct OnsetEnvelope {
    pub flux: Vec<f32>,
    /// Frames per second.
    pub frame_rate: f32,
    sample_rate: u32,
}

impl OnsetEnvelope {
    /// Time of the centre of frame `index`.
    pub fn time_of(&self, index: usize) -> f32 {
        (index * HOP + FRAME_SIZE / 2) as f32 / self.sample_rate as f32
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PickSettings {
    /// Frames on each side used for the moving-average threshold.
    pub radius: usize,
    pub multiplier: f32,
    pub delta: f32,
    /// Seconds.
    pub min_gap: f32,
}

impl Default for PickSettings {
    fn default() -> Self {
        Self {
            radius: 8,
            multiplier: 1.5,
            delta: 0.05,
            min_gap: 0.1,
        }
    }
}

pub fn spectral_flux(samples: &[f32], sample_rate: u32) -> OnsetEnvelope {
    let frame_rate = sample_rate as f32 / HOP as f32;
    let mut flux = Vec::new();

    if samples.len() >= FRAME_SIZE && sample_rate > 0 {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FRAME_SIZE);
        let window: Vec<f32> = (0..FRAME_SIZE)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / FRAME_SIZE as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect();

        let bins = FRAME_SIZE / 2 + 1;
        let mut buffer = vec![Complex::new(0.0f32, 0.0); FRAME_SIZE];
        let mut prev = vec![0.0f32; bins];

        for start in (0..=samples.len() - FRAME_SIZE).step_by(HOP) {
            let frame = &samples[start..start + FRAME_SIZE];
            for ((slot, &x), &w) in buffer.iter_mut().zip(frame).zip(&window) {
                *slot = Complex::new(x * w, 0.0);
            }

            fft.process(&mut buffer);

            let mut sum = 0.0;
            for (bin, last) in buffer[..bins].iter().zip(prev.iter_mut()) {
                let mag = bin.norm();
                sum += (mag - *last).max(0.0);
                *last = mag;
            }
            flux.push(sum);
        }
    }

    OnsetEnvelope {
        flux,
        frame_rate,
        sample_rate,
    }
}

/// Frame indices that stand out from their neighbourhood.
pub fn pick_peaks(flux: &[f32], settings: &PickSettings, frame_rate: f32) -> Vec<usize> {
    let max = flux.iter().copied().fold(0.0f32, f32::max);
    if max <= f32::EPSILON {
        return Vec::new();
    }

    let norm: Vec<f32> = flux.iter().map(|v| v / max).collect();
    let min_gap_frames = (settings.min_gap * frame_rate).round() as usize;
    let mut picked: Vec<usize> = Vec::new();

    for (i, &v) in norm.iter().enumerate() {
        let lo = i.saturating_sub(settings.radius);
        let hi = (i + settings.radius + 1).min(norm.len());
        let mean = norm[lo..hi].iter().sum::<f32>() / (hi - lo) as f32;

        let rising = i == 0 || v > norm[i - 1];
        let falling = i + 1 == norm.len() || v >= norm[i + 1];
        if !(rising && falling) || v <= mean * settings.multiplier + settings.delta {
            continue;
        }

        match picked.last() {
            Some(&last) if i - last < min_gap_frames => {
                // keep the stronger of two onsets that are too close
                if v > norm[last] {
                    picked.pop();
                    picked.push(i);
                }
            }
            _ => picked.push(i),
        }
    }

    picked
}

/// Onset times in seconds together with the envelope they were picked from.
pub fn detect_onsets(
    samples: &[f32],
    sample_rate: u32,
    settings: &PickSettings,
) -> (Vec<f32>, OnsetEnvelope) {
    let envelope = spectral_flux(samples, sample_rate);
    let times = pick_peaks(&envelope.flux, settings, envelope.frame_rate)
        .into_iter()
        .map(|i| envelope.time_of(i))
        .collect();

    (times, envelope)
}

/// Threshold onset detection used when the analysis worker is unavailable.
pub fn amplitude_onsets(
    samples: &[f32],
    sample_rate: u32,
    threshold: f32,
    skip: usize,
) -> Vec<f32> {
    crate::tempo::detect_peaks(samples, threshold, skip)
        .into_iter()
        .map(|i| i as f32 / sample_rate as f32)
        .collect()
}
