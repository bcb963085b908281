use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

pub const FFT_SIZE: usize = 256;
pub const BARS: usize = FFT_SIZE / 2;

const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;
const SMOOTHING: f32 = 0.8;

/// Byte-scaled frequency bars for the visualizer.
pub struct Spectrum {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: [f32; BARS],
    bars: [u8; BARS],
}

impl Spectrum {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let window = (0..FFT_SIZE)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / FFT_SIZE as f32).cos()))
            .collect();

        Self {
            fft,
            window,
            buffer: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            smoothed: [0.0; BARS],
            bars: [0; BARS],
        }
    }

    /// Analyzes the first `FFT_SIZE` samples (zero padded) and returns the bars.
    pub fn update(&mut self, samples: &[f32]) -> &[u8; BARS] {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let x = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(x * self.window[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        for (i, bin) in self.buffer[..BARS].iter().enumerate() {
            let mag = bin.norm() / FFT_SIZE as f32;
            self.smoothed[i] = SMOOTHING * self.smoothed[i] + (1.0 - SMOOTHING) * mag;
            self.bars[i] = to_byte(self.smoothed[i]);
        }

        &self.bars
    }

    pub fn reset(&mut self) {
        self.smoothed = [0.0; BARS];
        self.bars = [0; BARS];
    }
}

fn to_byte(mag: f32) -> u8 {
    if mag <= 0.0 {
        return 0;
    }

    let db = 20.0 * mag.log10();
    let scaled = (db - MIN_DB) / (MAX_DB - MIN_DB) * 255.0;
    scaled.clamp(0.0, 255.0) as u8
}

/// Colour for a bar whose byte value is `value`.
pub fn bar_color(value: u8) -> (u8, u8, u8) {
    let h = value / 2;
    (h + 50, 50, 255 - h)
}
