/// First-order RC low-pass.
pub struct LowPass {
    prev: f32,
    alpha: f32,
}

impl LowPass {
    pub fn new(sample_rate: u32, cutoff: f32) -> Self {
        let dt = 1.0 / sample_rate as f32;
        let rc = 1.0 / (2.0 * std::f32::consts::PI * cutoff);

        Self {
            prev: 0.0,
            alpha: dt / (rc + dt),
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        self.prev += self.alpha * (x - self.prev);
        self.prev
    }
}

/// Low-passes `samples` and rescales the result so its peak matches the input peak.
///
/// Without the rescale a 150 Hz cutoff leaves most material far below any
/// fixed amplitude threshold.
pub fn lowpass_normalized(samples: &[f32], sample_rate: u32, cutoff: f32) -> Vec<f32> {
    let mut lp = LowPass::new(sample_rate, cutoff);
    let mut out: Vec<f32> = samples.iter().map(|&x| lp.process(x)).collect();

    let peak_in = peak(samples);
    let peak_out = peak(&out);

    if peak_out > f32::EPSILON {
        let gain = peak_in / peak_out;
        out.iter_mut().for_each(|x| *x *= gain);
    }

    out
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, x| acc.max(x.abs()))
}
