use crate::{decode::Track, smooth::Smooth};
use sdl2::audio::AudioCallback;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

pub type Sample = f32;

/// Plays a decoded track from memory.
pub struct Playback {
    samples: Arc<[Sample]>,
    channels: usize,
    pub sample_rate: u32,
    position: usize,
    volume: Smooth,
    pub end: bool,
}

impl Playback {
    pub fn new(track: &Track, volume: f32) -> Self {
        let mut fade = Smooth::new(0.0);
        fade.set(volume);

        Self {
            samples: Arc::clone(&track.samples),
            channels: track.channels,
            sample_rate: track.sample_rate,
            position: 0,
            volume: fade,
            end: false,
        }
    }

    fn total_frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Seconds of audio handed to the device so far.
    pub fn seconds(&self) -> f32 {
        self.position as f32 / self.sample_rate as f32
    }

    pub fn progress(&self) -> f32 {
        match self.total_frames() {
            0 => 1.0,
            total => self.position as f32 / total as f32,
        }
    }

    /// Back to the start, fading in again.
    pub fn rewind(&mut self) {
        let volume = self.volume.target();
        self.position = 0;
        self.end = false;
        self.volume = Smooth::new(0.0);
        self.volume.set(volume);
    }

    fn fill(&mut self, out: &mut [Sample]) {
        let channels = self.channels;
        let frames = out.len() / channels;
        let total = self.total_frames();

        for frame in 0..frames {
            let t = frame as f32 / frames as f32;
            let gain = self.volume.interpolate(t);
            let dst = &mut out[frame * channels..(frame + 1) * channels];

            if self.position < total {
                let src = &self.samples[self.position * channels..(self.position + 1) * channels];
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = s * gain;
                }
                self.position += 1;
            } else {
                dst.fill(0.0);
                self.end = true;
            }
        }

        // a trailing partial frame can only come from a misbehaving driver
        out[frames * channels..].fill(0.0);
        self.volume.stabilize();
    }
}

impl AudioCallback for Playback {
    type Channel = Sample;

    fn callback(&mut self, out: &mut [Self::Channel]) {
        self.fill(out);
    }
}

/// Smooths the device position, which only advances once per callback, into a
/// per-frame game clock.
pub struct SongClock {
    reported: f32,
    at: Instant,
    /// Audio handed to the device but not heard yet, in seconds.
    latency: f32,
    /// Song time held while paused.
    frozen: Option<f32>,
}

/// The clock never runs further ahead of the device than this.
const MAX_LEAD: f32 = 0.1;

impl SongClock {
    pub fn new(now: Instant, latency: f32) -> Self {
        Self {
            reported: 0.0,
            at: now,
            latency: latency.max(0.0),
            frozen: None,
        }
    }

    pub fn sync(&mut self, reported: f32, now: Instant) {
        if self.frozen.is_none() && reported != self.reported {
            self.reported = reported;
            self.at = now;
        }
    }

    pub fn now(&self, now: Instant) -> f32 {
        if let Some(frozen) = self.frozen {
            return frozen;
        }

        let lead = now.saturating_duration_since(self.at).as_secs_f32().min(MAX_LEAD);
        (self.reported + lead - self.latency).max(0.0)
    }

    pub fn pause(&mut self, now: Instant) {
        if self.frozen.is_none() {
            self.frozen = Some(self.now(now));
        }
    }

    /// Continues from the held time rather than snapping back to the last report.
    pub fn resume(&mut self, now: Instant) {
        if let Some(frozen) = self.frozen.take() {
            let lead = (frozen + self.latency - self.reported).clamp(0.0, MAX_LEAD);
            self.at = now.checked_sub(Duration::from_secs_f32(lead)).unwrap_or(now);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.frozen.is_some()
    }
}
