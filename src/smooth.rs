use std::time::Instant;

/// Linear ramp between two values over one audio callback.
pub struct Smooth {
    from: f32,
    to: f32,
}

impl Smooth {
    pub const fn new(value: f32) -> Self {
        Self {
            from: value,
            to: value,
        }
    }

    pub const fn interpolate(&self, t: f32) -> f32 {
        t * self.to + (1.0 - t) * self.from
    }

    pub const fn set(&mut self, to: f32) {
        self.to = to;
    }

    pub const fn stabilize(&mut self) {
        self.from = self.to;
    }

    pub const fn target(&self) -> f32 {
        self.to
    }
}

/// A value that eases out towards its target over `duration` seconds.
pub struct TimedSmooth {
    smooth: Smooth,
    started: Instant,
    duration: f32,
}

impl TimedSmooth {
    pub fn new(value: f32, duration: f32, now: Instant) -> Self {
        Self {
            smooth: Smooth::new(value),
            started: now,
            duration,
        }
    }

    fn ratio(&self, now: Instant) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }

        let r = ((now - self.started).as_secs_f32() / self.duration).min(1.0);
        r * (2.0 - r)
    }

    pub fn value(&self, now: Instant) -> f32 {
        self.smooth.interpolate(self.ratio(now))
    }

    /// Starts a new transition from wherever the value currently is.
    pub fn shift_set(&mut self, to: f32, now: Instant) {
        let current = self.value(now);
        self.smooth = Smooth::new(current);
        self.smooth.set(to);
        self.started = now;
    }

    /// Snaps to `from` and eases towards `to`.
    pub fn restart(&mut self, from: f32, to: f32, now: Instant) {
        self.smooth = Smooth::new(from);
        self.smooth.set(to);
        self.started = now;
    }
}
