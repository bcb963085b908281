use crate::{
    judge::HitWindow,
    log::{Log, log},
};
use sdl2::pixels::Color;
use std::str::FromStr;

pub const TITLE: &str = "beatlane";
pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 400;
pub const FONT_PATH: &str = "CascadiaMono.ttf";
pub const FONT_SIZE: u16 = 20;

pub const LANE_COUNT: usize = 4;
pub const LANE_WIDTH: u32 = 50;
pub const LANE_X: [i32; LANE_COUNT] = [150, 300, 450, 600];
pub const LANE_COLORS: [Color; LANE_COUNT] = [
    Color::RGB(0xFF, 0x4D, 0x4D),
    Color::RGB(0x4D, 0x94, 0xFF),
    Color::RGB(0x4D, 0xFF, 0x4D),
    Color::RGB(0xFF, 0xFF, 0x4D),
];
pub const NOTE_SIZE: u32 = 20;
pub const JUDGMENT_Y: f32 = (HEIGHT - 100) as f32;
pub const FLASH_DURATION: f32 = 0.15;
pub const FEEDBACK_SECS: f32 = 0.5;

pub const BAR_AREA_HEIGHT: u32 = 120;

pub const PITCH_RANGE: (f32, f32) = (80.0, 400.0);
pub const TEMPO_RANGE: (f32, f32) = (40.0, 240.0);
pub const BASE_SCORE: u32 = 10;
pub const MAX_MULTIPLIER: u32 = 5;
pub const STREAK_PER_MULTIPLIER: u32 = 10;

/// Tunables that can be overridden from the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub hit_window: HitWindow,
    pub miss_limit: u32,
    pub scroll_speed: f32,
    pub peak_threshold: f32,
    pub peak_skip: usize,
    pub fallback_threshold: f32,
    pub lowpass: bool,
    pub window_size: usize,
    pub long_note_chance: f64,
    pub min_onset_gap: f32,
    pub volume: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hit_window: HitWindow::Seconds(0.15),
            miss_limit: 5,
            scroll_speed: 300.0,
            peak_threshold: 0.9,
            peak_skip: 10_000,
            fallback_threshold: 0.5,
            lowpass: true,
            window_size: 2048,
            long_note_chance: 0.3,
            min_onset_gap: 0.1,
            volume: 0.5,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut s = Self::default();

        let hit_secs: Option<f32> = parse_var(&lookup, "BEATLANE_HIT_WINDOW");
        let hit_px: Option<f32> = parse_var(&lookup, "BEATLANE_HIT_WINDOW_PX");
        s.miss_limit = parse_var(&lookup, "BEATLANE_MISS_LIMIT").unwrap_or(s.miss_limit);
        s.scroll_speed = parse_var(&lookup, "BEATLANE_SCROLL_SPEED").unwrap_or(s.scroll_speed);
        s.peak_threshold =
            parse_var(&lookup, "BEATLANE_PEAK_THRESHOLD").unwrap_or(s.peak_threshold);
        s.peak_skip = parse_var(&lookup, "BEATLANE_PEAK_SKIP").unwrap_or(s.peak_skip);
        s.lowpass = parse_var(&lookup, "BEATLANE_LOWPASS").unwrap_or(s.lowpass);
        s.window_size = parse_var(&lookup, "BEATLANE_WINDOW").unwrap_or(s.window_size);
        s.long_note_chance =
            parse_var(&lookup, "BEATLANE_LONG_NOTES").unwrap_or(s.long_note_chance);
        s.min_onset_gap = parse_var(&lookup, "BEATLANE_MIN_GAP").unwrap_or(s.min_onset_gap);
        s.fallback_threshold =
            parse_var(&lookup, "BEATLANE_FALLBACK_THRESHOLD").unwrap_or(s.fallback_threshold);
        s.volume = parse_var(&lookup, "BEATLANE_VOLUME").unwrap_or(s.volume);

        // pixels win when both are given
        if let Some(px) = hit_px {
            s.hit_window = HitWindow::Pixels(px);
        } else if let Some(secs) = hit_secs {
            s.hit_window = HitWindow::Seconds(secs);
        }

        s.long_note_chance = s.long_note_chance.clamp(0.0, 1.0);
        s.volume = s.volume.clamp(0.0, 1.0);
        s.window_size = s.window_size.max(64);
        s.min_onset_gap = s.min_onset_gap.max(0.0);
        s
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;

    match raw.trim().parse::<T>() {
        Ok(value) => {
            log(Log::Debug, format!("{name}={raw}"));
            Some(value)
        }
        Err(_) => {
            log(Log::Warning, format!("ignoring {name}=\"{raw}\" (unparsable)"));
            None
        }
    }
}
