use crate::filter;
use std::{borrow::Cow, collections::BTreeMap, fmt::Display, ops::Range};

/// Intervals are tallied in buckets of this many samples.
const INTERVAL_BUCKET: usize = 10;
const LOWPASS_CUTOFF: f32 = 150.0;

/// A tempo estimate. Derived once per track and never modified afterwards.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Bpm(f32);

impl Bpm {
    /// `None` unless `value` is finite and positive.
    pub fn new(value: f32) -> Option<Self> {
        (value.is_finite() && value > 0.0).then_some(Self(value))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn beat_secs(self) -> f32 {
        60.0 / self.0
    }

    fn from_period(period: f64, rate: f64) -> Option<Self> {
        let bpm = 60.0 * rate / period;
        (bpm.is_finite() && bpm > 0.0).then_some(Self(bpm as f32))
    }
}

impl Display for Bpm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1} BPM", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TempoError {
    /// Fewer than two peaks (or no positively correlated lag) qualified.
    NoPeaksDetected,
    EmptyInput,
    InvalidSampleRate,
    /// A BPM bound that is not finite and positive.
    InvalidRange,
}

impl Display for TempoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TempoError::NoPeaksDetected => write!(f, "no peaks detected"),
            TempoError::EmptyInput => write!(f, "empty sample buffer"),
            TempoError::InvalidSampleRate => write!(f, "sample rate must be positive"),
            TempoError::InvalidRange => write!(f, "BPM range bounds must be positive"),
        }
    }
}

impl std::error::Error for TempoError {}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakSettings {
    pub threshold: f32,
    pub skip: usize,
    pub lowpass: bool,
}

impl Default for PeakSettings {
    fn default() -> Self {
        Self {
            threshold: 0.9,
            skip: 10_000,
            lowpass: false,
        }
    }
}

/// Whole-track tempo with default peak settings.
pub fn estimate_tempo(samples: &[f32], sample_rate: u32) -> Result<Bpm, TempoError> {
    peak_interval_bpm(samples, sample_rate, &PeakSettings::default())
}

/// Indices of samples above `threshold`. After each hit the next `skip`
/// samples are ignored so one transient only counts once.
pub fn detect_peaks(samples: &[f32], threshold: f32, skip: usize) -> Vec<usize> {
    let mut peaks = Vec::new();
    let mut i = 0;

    while i < samples.len() {
        if samples[i] > threshold {
            peaks.push(i);
            i += skip;
        }
        i += 1;
    }

    peaks
}

/// Tally of pairwise peak distances, rounded to the nearest bucket.
///
/// Quadratic in the number of peaks; the skip in [`detect_peaks`] keeps that small.
pub fn interval_histogram(peaks: &[usize]) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();

    for (i, &a) in peaks.iter().enumerate() {
        for &b in &peaks[i + 1..] {
            *counts.entry(bucket_of(b - a)).or_insert(0) += 1;
        }
    }

    counts
}

/// Bucket of `interval` in [`interval_histogram`].
fn bucket_of(interval: usize) -> usize {
    (interval + INTERVAL_BUCKET / 2) / INTERVAL_BUCKET * INTERVAL_BUCKET
}

/// Mean of the unrounded pairwise distances that fall into `bucket`.
pub fn mean_interval_in_bucket(peaks: &[usize], bucket: usize) -> Option<f64> {
    let (sum, count) = peaks
        .iter()
        .enumerate()
        .flat_map(|(i, &a)| peaks[i + 1..].iter().map(move |&b| b - a))
        .filter(|&interval| bucket_of(interval) == bucket)
        .fold((0usize, 0usize), |(sum, count), interval| (sum + interval, count + 1));

    (count > 0).then(|| sum as f64 / count as f64)
}

/// The most frequent interval; on a tie the smallest one.
pub fn most_common_interval(histogram: &BTreeMap<usize, usize>) -> Option<usize> {
    histogram
        .iter()
        .fold(None, |best: Option<(usize, usize)>, (&interval, &count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((interval, count)),
        })
        .map(|(interval, _)| interval)
}

pub fn peak_interval_bpm(
    samples: &[f32],
    sample_rate: u32,
    settings: &PeakSettings,
) -> Result<Bpm, TempoError> {
    validate(samples, sample_rate)?;

    let data: Cow<[f32]> = if settings.lowpass {
        Cow::Owned(filter::lowpass_normalized(samples, sample_rate, LOWPASS_CUTOFF))
    } else {
        Cow::Borrowed(samples)
    };

    let peaks = detect_peaks(&data, settings.threshold, settings.skip);

    if peaks.len() < 2 {
        return Err(TempoError::NoPeaksDetected);
    }

    let bucket = most_common_interval(&interval_histogram(&peaks))
        .filter(|&bucket| bucket > 0)
        .ok_or(TempoError::NoPeaksDetected)?;

    // the bucket only picks the winner; the tempo comes from the real distances
    let interval = mean_interval_in_bucket(&peaks, bucket).ok_or(TempoError::NoPeaksDetected)?;
    let bpm =
        Bpm::from_period(interval, sample_rate as f64).ok_or(TempoError::NoPeaksDetected)?;

    Ok(Bpm(bpm.0.round()))
}

pub(crate) fn correlation_at(window: &[f32], lag: usize) -> f32 {
    window
        .iter()
        .zip(window.iter().skip(lag))
        .map(|(a, b)| a * b)
        .sum()
}

/// Lag in `lags` with the largest positive autocorrelation. Lag 0 is never considered.
pub fn autocorrelation_lag(window: &[f32], lags: Range<usize>) -> Option<usize> {
    let lags = lags.start.max(1)..lags.end.min(window.len());
    let mut best: Option<(usize, f32)> = None;

    for lag in lags {
        let value = correlation_at(window, lag);

        if value > 0.0 && best.is_none_or(|(_, best_value)| value > best_value) {
            best = Some((lag, value));
        }
    }

    best.map(|(lag, _)| lag)
}

/// Tempo from the strongest self-similarity lag of `window`.
///
/// `rate` is the rate of the series: the sample rate for raw PCM, the frame
/// rate for an onset envelope. With `range` only lags whose tempo falls inside
/// `(min_bpm, max_bpm)` are searched.
pub fn autocorrelation_bpm(
    window: &[f32],
    rate: f32,
    range: Option<(f32, f32)>,
) -> Result<Bpm, TempoError> {
    if window.is_empty() {
        return Err(TempoError::EmptyInput);
    }
    if !(rate > 0.0) {
        return Err(TempoError::InvalidSampleRate);
    }

    let lags = match range {
        None => 1..window.len(),
        Some((min_bpm, max_bpm)) => {
            let valid = |bpm: f32| bpm.is_finite() && bpm > 0.0;
            if !valid(min_bpm) || !valid(max_bpm) {
                return Err(TempoError::InvalidRange);
            }

            let shortest = (60.0 * rate / max_bpm).ceil() as usize;
            let longest = (60.0 * rate / min_bpm).floor() as usize;
            shortest..longest.saturating_add(1)
        }
    };

    let lag = autocorrelation_lag(window, lags).ok_or(TempoError::NoPeaksDetected)?;
    Bpm::from_period(lag as f64, rate as f64).ok_or(TempoError::NoPeaksDetected)
}

fn validate(samples: &[f32], sample_rate: u32) -> Result<(), TempoError> {
    if sample_rate == 0 {
        Err(TempoError::InvalidSampleRate)
    } else if samples.is_empty() {
        Err(TempoError::EmptyInput)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse_train(period: usize, len: usize) -> Vec<f32> {
        (0..len).map(|i| if i % period == 0 { 1.0 } else { 0.0 }).collect()
    }

    #[test]
    fn impulse_train_gives_exact_bpm() {
        let sr = 44_100;
        let samples = impulse_train(22_050, sr as usize * 10);
        assert_eq!(estimate_tempo(&samples, sr), Ok(Bpm(120.0)));
    }

    #[test]
    fn impulse_train_off_bucket() {
        // 18375 samples is exactly 144 BPM and rounds to the 18380 bucket
        let sr = 44_100;
        let samples = impulse_train(18_375, sr as usize * 8);
        assert_eq!(estimate_tempo(&samples, sr).map(Bpm::value), Ok(144.0));
    }

    #[test]
    fn tempo_comes_from_exact_spacing_not_bucket() {
        // 10004 samples is 264.49 BPM; its 10000 bucket alone would say 265
        let sr = 44_100;
        let samples = impulse_train(10_004, sr as usize * 5);
        assert_eq!(estimate_tempo(&samples, sr).map(Bpm::value), Ok(264.0));
    }

    #[test]
    fn bucket_mean_ignores_other_buckets() {
        let peaks = [0, 98, 201];
        // 98 -> 100, 103 -> 100, 201 -> 200
        assert_eq!(mean_interval_in_bucket(&peaks, 100), Some(100.5));
        assert_eq!(mean_interval_in_bucket(&peaks, 300), None);
    }

    #[test]
    fn lowpass_keeps_impulse_positions() {
        let sr = 44_100;
        let samples = impulse_train(22_050, sr as usize * 6);
        let settings = PeakSettings {
            lowpass: true,
            ..Default::default()
        };
        assert_eq!(peak_interval_bpm(&samples, sr, &settings), Ok(Bpm(120.0)));
    }

    #[test]
    fn fewer_than_two_peaks_is_an_error() {
        let mut samples = vec![0.0; 44_100];
        assert_eq!(estimate_tempo(&samples, 44_100), Err(TempoError::NoPeaksDetected));

        samples[100] = 1.0;
        assert_eq!(estimate_tempo(&samples, 44_100), Err(TempoError::NoPeaksDetected));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(estimate_tempo(&[], 44_100), Err(TempoError::EmptyInput));
        assert_eq!(estimate_tempo(&[1.0, 1.0], 0), Err(TempoError::InvalidSampleRate));
    }

    #[test]
    fn bpm_rejects_nonsense() {
        assert_eq!(Bpm::new(0.0), None);
        assert_eq!(Bpm::new(f32::INFINITY), None);
        assert_eq!(Bpm::new(120.0).map(Bpm::beat_secs), Some(0.5));
    }

    #[test]
    fn peaks_skip_ahead() {
        let samples = [0.0, 1.0, 1.0, 1.0, 0.0, 1.0];
        assert_eq!(detect_peaks(&samples, 0.9, 2), vec![1, 5]);
    }

    #[test]
    fn histogram_rounds_to_buckets() {
        let hist = interval_histogram(&[0, 104, 211]);
        // 104 -> 100, 211 -> 210, 107 -> 110
        assert_eq!(hist.get(&100), Some(&1));
        assert_eq!(hist.get(&110), Some(&1));
        assert_eq!(hist.get(&210), Some(&1));
    }

    #[test]
    fn tie_goes_to_smallest_interval() {
        let hist = interval_histogram(&[0, 100, 300]);
        assert_eq!(most_common_interval(&hist), Some(100));
        assert_eq!(most_common_interval(&BTreeMap::new()), None);
    }

    #[test]
    fn autocorrelation_finds_pulse_period() {
        let window = impulse_train(50, 2048);
        assert_eq!(autocorrelation_lag(&window, 1..2048), Some(50));

        let bpm = autocorrelation_bpm(&window, 1000.0, None).map(Bpm::value);
        assert_eq!(bpm, Ok(1200.0));
    }

    #[test]
    fn autocorrelation_range_limits_lags() {
        // envelope at 100 frames per second, a pulse every half second
        let envelope = impulse_train(50, 1000);
        let bpm = autocorrelation_bpm(&envelope, 100.0, Some((40.0, 240.0))).map(Bpm::value);
        assert_eq!(bpm, Ok(120.0));
    }

    #[test]
    fn degenerate_range_is_rejected() {
        let envelope = impulse_train(50, 1000);
        for range in [(0.0, 240.0), (-10.0, 240.0), (40.0, f32::NAN), (40.0, f32::INFINITY)] {
            assert_eq!(
                autocorrelation_bpm(&envelope, 100.0, Some(range)),
                Err(TempoError::InvalidRange),
                "{range:?}"
            );
        }

        // a tiny but valid lower bound just widens the search
        let bpm = autocorrelation_bpm(&envelope, 100.0, Some((1e-30, 240.0))).map(Bpm::value);
        assert_eq!(bpm, Ok(120.0));
    }

    #[test]
    fn sine_lag_matches_period() {
        let sr = 44_100.0;
        let freq = 441.0;
        let window: Vec<f32> = (0..2048)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr).sin())
            .collect();

        let lag = autocorrelation_lag(&window, 60..180).unwrap();
        assert!((lag as f32 - sr / freq).abs() <= 1.0, "lag {lag}");
    }

    #[test]
    fn no_positive_correlation_means_no_estimate() {
        let window = [1.0, 0.0, 0.0, 0.0];
        assert_eq!(
            autocorrelation_bpm(&window, 44_100.0, None),
            Err(TempoError::NoPeaksDetected)
        );
    }
}
