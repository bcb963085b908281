use crate::tempo::correlation_at;

/// Default search range in Hz.
pub const SEARCH_RANGE: (f32, f32) = (60.0, 1000.0);

/// Lags within this fraction of the strongest peak count as candidates; the
/// shortest candidate wins, which keeps sub-octave lags from taking over.
const OCTAVE_TOLERANCE: f32 = 0.9;

/// Fundamental period of `window` in (fractional) samples.
///
/// Correlation is normalized per lag by the number of overlapping terms and the
/// search starts only after the correlation has first gone negative, so the
/// lobe around lag 0 is never picked.
pub fn detect_pitch_lag(
    window: &[f32],
    sample_rate: u32,
    (min_hz, max_hz): (f32, f32),
) -> Option<f32> {
    let len = window.len();
    if len < 4 || sample_rate == 0 {
        return None;
    }

    let sr = sample_rate as f32;
    let lag_min = ((sr / max_hz).floor() as usize).max(1);
    let lag_max = ((sr / min_hz).ceil() as usize).min(len / 2);
    if lag_min >= lag_max {
        return None;
    }

    let energy = correlation_at(window, 0) / len as f32;
    if energy <= f32::EPSILON {
        return None;
    }

    let r = |lag: usize| correlation_at(window, lag) / (len - lag) as f32;
    let dip = (1..=lag_max).find(|&lag| r(lag) < 0.0)?;
    let start = dip.max(lag_min);

    // one slot of padding on each side for the local-max test and interpolation
    let first = start.saturating_sub(1).max(1);
    let last = (lag_max + 1).min(len - 1);
    let values: Vec<f32> = (first..=last).map(r).collect();
    let at = |lag: usize| values[lag - first];

    let best = (start..=lag_max).map(at).fold(f32::MIN, f32::max);
    if best <= 0.0 {
        return None;
    }

    let lag = (start..=lag_max).find(|&lag| {
        let v = at(lag);
        v >= best * OCTAVE_TOLERANCE
            && (lag == first || v >= at(lag - 1))
            && (lag == last || v >= at(lag + 1))
    })?;

    if lag <= first || lag >= last {
        return Some(lag as f32);
    }

    let (a, b, c) = (at(lag - 1), at(lag), at(lag + 1));
    let denom = a - 2.0 * b + c;
    let offset = if denom.abs() > f32::EPSILON {
        (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    Some(lag as f32 + offset)
}

pub fn detect_pitch(window: &[f32], sample_rate: u32) -> Option<f32> {
    detect_pitch_lag(window, sample_rate, SEARCH_RANGE).map(|lag| sample_rate as f32 / lag)
}
