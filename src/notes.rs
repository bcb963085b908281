use crate::{config::PITCH_RANGE, tempo::Bpm};
use rand::Rng;

/// Sustain used for long notes when the tempo is unknown.
const DEFAULT_SUSTAIN: f32 = 0.5;

/// One of the four lanes. Always in `0..Lane::COUNT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lane(u8);

impl Lane {
    pub const COUNT: usize = 4;

    pub fn new(index: usize) -> Option<Self> {
        (index < Self::COUNT).then_some(Self(index as u8))
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = Lane> {
        (0..Self::COUNT as u8).map(Lane)
    }

    pub fn random(rng: &mut impl Rng) -> Self {
        Self(rng.random_range(0..Self::COUNT as u8))
    }

    /// Splits the pitch range into equal bins, one per lane. A bin's lower
    /// edge belongs to it, so 80 Hz is lane 0, 240 Hz lane 2 and 400 Hz lane 3.
    pub fn from_pitch(hz: f32) -> Self {
        let (lo, hi) = PITCH_RANGE;
        let normalized = (hz.clamp(lo, hi) - lo) / (hi - lo);
        let bin = (normalized * Self::COUNT as f32).floor() as usize;
        Self(bin.min(Self::COUNT - 1) as u8)
    }
}

/// Lane from pitch when there is one, otherwise uniformly random.
pub fn lane_for_pitch(pitch: Option<f32>, rng: &mut impl Rng) -> Lane {
    match pitch.filter(|hz| hz.is_finite() && *hz > 0.0) {
        Some(hz) => Lane::from_pitch(hz),
        None => Lane::random(rng),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteState {
    Pending,
    Hit,
    Missed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Note {
    pub lane: Lane,
    /// Seconds into the track.
    pub time: f32,
    /// Seconds, 0 for tap notes.
    pub duration: f32,
    pub state: NoteState,
}

impl Note {
    pub const fn tap(lane: Lane, time: f32) -> Self {
        Self {
            lane,
            time,
            duration: 0.0,
            state: NoteState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == NoteState::Pending
    }

    pub fn is_hit(&self) -> bool {
        self.state == NoteState::Hit
    }

    pub fn is_long(&self) -> bool {
        self.duration > 0.0
    }

    /// Screen y of the note head. Equals `judgment_y` when `now == time` and
    /// grows downwards as the note falls.
    pub fn vertical_position(&self, now: f32, judgment_y: f32, scroll_speed: f32) -> f32 {
        judgment_y - (self.time - now) * scroll_speed
    }

    /// Screen y of the end of the sustain.
    pub fn tail_position(&self, now: f32, judgment_y: f32, scroll_speed: f32) -> f32 {
        judgment_y - (self.time + self.duration - now) * scroll_speed
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteSettings {
    /// Probability that a note becomes a long note.
    pub long_note_chance: f64,
    /// Onsets closer than this (seconds) are merged into one note.
    pub min_gap: f32,
}

impl Default for NoteSettings {
    fn default() -> Self {
        Self {
            long_note_chance: 0.3,
            min_gap: 0.1,
        }
    }
}

/// Onset times on a fixed grid, one per beat, starting at `offset`.
pub fn beat_grid(bpm: Bpm, duration: f32, offset: f32) -> Vec<f32> {
    let step = bpm.beat_secs();
    if !step.is_finite() || step <= 0.0 {
        return Vec::new();
    }

    (0..)
        .map(|n| offset + n as f32 * step)
        .take_while(|&t| t < duration)
        .collect()
}

/// Turns onsets (with per-onset pitch, aligned by index) into notes.
///
/// `onsets` must be ascending. Long-note sustains last one beat but are cut
/// short so they end before the next note in the same lane.
pub fn generate(
    onsets: &[f32],
    pitches: &[Option<f32>],
    bpm: Option<Bpm>,
    settings: &NoteSettings,
    rng: &mut impl Rng,
) -> Vec<Note> {
    let sustain = bpm.map_or(DEFAULT_SUSTAIN, Bpm::beat_secs);
    let mut notes: Vec<Note> = Vec::with_capacity(onsets.len());

    for (i, &time) in onsets.iter().enumerate() {
        if notes.last().is_some_and(|last| time - last.time < settings.min_gap) {
            continue;
        }

        let pitch = pitches.get(i).copied().flatten();
        let mut note = Note::tap(lane_for_pitch(pitch, rng), time);

        if settings.long_note_chance > 0.0 && rng.random_bool(settings.long_note_chance) {
            note.duration = sustain;
        }

        notes.push(note);
    }

    for i in 0..notes.len() {
        if !notes[i].is_long() {
            continue;
        }

        let lane = notes[i].lane;
        let end = notes[i].time + notes[i].duration;
        if let Some(next) = notes[i + 1..].iter().find(|n| n.lane == lane) {
            let room = next.time - notes[i].time - settings.min_gap;
            if next.time - settings.min_gap < end {
                notes[i].duration = if room >= settings.min_gap { room } else { 0.0 };
            }
        }
    }

    notes
}

/// The generated note list for one track. Restarting clones it instead of
/// generating a new one.
#[derive(Clone, Debug, PartialEq)]
pub struct Chart {
    pub notes: Vec<Note>,
    pub bpm: Option<Bpm>,
}

impl Chart {
    /// Builds a chart from analysis results, falling back to a beat grid when
    /// no onsets were found.
    pub fn build(
        onsets: &[f32],
        pitches: &[Option<f32>],
        bpm: Option<Bpm>,
        duration: f32,
        settings: &NoteSettings,
        rng: &mut impl Rng,
    ) -> Self {
        let notes = match (onsets.is_empty(), bpm) {
            (true, Some(bpm)) => {
                generate(&beat_grid(bpm, duration, 0.0), &[], Some(bpm), settings, rng)
            }
            _ => generate(onsets, pitches, bpm, settings, rng),
        };

        Self { notes, bpm }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn bpm(v: f32) -> Bpm {
        Bpm::new(v).unwrap()
    }

    #[test]
    fn pitch_boundaries() {
        assert_eq!(Lane::from_pitch(80.0).index(), 0);
        assert_eq!(Lane::from_pitch(400.0).index(), 3);
        assert_eq!(Lane::from_pitch(240.0).index(), 2);
        assert_eq!(Lane::from_pitch(159.9).index(), 0);
        assert_eq!(Lane::from_pitch(160.0).index(), 1);
    }

    #[test]
    fn pitch_outside_range_is_clamped() {
        assert_eq!(Lane::from_pitch(20.0).index(), 0);
        assert_eq!(Lane::from_pitch(5000.0).index(), 3);
    }

    #[test]
    fn unknown_pitch_is_random_but_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = [false; Lane::COUNT];
        for _ in 0..200 {
            let lane = lane_for_pitch(None, &mut rng);
            seen[lane.index()] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert!(Lane::new(4).is_none());
    }

    #[test]
    fn nan_pitch_counts_as_unknown() {
        let mut a = StdRng::seed_from_u64(3);
        let mut b = StdRng::seed_from_u64(3);
        assert_eq!(lane_for_pitch(Some(f32::NAN), &mut a), lane_for_pitch(None, &mut b));
    }

    #[test]
    fn one_note_per_onset() {
        let mut rng = StdRng::seed_from_u64(1);
        let settings = NoteSettings {
            long_note_chance: 0.0,
            ..Default::default()
        };
        let onsets = [0.5, 1.0, 1.5];
        let pitches = [Some(90.0), Some(390.0), None];
        let notes = generate(&onsets, &pitches, None, &settings, &mut rng);

        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].lane.index(), 0);
        assert_eq!(notes[1].lane.index(), 3);
        assert!(notes.iter().all(|n| n.duration == 0.0 && n.is_pending()));
        assert_eq!(notes.iter().map(|n| n.time).collect::<Vec<_>>(), onsets);
    }

    #[test]
    fn close_onsets_merge() {
        let mut rng = StdRng::seed_from_u64(1);
        let notes = generate(&[1.0, 1.05, 1.3], &[], None, &NoteSettings::default(), &mut rng);
        assert_eq!(notes.iter().map(|n| n.time).collect::<Vec<_>>(), vec![1.0, 1.3]);
    }

    #[test]
    fn sustains_never_overlap_in_a_lane() {
        let mut rng = StdRng::seed_from_u64(99);
        let settings = NoteSettings {
            long_note_chance: 1.0,
            min_gap: 0.1,
        };
        let onsets: Vec<f32> = (0..64).map(|i| i as f32 * 0.25).collect();
        let notes = generate(&onsets, &[], Some(bpm(60.0)), &settings, &mut rng);

        for (i, note) in notes.iter().enumerate() {
            if let Some(next) = notes[i + 1..].iter().find(|n| n.lane == note.lane) {
                assert!(note.time + note.duration <= next.time, "{note:?} runs into {next:?}");
            }
        }
        assert!(notes.iter().any(Note::is_long));
    }

    #[test]
    fn same_seed_same_notes() {
        let onsets: Vec<f32> = (0..32).map(|i| i as f32 * 0.3).collect();
        let make = || {
            let mut rng = StdRng::seed_from_u64(1234);
            generate(&onsets, &[], None, &NoteSettings::default(), &mut rng)
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn grid_follows_tempo() {
        let grid = beat_grid(bpm(120.0), 2.0, 0.25);
        assert_eq!(grid, vec![0.25, 0.75, 1.25, 1.75]);
    }

    #[test]
    fn chart_falls_back_to_grid() {
        let mut rng = StdRng::seed_from_u64(5);
        let settings = NoteSettings::default();
        let chart = Chart::build(&[], &[], Some(bpm(120.0)), 3.0, &settings, &mut rng);
        assert_eq!(chart.len(), 6);

        let empty = Chart::build(&[], &[], None, 3.0, &settings, &mut rng);
        assert!(empty.is_empty());
    }

    #[test]
    fn position_reaches_line_at_note_time() {
        let note = Note::tap(Lane::from_pitch(100.0), 2.0);
        assert_eq!(note.vertical_position(2.0, 300.0, 200.0), 300.0);
        assert_eq!(note.vertical_position(1.0, 300.0, 200.0), 100.0);
    }
}
