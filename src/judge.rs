use crate::{
    config::{BASE_SCORE, MAX_MULTIPLIER, STREAK_PER_MULTIPLIER},
    notes::{Lane, Note, NoteState},
};

/// Share of the hit window that counts as a perfect hit.
const PERFECT_SHARE: f32 = 0.4;

/// How far from the judgment line a note may be and still be hit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HitWindow {
    Seconds(f32),
    /// Distance on screen, converted through the scroll speed.
    Pixels(f32),
}

impl HitWindow {
    pub fn seconds(self, scroll_speed: f32) -> f32 {
        match self {
            HitWindow::Seconds(s) => s,
            HitWindow::Pixels(px) if scroll_speed > 0.0 => px / scroll_speed,
            HitWindow::Pixels(_) => 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Judgement {
    Perfect,
    Good,
    Miss,
}

impl Judgement {
    pub fn label(self) -> &'static str {
        match self {
            Judgement::Perfect => "Perfect!",
            Judgement::Good => "Good",
            Judgement::Miss => "Miss",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PressOutcome {
    Hit {
        index: usize,
        judgement: Judgement,
        /// Positive when the press came after the note time.
        offset: f32,
        gained: u32,
    },
    /// Nothing in reach; the streak is gone.
    Stray,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scoreboard {
    pub score: u32,
    pub streak: u32,
    pub best_streak: u32,
    pub multiplier: u32,
    pub hits: u32,
    pub misses: u32,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self {
            multiplier: 1,
            ..Default::default()
        }
    }

    fn hit(&mut self) -> u32 {
        self.hits += 1;
        self.streak += 1;
        self.best_streak = self.best_streak.max(self.streak);
        self.multiplier = (1 + self.streak / STREAK_PER_MULTIPLIER).min(MAX_MULTIPLIER);

        let gained = BASE_SCORE * self.multiplier;
        self.score += gained;
        gained
    }

    fn break_streak(&mut self) {
        self.streak = 0;
        self.multiplier = 1;
    }
}

/// Hit judgment and scoring for one play-through.
pub struct Judge {
    window: f32,
    miss_limit: u32,
    board: Scoreboard,
}

impl Judge {
    pub fn new(window: HitWindow, scroll_speed: f32, miss_limit: u32) -> Self {
        Self {
            window: window.seconds(scroll_speed),
            miss_limit,
            board: Scoreboard::new(),
        }
    }

    pub fn board(&self) -> &Scoreboard {
        &self.board
    }

    pub fn window(&self) -> f32 {
        self.window
    }

    /// Hits the earliest pending note in `lane` that is within the window.
    /// `notes` must be sorted by time.
    pub fn press(&mut self, notes: &mut [Note], lane: Lane, now: f32) -> PressOutcome {
        let found = notes
            .iter()
            .position(|n| n.lane == lane && n.is_pending() && (now - n.time).abs() <= self.window);

        let Some(index) = found else {
            self.board.break_streak();
            return PressOutcome::Stray;
        };

        let offset = now - notes[index].time;
        notes[index].state = NoteState::Hit;
        let gained = self.board.hit();
        let judgement = if offset.abs() <= self.window * PERFECT_SHARE {
            Judgement::Perfect
        } else {
            Judgement::Good
        };

        PressOutcome::Hit {
            index,
            judgement,
            offset,
            gained,
        }
    }

    /// Marks pending notes that went past the line by more than the window as
    /// missed. Returns how many were marked.
    pub fn sweep(&mut self, notes: &mut [Note], now: f32) -> u32 {
        let mut missed = 0;

        for note in notes.iter_mut().filter(|n| n.is_pending()) {
            if now - note.time > self.window {
                note.state = NoteState::Missed;
                missed += 1;
            }
        }

        if missed > 0 {
            self.board.misses += missed;
            self.board.break_streak();
        }

        missed
    }

    pub fn is_failed(&self) -> bool {
        self.board.misses > self.miss_limit
    }

    pub fn reset(&mut self) {
        self.board = Scoreboard::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane(i: usize) -> Lane {
        Lane::new(i).unwrap()
    }

    fn judge() -> Judge {
        Judge::new(HitWindow::Seconds(0.15), 300.0, 5)
    }

    #[test]
    fn hit_on_the_line() {
        let mut judge = judge();
        let mut notes = vec![Note::tap(lane(1), 2.0)];

        let outcome = judge.press(&mut notes, lane(1), 2.0);
        assert_eq!(
            outcome,
            PressOutcome::Hit {
                index: 0,
                judgement: Judgement::Perfect,
                offset: 0.0,
                gained: 10,
            }
        );
        assert!(notes[0].is_hit());
        assert_eq!(judge.board().score, 10);
        assert_eq!(judge.board().streak, 1);
    }

    #[test]
    fn stray_press_resets_streak_but_not_misses() {
        let mut judge = judge();
        let mut notes = vec![Note::tap(lane(0), 1.0), Note::tap(lane(0), 2.0)];

        judge.press(&mut notes, lane(0), 1.0);
        assert_eq!(judge.board().streak, 1);

        assert_eq!(judge.press(&mut notes, lane(2), 1.5), PressOutcome::Stray);
        assert_eq!(judge.board().streak, 0);
        assert_eq!(judge.board().multiplier, 1);
        assert_eq!(judge.board().misses, 0);
        assert!(notes[1].is_pending());
    }

    #[test]
    fn earliest_pending_note_wins() {
        let mut judge = judge();
        let mut notes = vec![Note::tap(lane(3), 1.0), Note::tap(lane(3), 1.1)];

        judge.press(&mut notes, lane(3), 1.08);
        assert!(notes[0].is_hit());
        assert!(notes[1].is_pending());

        judge.press(&mut notes, lane(3), 1.09);
        assert!(notes[1].is_hit());
    }

    #[test]
    fn outside_window_is_stray() {
        let mut judge = judge();
        let mut notes = vec![Note::tap(lane(0), 1.0)];
        assert_eq!(judge.press(&mut notes, lane(0), 1.2), PressOutcome::Stray);
        assert!(matches!(
            judge.press(&mut notes, lane(0), 1.1),
            PressOutcome::Hit { judgement: Judgement::Good, .. }
        ));
    }

    #[test]
    fn multiplier_grows_every_ten() {
        let mut judge = judge();
        let mut notes: Vec<Note> = (0..45).map(|i| Note::tap(lane(0), i as f32)).collect();

        for i in 0..10 {
            judge.press(&mut notes, lane(0), i as f32);
        }
        assert_eq!(judge.board().multiplier, 2);
        assert_eq!(judge.board().score, 9 * 10 + 20);

        for i in 10..45 {
            judge.press(&mut notes, lane(0), i as f32);
        }
        assert_eq!(judge.board().multiplier, 5);
        assert_eq!(judge.board().best_streak, 45);
    }

    #[test]
    fn any_miss_drops_a_built_multiplier() {
        let mut judge = judge();
        let mut notes: Vec<Note> = (0..30).map(|i| Note::tap(lane(0), i as f32)).collect();

        for i in 0..12 {
            judge.press(&mut notes, lane(0), i as f32);
        }
        assert_eq!(judge.board().multiplier, 2);

        // stray press
        assert_eq!(judge.press(&mut notes, lane(1), 12.0), PressOutcome::Stray);
        assert_eq!(judge.board().streak, 0);
        assert_eq!(judge.board().multiplier, 1);
        assert_eq!(judge.board().misses, 0);

        for i in 12..24 {
            judge.press(&mut notes, lane(0), i as f32);
        }
        assert_eq!(judge.board().multiplier, 2);

        // note 24 goes by unhit
        assert_eq!(judge.sweep(&mut notes, 24.2), 1);
        assert_eq!(judge.board().streak, 0);
        assert_eq!(judge.board().multiplier, 1);
        assert_eq!(judge.board().misses, 1);
        assert_eq!(judge.board().best_streak, 12);
        assert_eq!(judge.board().hits, 24);
    }

    #[test]
    fn passed_notes_become_misses() {
        let mut judge = judge();
        let mut notes = vec![Note::tap(lane(0), 1.0), Note::tap(lane(1), 3.0)];
        judge.press(&mut notes, lane(0), 1.0);

        assert_eq!(judge.sweep(&mut notes, 3.1), 0);
        assert_eq!(judge.sweep(&mut notes, 3.2), 1);
        assert_eq!(notes[1].state, NoteState::Missed);
        assert_eq!(judge.board().streak, 0);
        assert_eq!(judge.board().misses, 1);

        // hit notes are never swept
        assert!(notes[0].is_hit());
    }

    #[test]
    fn sixth_miss_fails() {
        let mut judge = judge();
        let mut notes: Vec<Note> = (0..6).map(|i| Note::tap(lane(0), i as f32)).collect();

        judge.sweep(&mut notes, 4.5);
        assert_eq!(judge.board().misses, 5);
        assert!(!judge.is_failed());

        judge.sweep(&mut notes, 5.5);
        assert!(judge.is_failed());

        judge.reset();
        assert_eq!(*judge.board(), Scoreboard::new());
    }

    #[test]
    fn pixel_window_uses_scroll_speed() {
        let judge = Judge::new(HitWindow::Pixels(160.0), 320.0, 5);
        assert_eq!(judge.window(), 0.5);
        assert_eq!(HitWindow::Pixels(160.0).seconds(0.0), 0.0);
    }
}
