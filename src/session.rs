use crate::{
    config::{FEEDBACK_SECS, Settings},
    judge::{Judge, Judgement, PressOutcome, Scoreboard},
    log::{Log, log},
    notes::{Chart, Lane, Note},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Playing,
    GameOver,
    Cleared,
}

/// The last judgement, shown until song time `until`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Feedback {
    judgement: Judgement,
    until: f32,
}

/// One play-through of a chart.
pub struct Session {
    chart: Chart,
    notes: Vec<Note>,
    judge: Judge,
    phase: Phase,
    feedback: Option<Feedback>,
    scroll_speed: f32,
    paused: bool,
}

impl Session {
    pub fn new(chart: Chart, settings: &Settings) -> Self {
        Self {
            notes: chart.notes.clone(),
            chart,
            judge: Judge::new(settings.hit_window, settings.scroll_speed, settings.miss_limit),
            phase: Phase::Playing,
            feedback: None,
            scroll_speed: settings.scroll_speed,
            paused: false,
        }
    }

    /// Advances to song time `now`: sweeps missed notes and settles the phase.
    pub fn update(&mut self, now: f32) -> Phase {
        if self.phase != Phase::Playing || self.paused {
            return self.phase;
        }

        if self.judge.sweep(&mut self.notes, now) > 0 {
            self.show(Judgement::Miss, now);
        }

        if self.judge.is_failed() {
            let board = self.judge.board();
            log(
                Log::Info,
                format!("game over at {now:.1}s, score {} ({} misses)", board.score, board.misses),
            );
            self.phase = Phase::GameOver;
        } else if !self.notes.is_empty() && !self.notes.iter().any(Note::is_pending) {
            log(Log::Info, format!("cleared, score {}", self.judge.board().score));
            self.phase = Phase::Cleared;
        }

        self.phase
    }

    /// Judges a key press. Ignored unless the session is still playing.
    pub fn press(&mut self, lane: Lane, now: f32) -> Option<PressOutcome> {
        if self.phase != Phase::Playing || self.paused {
            return None;
        }

        let outcome = self.judge.press(&mut self.notes, lane, now);
        if let PressOutcome::Hit { judgement, .. } = outcome {
            self.show(judgement, now);
        }

        Some(outcome)
    }

    /// Back to the first note of the same chart.
    pub fn restart(&mut self) {
        self.notes = self.chart.notes.clone();
        self.judge.reset();
        self.phase = Phase::Playing;
        self.feedback = None;
        self.paused = false;
    }

    /// Pausing only applies while playing. Returns whether the session is now paused.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        self.paused = paused && self.phase == Phase::Playing;
        self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn board(&self) -> &Scoreboard {
        self.judge.board()
    }

    pub fn scroll_speed(&self) -> f32 {
        self.scroll_speed
    }

    /// Text of the last judgement while it is still fresh.
    pub fn feedback(&self, now: f32) -> Option<&'static str> {
        self.feedback
            .filter(|f| now < f.until)
            .map(|f| f.judgement.label())
    }

    fn show(&mut self, judgement: Judgement, now: f32) {
        self.feedback = Some(Feedback {
            judgement,
            until: now + FEEDBACK_SECS,
        });
    }
}
