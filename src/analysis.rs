use crate::{
    config::{Settings, TEMPO_RANGE},
    log::{Log, log},
    onset::{self, PickSettings},
    pitch,
    tempo::{self, Bpm, PeakSettings},
};
use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use std::sync::Arc;

/// Messages from the analysis worker to the game loop.
#[derive(Clone, Debug, PartialEq)]
pub enum AnalysisEvent {
    OnsetDetected { time: f32 },
    /// Pitch of the onset at `time`. Always follows its `OnsetDetected`.
    PitchDetected { time: f32, hz: f32 },
    TempoDetected { bpm: Bpm },
    Finished,
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct AnalysisParams {
    pub peak: PeakSettings,
    pub pick: PickSettings,
    pub window_size: usize,
    pub fallback_threshold: f32,
}

impl From<&Settings> for AnalysisParams {
    fn from(s: &Settings) -> Self {
        Self {
            peak: PeakSettings {
                threshold: s.peak_threshold,
                skip: s.peak_skip,
                lowpass: s.lowpass,
            },
            pick: PickSettings {
                min_gap: s.min_onset_gap,
                ..Default::default()
            },
            window_size: s.window_size,
            fallback_threshold: s.fallback_threshold,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalysisReport {
    pub onsets: Vec<f32>,
    /// Aligned with `onsets`.
    pub pitches: Vec<Option<f32>>,
    pub bpm: Option<Bpm>,
    /// Produced by the in-thread fallback rather than the worker.
    pub degraded: bool,
}

enum Progress {
    Running,
    Finished,
    Failed(String),
}

impl AnalysisReport {
    fn record(&mut self, event: AnalysisEvent) -> Progress {
        match event {
            AnalysisEvent::OnsetDetected { time } => {
                self.onsets.push(time);
                self.pitches.push(None);
            }
            AnalysisEvent::PitchDetected { time, hz } => match self.onsets.last() {
                Some(&last) if last == time => {
                    if let Some(slot) = self.pitches.last_mut() {
                        *slot = Some(hz);
                    }
                }
                _ => log(Log::Debug, format!("pitch at {time:.3}s has no onset, dropped")),
            },
            AnalysisEvent::TempoDetected { bpm } => self.bpm = Some(bpm),
            AnalysisEvent::Finished => return Progress::Finished,
            AnalysisEvent::Failed(msg) => return Progress::Failed(msg),
        }

        Progress::Running
    }
}

/// Spawns the worker thread and returns the receiving end of its channel.
pub fn spawn_worker(
    samples: Arc<[f32]>,
    sample_rate: u32,
    params: AnalysisParams,
) -> std::io::Result<Receiver<AnalysisEvent>> {
    let (tx, rx) = unbounded();

    std::thread::Builder::new()
        .name("analysis".into())
        .spawn(move || run(&samples, sample_rate, &params, &tx))?;

    Ok(rx)
}

fn run(samples: &[f32], sample_rate: u32, params: &AnalysisParams, tx: &Sender<AnalysisEvent>) {
    // the receiver going away just means nobody is interested any more
    let send = |event| tx.send(event).is_ok();

    if samples.is_empty() || sample_rate == 0 {
        send(AnalysisEvent::Failed("nothing to analyze".into()));
        return;
    }

    let (onsets, envelope) = onset::detect_onsets(samples, sample_rate, &params.pick);
    log(Log::Debug, format!("worker: {} onsets", onsets.len()));

    for &time in &onsets {
        if !send(AnalysisEvent::OnsetDetected { time }) {
            return;
        }

        let start = (time * sample_rate as f32) as usize;
        let Some(window) = samples.get(start..start + params.window_size) else {
            continue;
        };

        if let Some(hz) = pitch::detect_pitch(window, sample_rate) {
            if !send(AnalysisEvent::PitchDetected { time, hz }) {
                return;
            }
        }
    }

    let bpm = match tempo::peak_interval_bpm(samples, sample_rate, &params.peak) {
        Ok(bpm) => Some(bpm),
        Err(e) => {
            log(Log::Debug, format!("worker: peak tempo: {e}, trying the onset envelope"));
            let mean = envelope.flux.iter().sum::<f32>() / envelope.flux.len().max(1) as f32;
            let centered: Vec<f32> = envelope.flux.iter().map(|v| v - mean).collect();

            tempo::autocorrelation_bpm(&centered, envelope.frame_rate, Some(TEMPO_RANGE))
                .inspect_err(|e| log(Log::Debug, format!("worker: envelope tempo: {e}")))
                .ok()
        }
    };

    if let Some(bpm) = bpm {
        send(AnalysisEvent::TempoDetected { bpm });
    }

    send(AnalysisEvent::Finished);
}

/// Drains worker events into a report.
pub struct Listener {
    rx: Receiver<AnalysisEvent>,
    report: AnalysisReport,
}

impl Listener {
    pub fn new(rx: Receiver<AnalysisEvent>) -> Self {
        Self {
            rx,
            report: AnalysisReport::default(),
        }
    }

    /// Non-blocking. `None` while the worker is still going.
    pub fn poll(&mut self) -> Option<Result<AnalysisReport, String>> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if let Some(done) = self.handle(event) {
                        return Some(done);
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    return Some(Err("analysis worker disconnected".into()));
                }
            }
        }
    }

    /// Blocks until the worker is done.
    pub fn collect(mut self) -> Result<AnalysisReport, String> {
        loop {
            let event = self.rx.recv().map_err(|_| "analysis worker disconnected".to_string())?;
            if let Some(done) = self.handle(event) {
                return done;
            }
        }
    }

    fn handle(&mut self, event: AnalysisEvent) -> Option<Result<AnalysisReport, String>> {
        match self.report.record(event) {
            Progress::Running => None,
            Progress::Finished => Some(Ok(std::mem::take(&mut self.report))),
            Progress::Failed(msg) => Some(Err(msg)),
        }
    }
}

/// Simplified analysis on the calling thread: amplitude threshold onsets, no
/// pitch, peak-interval tempo.
pub fn fallback(samples: &[f32], sample_rate: u32, params: &AnalysisParams) -> AnalysisReport {
    let onsets = onset::amplitude_onsets(
        samples,
        sample_rate,
        params.fallback_threshold,
        params.peak.skip,
    );
    let bpm = match tempo::peak_interval_bpm(samples, sample_rate, &params.peak) {
        Ok(bpm) => Some(bpm),
        Err(e) => {
            log(Log::Warning, format!("tempo unknown ({e})"));
            None
        }
    };

    AnalysisReport {
        pitches: vec![None; onsets.len()],
        onsets,
        bpm,
        degraded: true,
    }
}

enum State {
    Running(Listener),
    Done(Option<AnalysisReport>),
}

/// Runs the analysis for one track, on the worker when possible.
pub struct Analyzer {
    samples: Arc<[f32]>,
    sample_rate: u32,
    params: AnalysisParams,
    state: State,
}

impl Analyzer {
    pub fn start(samples: Arc<[f32]>, sample_rate: u32, params: AnalysisParams) -> Self {
        let state = match spawn_worker(Arc::clone(&samples), sample_rate, params.clone()) {
            Ok(rx) => State::Running(Listener::new(rx)),
            Err(e) => {
                log(
                    Log::Warning,
                    format!("analysis worker unavailable ({e}), analyzing in-thread"),
                );
                State::Done(Some(fallback(&samples, sample_rate, &params)))
            }
        };

        Self {
            samples,
            sample_rate,
            params,
            state,
        }
    }

    /// Returns the report once, as soon as it is ready.
    pub fn poll(&mut self) -> Option<AnalysisReport> {
        match &mut self.state {
            State::Done(report) => report.take(),
            State::Running(listener) => {
                let outcome = listener.poll()?;
                self.state = State::Done(None);
                Some(self.settle(outcome))
            }
        }
    }

    pub fn wait(self) -> AnalysisReport {
        match self.state {
            State::Done(Some(report)) => report,
            State::Done(None) => AnalysisReport::default(),
            State::Running(listener) => {
                let outcome = listener.collect();
                Self::settle_with(outcome, &self.samples, self.sample_rate, &self.params)
            }
        }
    }

    fn settle(&self, outcome: Result<AnalysisReport, String>) -> AnalysisReport {
        Self::settle_with(outcome, &self.samples, self.sample_rate, &self.params)
    }

    fn settle_with(
        outcome: Result<AnalysisReport, String>,
        samples: &[f32],
        sample_rate: u32,
        params: &AnalysisParams,
    ) -> AnalysisReport {
        match outcome {
            Ok(report) => report,
            Err(e) => {
                log(Log::Warning, format!("analysis failed ({e}), analyzing in-thread"));
                fallback(samples, sample_rate, params)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AnalysisParams {
        AnalysisParams::from(&Settings::default())
    }

    /// 120 BPM clicks with a 220 Hz tone under each one.
    fn song(sample_rate: u32, secs: f32) -> Vec<f32> {
        let len = (sample_rate as f32 * secs) as usize;
        let beat = sample_rate as usize / 2;
        let mut out = vec![0.0; len];

        for start in (0..len).step_by(beat) {
            out[start] = 1.0;
            for i in 1..(sample_rate as usize / 8).min(len - start) {
                let t = i as f32 / sample_rate as f32;
                let tone = (2.0 * std::f32::consts::PI * 220.0 * t).sin();
                out[start + i] = 0.6 * (-t * 10.0).exp() * tone;
            }
        }
        out
    }

    #[test]
    fn listener_pairs_pitch_with_onset() {
        let (tx, rx) = unbounded();
        tx.send(AnalysisEvent::OnsetDetected { time: 0.5 }).unwrap();
        tx.send(AnalysisEvent::PitchDetected { time: 0.5, hz: 220.0 }).unwrap();
        tx.send(AnalysisEvent::OnsetDetected { time: 1.0 }).unwrap();
        tx.send(AnalysisEvent::PitchDetected { time: 0.7, hz: 100.0 }).unwrap();
        tx.send(AnalysisEvent::TempoDetected { bpm: Bpm::new(100.0).unwrap() }).unwrap();
        tx.send(AnalysisEvent::TempoDetected { bpm: Bpm::new(120.0).unwrap() }).unwrap();
        tx.send(AnalysisEvent::Finished).unwrap();

        let report = Listener::new(rx).collect().unwrap();
        assert_eq!(report.onsets, vec![0.5, 1.0]);
        assert_eq!(report.pitches, vec![Some(220.0), None]);
        assert_eq!(report.bpm, Bpm::new(120.0));
    }

    #[test]
    fn poll_is_pending_until_finished() {
        let (tx, rx) = unbounded();
        let mut listener = Listener::new(rx);

        tx.send(AnalysisEvent::OnsetDetected { time: 0.1 }).unwrap();
        assert!(listener.poll().is_none());

        tx.send(AnalysisEvent::Finished).unwrap();
        assert_eq!(listener.poll().unwrap().unwrap().onsets, vec![0.1]);
    }

    #[test]
    fn dropped_sender_is_an_error() {
        let (tx, rx) = unbounded::<AnalysisEvent>();
        drop(tx);
        assert!(Listener::new(rx).collect().is_err());
    }

    #[test]
    fn failure_is_reported() {
        let (tx, rx) = unbounded();
        tx.send(AnalysisEvent::Failed("boom".into())).unwrap();
        assert_eq!(Listener::new(rx).collect(), Err("boom".to_string()));
    }

    #[test]
    fn worker_analyzes_a_song() {
        let sr = 22_050;
        let samples: Arc<[f32]> = song(sr, 6.0).into();
        let report = Analyzer::start(samples, sr, params()).wait();

        assert!(!report.degraded);
        assert_eq!(report.onsets.len(), report.pitches.len());
        assert!(report.onsets.len() >= 10, "{:?}", report.onsets);
        assert_eq!(report.bpm.map(Bpm::value), Some(120.0));

        let pitched: Vec<f32> = report.pitches.iter().flatten().copied().collect();
        assert!(!pitched.is_empty());
        assert!(pitched.iter().all(|hz| (hz - 220.0).abs() < 10.0), "{pitched:?}");
    }

    #[test]
    fn empty_input_falls_back() {
        let report = Analyzer::start(Arc::from(Vec::new()), 44_100, params()).wait();
        assert!(report.degraded);
        assert!(report.onsets.is_empty());
        assert_eq!(report.bpm, None);
    }

    #[test]
    fn fallback_uses_amplitude_peaks() {
        let sr = 22_050;
        let report = fallback(&song(sr, 3.0), sr, &params());

        assert!(report.degraded);
        assert_eq!(report.onsets, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
        assert!(report.pitches.iter().all(Option::is_none));
        assert_eq!(report.bpm.map(Bpm::value), Some(120.0));
    }
}
