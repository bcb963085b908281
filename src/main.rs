use beatlane::{
    analysis::{AnalysisParams, AnalysisReport, Analyzer},
    config::*,
    decode::{self, Track},
    engine::Engine,
    log::{self, Log, log},
    notes::{Chart, Lane, NoteSettings, NoteState},
    playback::SongClock,
    session::{Phase, Session},
    smooth::TimedSmooth,
    spectrum::{BARS, FFT_SIZE, Spectrum, bar_color},
    strerr::Strerr,
    util,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use sdl2::{
    EventPump,
    event::Event,
    keyboard::Keycode,
    pixels::Color,
    rect::Rect,
    ttf::Font,
};
use std::{sync::Arc, time::Instant};

const WHITE: Color = Color::RGB(0xFF, 0xFF, 0xFF);
const GREY: Color = Color::RGB(0x80, 0x80, 0x80);
const PROGRESS_SMOOTHING: f32 = 0.3;
const LANE_KEYS: [Keycode; Lane::COUNT] = [Keycode::A, Keycode::S, Keycode::D, Keycode::F];

fn main() {
    log::init_from_env();

    if let Err(e) = practically_main() {
        log(Log::Error, e);
    }
}

fn lane_for_key(key: Keycode) -> Option<Lane> {
    LANE_KEYS
        .iter()
        .position(|&k| k == key)
        .and_then(Lane::new)
}

/// What to do once a track stops.
enum Step {
    Next,
    Quit,
}

fn practically_main() -> Result<(), String> {
    let settings = Settings::from_env();

    let files = {
        let path = std::env::args().nth(1).ok_or(
            "please provide an audio file or a folder, which will be scanned recursively",
        )?;

        log(Log::Info, "collecting audio files... this might take a while");
        util::queue(path)?
    };

    log(Log::Info, format!("{} audio file(s) queued", files.len()));

    let mut engine = Engine::new(TITLE, (WIDTH, HEIGHT))?;

    let ttf_context = sdl2::ttf::init().strerr()?;
    let font = ttf_context.load_font(FONT_PATH, FONT_SIZE)?;

    let mut event_pump = engine.event_pump()?;
    let mut played = 0;

    for (i, path) in files.iter().enumerate() {
        let track = match decode::decode(path) {
            Ok(track) => track,
            Err(e) => {
                log(Log::Error, format!("skipping {} ({e})", path.display()));
                continue;
            }
        };

        let queue = files.len() - i - 1;
        engine.set_title(format!("{TITLE} | Queue: {queue} | File: {}", track.name))?;
        played += 1;

        match play(&mut engine, &mut event_pump, &font, &track, &settings)? {
            Step::Next => continue,
            Step::Quit => return Ok(()),
        }
    }

    engine.close();

    if played == 0 {
        Err("none of the queued files could be decoded".into())
    } else {
        log(Log::Info, "queue finished");
        Ok(())
    }
}

/// Waits for the analysis while keeping the window responsive.
fn analyze(
    engine: &mut Engine,
    event_pump: &mut EventPump,
    font: &Font,
    track: &Track,
    settings: &Settings,
) -> Result<Result<AnalysisReport, Step>, String> {
    let started = Instant::now();
    let mut analyzer = Analyzer::start(
        Arc::clone(&track.mono),
        track.sample_rate,
        AnalysisParams::from(settings),
    );

    loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::ESCAPE),
                    ..
                } => return Ok(Err(Step::Quit)),
                Event::KeyDown {
                    keycode: Some(Keycode::N),
                    ..
                } => return Ok(Err(Step::Next)),
                _ => (),
            }
        }

        if let Some(report) = analyzer.poll() {
            log(
                Log::Info,
                format!(
                    "analysis took {:.2}s: {} onsets, {} pitched, tempo {}",
                    started.elapsed().as_secs_f32(),
                    report.onsets.len(),
                    report.pitches.iter().flatten().count(),
                    report.bpm.map_or("unknown".to_string(), |bpm| bpm.to_string()),
                ),
            );
            if report.degraded {
                log(Log::Warning, "worker analysis unavailable, lanes follow amplitude peaks only");
            }
            return Ok(Ok(report));
        }

        let dots = ".".repeat(started.elapsed().as_millis() as usize / 300 % 4);
        engine.clear();
        engine.draw_text_centered(
            font,
            &format!("analyzing {}{dots}", track.name),
            (WIDTH as i32 / 2, HEIGHT as i32 / 2),
            WHITE,
        )?;
        engine.present();
    }
}

fn play(
    engine: &mut Engine,
    event_pump: &mut EventPump,
    font: &Font,
    track: &Track,
    settings: &Settings,
) -> Result<Step, String> {
    let report = match analyze(engine, event_pump, font, track, settings)? {
        Ok(report) => report,
        Err(step) => return Ok(step),
    };

    let seed: u64 = rand::rng().random();
    log(Log::Debug, format!("chart seed {seed}"));

    let chart = Chart::build(
        &report.onsets,
        &report.pitches,
        report.bpm,
        track.duration(),
        &NoteSettings {
            long_note_chance: settings.long_note_chance,
            min_gap: settings.min_onset_gap,
        },
        &mut StdRng::seed_from_u64(seed),
    );

    log(Log::Info, format!("{} notes", chart.len()));

    let bpm_text = report.bpm.map_or("BPM ?".to_string(), |bpm| bpm.to_string());
    let mut session = Session::new(chart, settings);

    engine.open(track, settings.volume)?;

    let latency = engine.latency();
    log(Log::Debug, format!("output latency {:.0} ms", latency * 1000.0));

    let started = Instant::now();
    let mut clock = SongClock::new(started, latency);
    let mut spectrum = Spectrum::new();
    let mut flashes: Vec<TimedSmooth> = Lane::all()
        .map(|_| TimedSmooth::new(0.0, FLASH_DURATION, started))
        .collect();
    let mut progress_bar = TimedSmooth::new(0.0, PROGRESS_SMOOTHING, started);
    let mut progress_prev = 0.0;

    loop {
        let frame = Instant::now();

        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::ESCAPE),
                    ..
                } => return Ok(Step::Quit),
                Event::KeyDown {
                    keycode: Some(Keycode::N),
                    ..
                } => return Ok(Step::Next),
                Event::KeyDown {
                    keycode: Some(Keycode::R),
                    ..
                } => {
                    session.restart();
                    spectrum.reset();
                    if let Some(mut device) = engine.lock_device() {
                        device.rewind();
                    }
                    engine.set_paused(false);
                    clock = SongClock::new(frame, latency);
                    log(Log::Info, "restart");
                }
                Event::KeyDown {
                    keycode: Some(Keycode::SPACE),
                    repeat: false,
                    ..
                } => {
                    let paused = session.set_paused(!session.is_paused());
                    if paused {
                        clock.pause(frame);
                    } else {
                        clock.resume(frame);
                    }
                    if !session.is_over() {
                        engine.set_paused(paused);
                    }
                }
                Event::KeyDown {
                    keycode: Some(key),
                    repeat: false,
                    ..
                } => {
                    if let Some(lane) = lane_for_key(key).filter(|_| !session.is_paused()) {
                        flashes[lane.index()].restart(1.0, 0.0, frame);
                        session.press(lane, clock.now(frame));
                    }
                }
                _ => (),
            }
        }

        let (position, progress, end) = match engine.lock_device() {
            Some(device) => (device.seconds(), device.progress(), device.end),
            None => (0.0, 1.0, true),
        };

        if progress != progress_prev {
            progress_bar.shift_set(progress, frame);
        }
        progress_prev = progress;

        clock.sync(position, frame);
        let now = clock.now(frame);
        let was_over = session.is_over();

        match session.update(now) {
            Phase::GameOver if !was_over => engine.set_paused(true),
            Phase::GameOver => (),
            _ if end => return Ok(Step::Next),
            _ => (),
        }

        engine.clear();

        draw_spectrum(engine, &mut spectrum, track, position)?;
        draw_lanes(engine, &flashes, frame)?;
        draw_notes(engine, &session, now)?;
        draw_hud(engine, font, &session, &bpm_text, now)?;
        engine.draw_rect(
            Rect::new(0, 0, (progress_bar.value(frame) * WIDTH as f32) as u32, 2),
            WHITE,
        )?;

        engine.present();
    }
}

fn draw_spectrum(
    engine: &mut Engine,
    spectrum: &mut Spectrum,
    track: &Track,
    position: f32,
) -> Result<(), String> {
    let start = ((position * track.sample_rate as f32) as usize).min(track.mono.len());
    let end = (start + FFT_SIZE).min(track.mono.len());
    let bars = spectrum.update(&track.mono[start..end]);
    let width = WIDTH / BARS as u32;

    for (i, &value) in bars.iter().enumerate() {
        let height = value as u32 * BAR_AREA_HEIGHT / 255;
        if height == 0 {
            continue;
        }

        let (r, g, b) = bar_color(value);
        engine.draw_rect(
            Rect::new(
                (i as u32 * width) as i32,
                (HEIGHT - height) as i32,
                width,
                height,
            ),
            Color::RGB(r, g, b),
        )?;
    }

    Ok(())
}

fn draw_lanes(engine: &mut Engine, flashes: &[TimedSmooth], frame: Instant) -> Result<(), String> {
    for (i, flash) in flashes.iter().enumerate() {
        let Color { r, g, b, .. } = LANE_COLORS[i];
        let alpha = 40 + (flash.value(frame) * 140.0) as u8;
        engine.draw_rect(
            Rect::new(LANE_X[i], 0, LANE_WIDTH, HEIGHT),
            Color::RGBA(r, g, b, alpha),
        )?;
    }

    // judgment line
    engine.draw_rect(Rect::new(0, JUDGMENT_Y as i32 - 2, WIDTH, 4), WHITE)
}

fn draw_notes(engine: &mut Engine, session: &Session, now: f32) -> Result<(), String> {
    let speed = session.scroll_speed();
    let half = NOTE_SIZE as f32 / 2.0;

    for note in session.notes() {
        let color = match note.state {
            NoteState::Pending => LANE_COLORS[note.lane.index()],
            NoteState::Missed => GREY,
            NoteState::Hit => continue,
        };

        let head = note.vertical_position(now, JUDGMENT_Y, speed);
        let tail = note.tail_position(now, JUDGMENT_Y, speed);
        if head < -half || tail > HEIGHT as f32 + half {
            continue;
        }

        let x = LANE_X[note.lane.index()];

        if note.is_long() {
            let top = tail.max(-half);
            let width = LANE_WIDTH / 3;
            engine.draw_rect(
                Rect::new(
                    x + (LANE_WIDTH - width) as i32 / 2,
                    top as i32,
                    width,
                    (head - top).max(1.0) as u32,
                ),
                color,
            )?;
        }

        engine.draw_rect(
            Rect::new(
                x + (LANE_WIDTH - NOTE_SIZE) as i32 / 2,
                (head - half) as i32,
                NOTE_SIZE,
                NOTE_SIZE,
            ),
            color,
        )?;
    }

    Ok(())
}

fn draw_hud(
    engine: &mut Engine,
    font: &Font,
    session: &Session,
    bpm_text: &str,
    now: f32,
) -> Result<(), String> {
    let board = session.board();
    let center = WIDTH as i32 / 2;

    engine.draw_text(
        font,
        &format!(
            "Score {}  Streak {}  x{}  Misses {}",
            board.score, board.streak, board.multiplier, board.misses
        ),
        (10, 10),
        WHITE,
    )?;
    engine.draw_text(font, bpm_text, (10, 10 + FONT_SIZE as i32), WHITE)?;

    if let Some(text) = session.feedback(now) {
        engine.draw_text_centered(font, text, (center, JUDGMENT_Y as i32 - 60), WHITE)?;
    }

    match session.phase() {
        Phase::GameOver => {
            engine.draw_text_centered(font, "Game Over", (center, HEIGHT as i32 / 3), WHITE)?;
            engine.draw_text_centered(
                font,
                &format!("best streak {}, R to retry, N for next", board.best_streak),
                (center, HEIGHT as i32 / 3 + FONT_SIZE as i32),
                WHITE,
            )
        }
        Phase::Cleared => {
            engine.draw_text_centered(font, "Clear!", (center, HEIGHT as i32 / 3), WHITE)?;
            engine.draw_text_centered(
                font,
                &format!("{} of {} notes hit", board.hits, session.notes().len()),
                (center, HEIGHT as i32 / 3 + FONT_SIZE as i32),
                WHITE,
            )
        }
        Phase::Playing if session.is_paused() => {
            engine.draw_text_centered(font, "Paused", (center, HEIGHT as i32 / 3), WHITE)
        }
        Phase::Playing => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_row_keys_map_to_lanes() {
        assert_eq!(lane_for_key(Keycode::A), Lane::new(0));
        assert_eq!(lane_for_key(Keycode::F), Lane::new(3));
        assert_eq!(lane_for_key(Keycode::R), None);
    }
}
