//! Audio-driven rhythm game: tempo, onset and pitch analysis turned into a
//! four-lane chart, plus the judging and playback pieces the game loop needs.

pub mod analysis;
pub mod config;
pub mod decode;
pub mod engine;
pub mod filter;
pub mod judge;
pub mod log;
pub mod notes;
pub mod onset;
pub mod pitch;
pub mod playback;
pub mod session;
pub mod smooth;
pub mod spectrum;
pub mod strerr;
pub mod tempo;
pub mod util;
