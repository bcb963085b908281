use crate::strerr::Strerr;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};

pub const AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "wav", "flac", "ogg"];

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// Files under `path` (recursively) with one of `extensions`, case-insensitive.
pub fn collect_paths<P>(path: P, extensions: &[&str]) -> Result<Vec<PathBuf>, String>
where
    P: AsRef<Path>,
{
    let body = |path: PathBuf| {
        if path.is_file() {
            has_extension(&path, extensions).then(|| vec![path])
        } else if path.is_dir() {
            collect_paths(path, extensions).ok()
        } else {
            None
        }
    };

    Ok(std::fs::read_dir(path)
        .strerr()?
        .filter_map(|entry_result| body(entry_result.ok()?.path()))
        .flatten()
        .collect())
}

/// A single file plays on its own; a folder becomes a shuffled queue.
pub fn queue<P>(path: P) -> Result<Vec<PathBuf>, String>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = collect_paths(path, &AUDIO_EXTENSIONS).context(path.display())?;
    if files.is_empty() {
        return Err(format!("no audio files under {}", path.display()));
    }

    files.shuffle(&mut rand::rng());
    Ok(files)
}
