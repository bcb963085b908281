use crate::{
    log::{Log, log},
    playback::Sample,
    strerr::Strerr,
};
use std::{path::Path, sync::Arc};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, DecoderOptions},
    errors::Error as SymErr,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

/// A fully decoded track held in memory.
pub struct Track {
    /// Interleaved, `channels` samples per frame.
    pub samples: Arc<[Sample]>,
    pub mono: Arc<[Sample]>,
    pub sample_rate: u32,
    pub channels: usize,
    pub name: String,
}

impl Track {
    pub fn from_interleaved(
        samples: Vec<Sample>,
        channels: usize,
        sample_rate: u32,
        name: impl Into<String>,
    ) -> Self {
        let channels = channels.max(1);
        let mono = mixdown(&samples, channels);

        Self {
            samples: samples.into(),
            mono: mono.into(),
            sample_rate,
            channels,
            name: name.into(),
        }
    }

    pub fn frames(&self) -> usize {
        self.mono.len()
    }

    pub fn duration(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f32 / self.sample_rate as f32
        }
    }
}

/// Averages each frame's channels.
pub fn mixdown(interleaved: &[Sample], channels: usize) -> Vec<Sample> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<Sample>() / channels as Sample)
        .collect()
}

pub fn decode<P>(path: P) -> Result<Track, String>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let name = path
        .file_name()
        .and_then(|osstr| osstr.to_str())
        .unwrap_or("<unnamed>")
        .to_string();

    let src = std::fs::File::open(path).context(format!("opening {name}"))?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context(format!("probing {name}"))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or("no supported audio tracks")?;

    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.ok_or("no sample rate")?;
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context(format!("opening decoder for {name}"))?;

    let mut samples: Vec<Sample> = Vec::new();
    let mut buffer: Option<SampleBuffer<Sample>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymErr::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymErr::ResetRequired) => {
                log(Log::Warning, format!("{name}: stream reset, stopping early"));
                break;
            }
            Err(e) => return Err(e).context(format!("reading {name}")),
        };

        while !format.metadata().is_latest() {
            format.metadata().pop();
        }

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channels = spec.channels.count();

                let needs_new = buffer
                    .as_ref()
                    .is_none_or(|b| b.capacity() < decoded.capacity() * channels);
                if needs_new {
                    buffer = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                }

                if let Some(buf) = buffer.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
            }
            Err(SymErr::IoError(e)) => log(Log::Warning, format!("IoError says \"{e}\"")),
            Err(SymErr::DecodeError(e)) => log(Log::Warning, format!("DecodeError says \"{e}\"")),
            Err(e) => return Err(e).strerr(),
        }
    }

    if samples.is_empty() || channels == 0 {
        return Err(format!("{name}: no audio decoded"));
    }

    let track = Track::from_interleaved(samples, channels, sample_rate, name);
    log(
        Log::Info,
        format!(
            "decoded {} ({:.1}s, {} Hz, {} ch)",
            track.name,
            track.duration(),
            track.sample_rate,
            track.channels
        ),
    );

    Ok(track)
}
