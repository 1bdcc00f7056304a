/*!
 * Final audio track assembly.
 *
 * Clips are decoded and resampled to mono at the target rate on a bounded
 * rayon pool. Clips that fail there get one more try through an ffmpeg
 * transcode. The fold onto the track is sequential and strictly in task order.
 */

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use super::{clip_path, AudioTask};
use crate::app_config::AudioConfig;
use crate::errors::AudioError;

#[derive(Debug, Clone, Default)]
pub struct AssemblyReport {
    pub sample_rate: u32,
    pub samples: usize,
    // @field: Tasks filled with silence
    pub missing: Vec<usize>,
    // @field: Tasks decoded through the ffmpeg path
    pub transcoded: Vec<usize>,
}

impl AssemblyReport {
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples as f64 / self.sample_rate as f64
    }
}

pub struct AudioTimelineAssembler {
    sample_rate: u32,
    workers: usize,
    transcode_timeout: Duration,
}

impl AudioTimelineAssembler {
    pub fn new(config: &AudioConfig) -> Self {
        let available = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            sample_rate: config.sample_rate,
            workers: available.min(config.max_decode_workers).max(1),
            transcode_timeout: Duration::from_secs(config.command_timeout_secs),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Decode every clip, fold them onto one track and write it as 16-bit WAV
    pub async fn assemble(&self, tasks: &[AudioTask], clip_dir: &Path, output: &Path) -> Result<AssemblyReport> {
        let mut report = AssemblyReport {
            sample_rate: self.sample_rate,
            ..Default::default()
        };

        let mut clips = self.decode_all(tasks, clip_dir).await?;
        for (task, clip) in tasks.iter().zip(clips.iter_mut()) {
            if clip.is_some() {
                continue;
            }
            let path = clip_path(clip_dir, task);
            if !path.exists() {
                warn!("Clip for audio task {} is missing, using silence", task.number);
                report.missing.push(task.number);
                continue;
            }
            match self.transcode_and_decode(&path).await {
                Ok(samples) => {
                    debug!("Decoded clip {} through ffmpeg", task.number);
                    report.transcoded.push(task.number);
                    *clip = Some(samples);
                }
                Err(e) => {
                    warn!("Dropping clip for audio task {}: {:#}", task.number, e);
                    report.missing.push(task.number);
                }
            }
        }

        let track = fold_timeline(tasks, &clips, self.sample_rate);
        report.samples = track.len();
        write_wav(&track, self.sample_rate, output)?;
        info!(
            "Wrote {:.2}s of audio to {} ({} clips missing)",
            report.duration(),
            output.display(),
            report.missing.len()
        );
        Ok(report)
    }

    /// Parallel decode; `None` marks a clip that needs the fallback path
    async fn decode_all(&self, tasks: &[AudioTask], clip_dir: &Path) -> Result<Vec<Option<Vec<f32>>>> {
        let paths: Vec<(usize, PathBuf)> = tasks.iter().map(|task| (task.number, clip_path(clip_dir, task))).collect();
        let sample_rate = self.sample_rate;
        let workers = self.workers;
        info!("Decoding {} clips on {} threads", paths.len(), workers);

        tokio::task::spawn_blocking(move || -> Result<Vec<Option<Vec<f32>>>> {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .context("Failed to build decode thread pool")?;
            Ok(pool.install(|| {
                paths
                    .par_iter()
                    .map(|(number, path)| match decode_clip(path, sample_rate) {
                        Ok(samples) => Some(samples),
                        Err(e) => {
                            debug!("Fast decode failed for task {}: {}", number, e);
                            None
                        }
                    })
                    .collect()
            }))
        })
        .await
        .context("Decode worker panicked")?
    }

    async fn transcode_and_decode(&self, path: &Path) -> Result<Vec<f32>> {
        let transcoded = tempfile::Builder::new()
            .suffix(".wav")
            .tempfile()
            .context("Failed to create temporary file for transcoding")?;

        let rate = self.sample_rate.to_string();
        let mut ffmpeg = Command::new("ffmpeg");
        ffmpeg
            .arg("-y")
            .arg("-i")
            .arg(path)
            .args(["-ac", "1", "-ar", rate.as_str(), "-c:a", "pcm_s16le"])
            .arg(transcoded.path());
        let result = tokio::time::timeout(self.transcode_timeout, ffmpeg.output())
            .await
            .map_err(|_| anyhow!("ffmpeg timed out after {}s", self.transcode_timeout.as_secs()))?
            .context("Failed to execute ffmpeg")?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let last_line = stderr.lines().last().unwrap_or_default();
            return Err(anyhow!("ffmpeg transcode failed: {}", last_line));
        }

        Ok(decode_clip(transcoded.path(), self.sample_rate)?)
    }
}

/// Read a WAV clip as mono samples at `sample_rate`
pub fn decode_clip(path: &Path, sample_rate: u32) -> Result<Vec<f32>, AudioError> {
    let decode_error = |message: String| AudioError::Decode {
        path: path.display().to_string(),
        message,
    };

    let mut reader = hound::WavReader::open(path).map_err(|e| decode_error(e.to_string()))?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| decode_error(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| decode_error(e.to_string()))?
        }
    };

    let mono = downmix(&interleaved, spec.channels as usize);
    resample(mono, spec.sample_rate, sample_rate)
}

/// Average interleaved channels into one
pub fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Mono sinc resampling; output length follows the rate ratio
pub fn resample(samples: Vec<f32>, from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples);
    }
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(to_rate as f64 / from_rate as f64, 2.0, params, 1024, 1)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let expected = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<f32> = Vec::with_capacity(expected + delay);

    let mut position = 0;
    while samples.len() - position >= resampler.input_frames_next() {
        let next = resampler.input_frames_next();
        let chunk = resampler
            .process(&[&samples[position..position + next]], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        output.extend_from_slice(&chunk[0]);
        position += next;
    }
    if position < samples.len() {
        let tail = [&samples[position..]];
        let chunk = resampler
            .process_partial(Some(&tail[..]), None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        output.extend_from_slice(&chunk[0]);
    }
    while output.len() < expected + delay {
        let chunk = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if chunk[0].is_empty() {
            break;
        }
        output.extend_from_slice(&chunk[0]);
    }

    Ok(output.into_iter().skip(delay).take(expected).collect())
}

fn seconds_to_samples(seconds: f64, sample_rate: u32) -> usize {
    (seconds.max(0.0) * sample_rate as f64).round() as usize
}

/// Sequential fold of clips onto one track.
///
/// The cursor is the number of samples already written. A clip that starts
/// after the cursor is preceded by silence; one that starts before it is
/// appended at the cursor. A missing clip is silence of its task's duration.
/// The track is padded to the last task's end.
pub fn fold_timeline(tasks: &[AudioTask], clips: &[Option<Vec<f32>>], sample_rate: u32) -> Vec<f32> {
    let mut track: Vec<f32> = Vec::new();
    for (task, clip) in tasks.iter().zip(clips) {
        let start = seconds_to_samples(task.start_time, sample_rate);
        if start > track.len() {
            track.resize(start, 0.0);
        }
        match clip {
            Some(samples) => track.extend_from_slice(samples),
            None => {
                let silence = seconds_to_samples(task.duration, sample_rate);
                track.resize(track.len() + silence, 0.0);
            }
        }
    }
    if let Some(last) = tasks.last() {
        let end = seconds_to_samples(last.end_time, sample_rate);
        if end > track.len() {
            track.resize(end, 0.0);
        }
    }
    track
}

/// Write mono samples as 16-bit PCM WAV
pub fn write_wav(samples: &[f32], sample_rate: u32, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| AudioError::Encode(e.to_string()))?;
    for sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(value).map_err(|e| AudioError::Encode(e.to_string()))?;
    }
    writer.finalize().map_err(|e| AudioError::Encode(e.to_string()))?;
    Ok(())
}
