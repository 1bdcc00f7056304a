/*!
 * Clip rendering and final track assembly
 */

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::f64::consts::PI;
use std::path::Path;

use dubsync::app_config::AudioConfig;
use dubsync::timeline::{clip_path, render_clips, AudioTask, AudioTimelineAssembler, SpeechSynthesizer};
use dubsync::{AsrTranscript, Config, Controller};

use crate::common::{self, mock_providers};

/// Writes a half-second stereo tone at 22.05 kHz for every line
struct ToneSynthesizer;

#[async_trait]
impl SpeechSynthesizer for ToneSynthesizer {
    async fn synthesize(&self, text: &str, _speaker_id: Option<&str>, output: &Path) -> Result<()> {
        if text.contains("unspeakable") {
            return Err(anyhow!("voice rejected the line"));
        }
        write_tone(output, 0.5, 22_050, 2)
    }
}

fn write_tone(path: &Path, seconds: f64, sample_rate: u32, channels: u16) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    let frames = (seconds * sample_rate as f64) as usize;
    for frame in 0..frames {
        let t = frame as f64 / sample_rate as f64;
        let value = ((t * 440.0 * 2.0 * PI).sin() * 0.5 * i16::MAX as f64) as i16;
        for _ in 0..channels {
            writer.write_sample(value)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

fn task(number: usize, text: &str, start: f64, end: f64) -> AudioTask {
    AudioTask {
        number,
        start_time: start,
        end_time: end,
        duration: end - start,
        text: text.to_string(),
        origin: text.to_string(),
        speaker_id: None,
    }
}

fn read_track(path: &Path) -> Result<(hound::WavSpec, Vec<i16>)> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
    Ok((spec, samples))
}

#[tokio::test]
async fn test_renderThenAssemble_failedClip_shouldBecomeSilence() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let clip_dir = dir.path().join("clips");
    let output = dir.path().join("dub.wav");
    let tasks = vec![
        task(1, "first line", 0.0, 2.0),
        task(2, "unspeakable line", 3.0, 5.0),
        task(3, "third line", 6.0, 8.0),
    ];

    let rendered = render_clips(&ToneSynthesizer, &tasks, &clip_dir, 2).await?;
    assert_eq!(rendered.rendered, vec![1, 3]);
    assert_eq!(rendered.failed.len(), 1);
    assert!(!clip_path(&clip_dir, &tasks[1]).exists());

    let assembler = AudioTimelineAssembler::new(&AudioConfig::default());
    let report = assembler.assemble(&tasks, &clip_dir, &output).await?;
    assert_eq!(report.missing, vec![2]);
    assert!((report.duration() - 8.0).abs() < 1e-9);

    let (spec, samples) = read_track(&output)?;
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 16_000);
    assert_eq!(samples.len(), 8 * 16_000);
    // the first clip is audible and the gap after it is silent
    assert!(samples[..8_000].iter().any(|s| s.unsigned_abs() > 1_000));
    assert!(samples[16_000..48_000].iter().all(|s| *s == 0));
    assert!(samples[96_000..104_000].iter().any(|s| s.unsigned_abs() > 1_000));
    Ok(())
}

#[tokio::test]
async fn test_assemble_undecodableClip_shouldFallBackAndKeepLength() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let clip_dir = dir.path().join("clips");
    let output = dir.path().join("dub.wav");
    let tasks = vec![task(1, "first line", 0.0, 2.0), task(2, "broken line", 3.0, 6.0)];

    render_clips(&ToneSynthesizer, &tasks[..1], &clip_dir, 1).await?;
    common::create_test_file(&clip_dir, "2.wav", "RIFF? not audio at all")?;

    let config = AudioConfig {
        command_timeout_secs: 10,
        ..AudioConfig::default()
    };
    let report = AudioTimelineAssembler::new(&config)
        .assemble(&tasks, &clip_dir, &output)
        .await?;

    // the slow path either recovers the clip or leaves silence, never both
    assert_ne!(report.missing.contains(&2), report.transcoded.contains(&2));
    assert!(!report.missing.contains(&1) && !report.transcoded.contains(&1));
    assert!((report.duration() - 6.0).abs() < 1e-9);

    let (_, samples) = read_track(&output)?;
    assert_eq!(samples.len(), 6 * 16_000);
    assert!(samples[..8_000].iter().any(|s| s.unsigned_abs() > 1_000));
    if report.missing.contains(&2) {
        assert!(samples[48_000..].iter().all(|s| *s == 0));
    }
    Ok(())
}

#[tokio::test]
async fn test_renderClips_secondPass_shouldReuseExistingClips() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let tasks = vec![task(1, "one", 0.0, 1.0), task(2, "", 1.0, 2.0)];

    let first = render_clips(&ToneSynthesizer, &tasks, dir.path(), 1).await?;
    let second = render_clips(&ToneSynthesizer, &tasks, dir.path(), 1).await?;

    assert_eq!(first.rendered, vec![1]);
    assert_eq!(first.skipped, vec![2]);
    assert_eq!(second.reused, vec![1]);
    assert!(second.rendered.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_pipelineToTrack_sampleTranscript_shouldLastUntilFinalTask() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let clip_dir = dir.path().join("clips");
    let output = dir.path().join("dub.wav");
    let transcript = AsrTranscript::from_json(common::SAMPLE_TRANSCRIPT)?;
    let config = Config::default();
    let controller = Controller::with_client(
        config.clone(),
        common::test_client(mock_providers::pipeline_provider(), 3),
    );

    let tasks = controller.run(&transcript, None).await?.tasks;
    render_clips(&ToneSynthesizer, &tasks, &clip_dir, 2).await?;
    let report = AudioTimelineAssembler::new(&config.pipeline.audio)
        .assemble(&tasks, &clip_dir, &output)
        .await?;

    let last_end = tasks.last().map(|t| t.end_time).unwrap_or_default();
    assert!(report.missing.is_empty());
    assert!((report.duration() - last_end).abs() < 1.0 / 16_000.0);
    let (_, samples) = read_track(&output)?;
    assert_eq!(samples.len(), report.samples);
    Ok(())
}
