/*!
 * Speech synthesis boundary.
 *
 * A synthesizer renders the text of one audio task into a WAV clip. Clips are
 * rendered concurrently; a failed clip never blocks the others and is later
 * treated as silence by the assembler.
 */

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, error, info};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use super::{clip_path, AudioTask};
use crate::errors::FailedUnit;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` spoken as `speaker_id` into `output`
    async fn synthesize(&self, text: &str, speaker_id: Option<&str>, output: &Path) -> Result<()>;
}

/// Runs an external command per clip.
///
/// The template is split on whitespace before substitution, so a text with
/// spaces stays a single argument and is never seen by a shell.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    template: Vec<String>,
    timeout: Duration,
}

impl CommandSynthesizer {
    pub fn new(template: &str, timeout: Duration) -> Result<Self> {
        let template: Vec<String> = template.split_whitespace().map(str::to_string).collect();
        if template.is_empty() {
            return Err(anyhow!("Synthesis command template is empty"));
        }
        if !template.iter().any(|arg| arg.contains("{output}")) {
            return Err(anyhow!("Synthesis command template must contain {{output}}"));
        }
        Ok(Self { template, timeout })
    }

    fn arguments(&self, text: &str, speaker_id: Option<&str>, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.template
            .iter()
            .map(|arg| {
                arg.replace("{text}", text)
                    .replace("{speaker}", speaker_id.unwrap_or("default"))
                    .replace("{output}", &output)
            })
            .collect()
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str, speaker_id: Option<&str>, output: &Path) -> Result<()> {
        let arguments = self.arguments(text, speaker_id, output);
        let (program, args) = arguments
            .split_first()
            .ok_or_else(|| anyhow!("Synthesis command template is empty"))?;

        let result = tokio::time::timeout(self.timeout, Command::new(program).args(args).output())
            .await
            .map_err(|_| anyhow!("Synthesis command timed out after {}s", self.timeout.as_secs()))?
            .with_context(|| format!("Failed to execute synthesis command: {}", program))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(anyhow!("Synthesis command failed ({}): {}", result.status, stderr.trim()));
        }
        if !output.exists() {
            return Err(anyhow!("Synthesis command produced no clip at {}", output.display()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderReport {
    pub rendered: Vec<usize>,
    // @field: Tasks whose clip already existed
    pub reused: Vec<usize>,
    // @field: Tasks with nothing to say
    pub skipped: Vec<usize>,
    pub failed: Vec<FailedUnit>,
}

enum ClipStatus {
    Rendered,
    Reused,
    Skipped,
}

/// Render one clip per task into `clip_dir`, `max_workers` at a time
pub async fn render_clips(
    synthesizer: &dyn SpeechSynthesizer,
    tasks: &[AudioTask],
    clip_dir: &Path,
    max_workers: usize,
) -> Result<RenderReport> {
    std::fs::create_dir_all(clip_dir)
        .with_context(|| format!("Failed to create clip directory: {}", clip_dir.display()))?;
    info!("Rendering {} clips into {}", tasks.len(), clip_dir.display());

    let mut results = stream::iter(tasks)
        .map(|task| async move {
            let output: PathBuf = clip_path(clip_dir, task);
            (task.number, render_one(synthesizer, task, &output).await)
        })
        .buffer_unordered(max_workers.max(1))
        .collect::<Vec<_>>()
        .await;
    results.sort_by_key(|(number, _)| *number);

    let mut report = RenderReport::default();
    for (number, result) in results {
        match result {
            Ok(ClipStatus::Rendered) => report.rendered.push(number),
            Ok(ClipStatus::Reused) => report.reused.push(number),
            Ok(ClipStatus::Skipped) => report.skipped.push(number),
            Err(e) => {
                error!("Failed to synthesize audio task {}: {:#}", number, e);
                report.failed.push(FailedUnit::new("synthesize", vec![number as u64], format!("{:#}", e)));
            }
        }
    }
    Ok(report)
}

async fn render_one(synthesizer: &dyn SpeechSynthesizer, task: &AudioTask, output: &Path) -> Result<ClipStatus> {
    if task.text.trim().is_empty() {
        debug!("Audio task {} has no text, leaving it silent", task.number);
        return Ok(ClipStatus::Skipped);
    }
    if std::fs::metadata(output).map(|meta| meta.len() > 0).unwrap_or(false) {
        debug!("Reusing clip {}", output.display());
        return Ok(ClipStatus::Reused);
    }
    synthesizer
        .synthesize(&task.text, task.speaker_id.as_deref(), output)
        .await?;
    Ok(ClipStatus::Rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FileSynthesizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechSynthesizer for FileSynthesizer {
        async fn synthesize(&self, text: &str, _speaker_id: Option<&str>, output: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text == "broken" {
                return Err(anyhow!("voice unavailable"));
            }
            std::fs::write(output, text.as_bytes())?;
            Ok(())
        }
    }

    fn task(number: usize, text: &str) -> AudioTask {
        AudioTask {
            number,
            start_time: number as f64,
            end_time: number as f64 + 1.0,
            duration: 1.0,
            text: text.to_string(),
            origin: text.to_string(),
            speaker_id: None,
        }
    }

    #[tokio::test]
    async fn test_renderClips_oneFailure_shouldNotBlockOthers() {
        let dir = tempfile::tempdir().unwrap();
        let synthesizer = FileSynthesizer { calls: AtomicUsize::new(0) };
        let tasks = vec![task(1, "hello"), task(2, "broken"), task(3, ""), task(4, "bye")];

        let report = render_clips(&synthesizer, &tasks, dir.path(), 2).await.unwrap();
        assert_eq!(report.rendered, vec![1, 4]);
        assert_eq!(report.skipped, vec![3]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].ids, vec![2]);
        assert!(dir.path().join("1.wav").exists());
        assert!(!dir.path().join("2.wav").exists());
    }

    #[tokio::test]
    async fn test_renderClips_existingClip_shouldBeReused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.wav"), b"done").unwrap();
        let synthesizer = FileSynthesizer { calls: AtomicUsize::new(0) };

        let report = render_clips(&synthesizer, &[task(1, "hello")], dir.path(), 1).await.unwrap();
        assert_eq!(report.reused, vec![1]);
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_commandSynthesizer_template_shouldSubstituteWholeArguments() {
        let synthesizer = CommandSynthesizer::new("say -v {speaker} -o {output} {text}", Duration::from_secs(5)).unwrap();
        let args = synthesizer.arguments("hello there", Some("alice"), Path::new("/tmp/1.wav"));
        assert_eq!(args, vec!["say", "-v", "alice", "-o", "/tmp/1.wav", "hello there"]);
    }

    #[test]
    fn test_commandSynthesizer_missingOutput_shouldBeRejected() {
        assert!(CommandSynthesizer::new("say {text}", Duration::from_secs(5)).is_err());
        assert!(CommandSynthesizer::new("   ", Duration::from_secs(5)).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_commandSynthesizer_touch_shouldProduceClip() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("1.wav");
        let synthesizer = CommandSynthesizer::new("touch {output}", Duration::from_secs(5)).unwrap();
        synthesizer.synthesize("hi", None, &output).await.unwrap();
        assert!(output.exists());

        let failing = CommandSynthesizer::new("false {output}", Duration::from_secs(5)).unwrap();
        assert!(failing.synthesize("hi", None, &dir.path().join("2.wav")).await.is_err());
    }
}
