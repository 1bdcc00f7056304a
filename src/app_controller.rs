use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::app_config::Config;
use crate::completion::{CompletionClient, RateLimiterContext, ResponseCache};
use crate::database::models::subtitle_rows;
use crate::database::{Repository, RunRecord, Stage, StageRow};
use crate::errors::FailedUnit;
use crate::file_utils::FileManager;
use crate::language_utils::get_language_name;
use crate::providers::create_provider;
use crate::segmentation::fuzzy::LowConfidenceSplit;
use crate::segmentation::timing::repair_missing_timing;
use crate::segmentation::{
    renumber, LongSentenceSplitter, MeaningSplitter, RuleBasedAnalyzer, SentenceAnalyzer, SentenceRecord,
    SentenceSegmenter,
};
use crate::subtitles::srt::{dub_track, entry_track, write_srt};
use crate::subtitles::{remerge_translations, DurationTrimmer, SrtBlock, SubtitleEntry, SubtitleFitter, TrackKind};
use crate::timeline::{AudioTask, TimelineBuilder};
use crate::transcript::{AsrTranscript, TranscriptWord};
use crate::translation::{build_chunks, ChunkTranslator, Glossary, TranslationResult};

// @module: Application controller for the dubbing pipeline

pub const REMERGED_TRACK: &str = "trans_remerged.srt";
pub const DUB_TRACK: &str = "dub.srt";
pub const AUDIO_TASKS_FILE: &str = "audio_tasks.json";
pub const REPORT_FILE: &str = "report.json";

/// Everything worth knowing about a finished run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    // @field: Checkpoint id, absent when no database is attached
    pub run_id: Option<String>,
    pub sentence_count: usize,
    pub translation_count: usize,
    pub subtitle_count: usize,
    pub audio_task_count: usize,
    pub failed_chunks: Vec<FailedUnit>,
    pub failed_batches: Vec<FailedUnit>,
    pub failed_alignments: Vec<FailedUnit>,
    pub low_confidence_splits: Vec<LowConfidenceSplit>,
    pub trim_fallbacks: Vec<FailedUnit>,
    pub trimmed: usize,
    pub merged_tasks: usize,
    pub extended_tasks: usize,
    pub warnings: Vec<String>,
    // @field: Theme and terms used for translation, absent when translations were resumed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glossary: Option<Glossary>,
    // @field: Stages restored from the checkpoint instead of recomputed
    pub resumed_stages: Vec<Stage>,
    pub elapsed_secs: f64,
}

/// Stage outputs of one run
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub sentences: Vec<SentenceRecord>,
    pub translations: Vec<TranslationResult>,
    pub entries: Vec<SubtitleEntry>,
    // @field: Sentence id each entry was cut from, parallel to `entries`
    pub parent_ids: Vec<u64>,
    pub tasks: Vec<AudioTask>,
    pub report: PipelineReport,
}

impl PipelineOutput {
    /// One block per sentence with its fitted pieces joined back together
    pub fn remerged_track(&self, joiner: &str) -> Vec<SrtBlock> {
        let parts = self
            .parent_ids
            .iter()
            .zip(&self.entries)
            .map(|(id, entry)| (*id, entry.translation.as_str()));
        let remerged = remerge_translations(&self.translations, parts, joiner);

        self.translations
            .iter()
            .zip(remerged)
            .enumerate()
            .map(|(index, (result, (_, text)))| {
                let start = result.start.unwrap_or(0.0);
                SrtBlock::new(index + 1, start, result.end.unwrap_or(start), text)
            })
            .collect()
    }
}

/// Main application controller for the dubbing pipeline
pub struct Controller {
    // @field: App configuration
    config: Config,
    client: CompletionClient,
    analyzer: Arc<dyn SentenceAnalyzer>,
    repository: Option<Repository>,
    show_progress: bool,
    // @field: Language names used in prompts
    source_name: String,
    target_name: String,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let provider = create_provider(&config.completion);
        let limiter = Arc::new(RateLimiterContext::new());
        let client = CompletionClient::from_config(&config.completion, provider, limiter);
        Ok(Self::with_client(config, client))
    }

    /// Controller around an already built client
    pub fn with_client(config: Config, client: CompletionClient) -> Self {
        let source_name = get_language_name(&config.source_language).unwrap_or_else(|_| config.source_language.clone());
        let target_name = get_language_name(&config.target_language).unwrap_or_else(|_| config.target_language.clone());
        Self {
            source_name,
            target_name,
            config,
            client,
            analyzer: Arc::new(RuleBasedAnalyzer::new()),
            repository: None,
            show_progress: false,
        }
    }

    /// Checkpoint stages and cache completions in `repository`
    pub fn with_repository(mut self, repository: Repository) -> Self {
        let cache = ResponseCache::new(self.config.completion.common.response_cache)
            .with_store(Arc::new(repository.clone()));
        self.client = self.client.with_cache(cache);
        self.repository = Some(repository);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the pipeline on a transcript file and write every output into `output_dir`
    pub async fn run_file(&self, transcript_path: &Path, output_dir: &Path, resume: Option<&str>) -> Result<PipelineReport> {
        if !FileManager::file_exists(transcript_path) {
            return Err(anyhow!("Transcript file does not exist: {:?}", transcript_path));
        }
        let transcript = AsrTranscript::from_file(transcript_path)?;

        let output = self.run(&transcript, resume).await?;
        let written = self.write_outputs(&output, output_dir)?;
        info!("Wrote {} files to {:?}", written.len(), output_dir);

        Ok(output.report)
    }

    /// Run every stage, restoring checkpointed stages when `resume` names a run
    pub async fn run(&self, transcript: &AsrTranscript, resume: Option<&str>) -> Result<PipelineOutput> {
        let start_time = Instant::now();
        let words = transcript.words();
        if words.is_empty() {
            warn!("Transcript contains no words");
        }

        let mut report = PipelineReport {
            run_id: self.open_run(&words, resume).await?,
            ..Default::default()
        };
        let run_id = report.run_id.clone();
        let run_id = run_id.as_deref();

        // Sentences
        let sentences: Vec<SentenceRecord> = match self.restore(run_id, Stage::Sentences, &mut report).await? {
            Some(rows) => rows.into_iter().map(SentenceRecord::from).collect(),
            None => {
                let sentences = self.segment(&words, &mut report).await;
                self.checkpoint(run_id, Stage::Sentences, sentences.iter().map(StageRow::from).collect())
                    .await?;
                sentences
            }
        };
        report.sentence_count = sentences.len();

        // Translations
        let translations: Vec<TranslationResult> =
            match self.restore(run_id, Stage::Translations, &mut report).await? {
                Some(rows) => rows.into_iter().map(TranslationResult::from).collect(),
                None => {
                    let translations = self.translate(&sentences, &mut report).await;
                    self.checkpoint(run_id, Stage::Translations, translations.iter().map(StageRow::from).collect())
                        .await?;
                    translations
                }
            };
        report.translation_count = translations.len();

        // Fitted and trimmed subtitles
        let (entries, parent_ids) = match self.restore(run_id, Stage::Subtitles, &mut report).await? {
            Some(rows) => {
                let parent_ids = rows.iter().map(|row| row.id).collect();
                (rows.into_iter().map(SubtitleEntry::from).collect(), parent_ids)
            }
            None => {
                let (entries, parent_ids) = self.subtitles(&translations, &mut report).await;
                self.checkpoint(run_id, Stage::Subtitles, subtitle_rows(&entries, &parent_ids))
                    .await?;
                (entries, parent_ids)
            }
        };
        report.subtitle_count = entries.len();

        // Audio tasks
        let tasks: Vec<AudioTask> = match self.restore(run_id, Stage::AudioTasks, &mut report).await? {
            Some(rows) => rows.into_iter().map(AudioTask::from).collect(),
            None => {
                let outcome = TimelineBuilder::new(&self.config.pipeline.timeline).build(&entries);
                report.merged_tasks = outcome.merged;
                report.extended_tasks = outcome.extended;
                report.warnings.extend(outcome.warnings);
                self.checkpoint(run_id, Stage::AudioTasks, outcome.tasks.iter().map(StageRow::from).collect())
                    .await?;
                outcome.tasks
            }
        };
        report.audio_task_count = tasks.len();

        report.elapsed_secs = start_time.elapsed().as_secs_f64();
        info!(
            "Pipeline finished in {}: {} sentences, {} subtitles, {} audio tasks",
            Self::format_duration(start_time.elapsed()),
            report.sentence_count,
            report.subtitle_count,
            report.audio_task_count
        );

        Ok(PipelineOutput {
            sentences,
            translations,
            entries,
            parent_ids,
            tasks,
            report,
        })
    }

    /// Write SRT tracks, the audio task list and the report; returns the written paths
    pub fn write_outputs(&self, output: &PipelineOutput, output_dir: &Path) -> Result<Vec<PathBuf>> {
        FileManager::ensure_dir(output_dir)?;
        let mut written = Vec::new();

        for kind in TrackKind::ALL {
            let path = output_dir.join(kind.file_name());
            write_srt(&entry_track(&output.entries, kind), &path)?;
            written.push(path);
        }

        let path = output_dir.join(REMERGED_TRACK);
        write_srt(&output.remerged_track(self.config.target_joiner()), &path)?;
        written.push(path);

        let path = output_dir.join(DUB_TRACK);
        write_srt(&dub_track(&output.tasks), &path)?;
        written.push(path);

        let path = output_dir.join(AUDIO_TASKS_FILE);
        FileManager::write_json(&path, &output.tasks)?;
        written.push(path);

        let path = output_dir.join(REPORT_FILE);
        FileManager::write_json(&path, &output.report)?;
        written.push(path);

        Ok(written)
    }

    /// Sentence phase: segmentation, long split, meaning split, renumbering, timing repair
    async fn segment(&self, words: &[TranscriptWord], report: &mut PipelineReport) -> Vec<SentenceRecord> {
        let spinner = self.spinner("Segmenting sentences");
        let joiner = self.config.source_joiner();

        let sentences = SentenceSegmenter::new(self.analyzer.clone(), joiner).segment(words);
        info!("Segmented {} words into {} sentences", words.len(), sentences.len());

        let long_splitter =
            LongSentenceSplitter::new(self.analyzer.clone(), self.config.pipeline.long_sentence.clone(), joiner);
        let sentences = long_splitter.split_records(&sentences);

        spinner.set_message("Splitting long sentences by meaning");
        let outcome = self.meaning_splitter().split_records(sentences).await;
        report.low_confidence_splits.extend(outcome.low_confidence);
        report.failed_batches.extend(outcome.failed_batches);

        let mut records = outcome.records;
        renumber(&mut records);
        repair_missing_timing(&mut records, words);

        spinner.finish_and_clear();
        info!("Sentence phase produced {} sentences", records.len());
        records
    }

    async fn translate(&self, sentences: &[SentenceRecord], report: &mut PipelineReport) -> Vec<TranslationResult> {
        let pipeline = &self.config.pipeline;
        let total_chunks = build_chunks(sentences, &pipeline.chunking).len() as u64;
        let progress_bar = self.progress_bar(total_chunks, "Translating");

        let translator = ChunkTranslator::new(
            self.client.clone(),
            pipeline.chunking.clone(),
            &self.source_name,
            &self.target_name,
            pipeline.segmentation.max_workers,
        );
        let outcome = translator
            .translate_all(sentences, |_, _| progress_bar.inc(1))
            .await;
        progress_bar.finish_and_clear();

        if !outcome.failed_chunks.is_empty() {
            warn!(
                "{} chunks kept their source text after failing to translate",
                outcome.failed_chunks.len()
            );
        }
        if let Some(failure) = outcome.summary_failure {
            report
                .warnings
                .push(format!("Translated without a summary: {}", failure.error));
        }
        report.failed_chunks.extend(outcome.failed_chunks);
        report.glossary = Some(outcome.glossary);
        outcome.results
    }

    /// Fit, build entries and trim; returns entries with their parent sentence ids
    async fn subtitles(&self, translations: &[TranslationResult], report: &mut PipelineReport) -> (Vec<SubtitleEntry>, Vec<u64>) {
        let pipeline = &self.config.pipeline;
        let spinner = self.spinner("Fitting subtitle lines");

        let fitter = SubtitleFitter::new(
            self.meaning_splitter(),
            self.client.clone(),
            pipeline.subtitle.clone(),
            &self.source_name,
            &self.target_name,
            pipeline.segmentation.max_workers,
        );
        let fitted = fitter.fit(translations).await;
        if fitted.padded > 0 {
            report
                .warnings
                .push(format!("{} subtitle lines were padded after a part-count mismatch", fitted.padded));
        }
        report.low_confidence_splits.extend(fitted.low_confidence.iter().cloned());
        report.failed_alignments.extend(fitted.failed.iter().cloned());
        let parent_ids: Vec<u64> = fitted.lines.iter().map(|line| line.parent_id).collect();

        spinner.set_message("Trimming over-long lines");
        let trimmer = DurationTrimmer::new(
            self.client.clone(),
            pipeline.trim.clone(),
            &self.target_name,
            pipeline.segmentation.max_workers,
        );
        let trimmed = trimmer.trim(fitted.entries()).await;
        report.trimmed = trimmed.trimmed.len();
        report.trim_fallbacks.extend(trimmed.fallbacks);

        spinner.finish_and_clear();
        (trimmed.entries, parent_ids)
    }

    fn meaning_splitter(&self) -> MeaningSplitter {
        MeaningSplitter::new(
            self.client.clone(),
            self.analyzer.clone(),
            self.config.pipeline.segmentation.clone(),
            &self.source_name,
            self.config.source_joiner(),
        )
    }

    /// Open a fresh run, or validate the one being resumed
    async fn open_run(&self, words: &[TranscriptWord], resume: Option<&str>) -> Result<Option<String>> {
        let Some(repository) = &self.repository else {
            if resume.is_some() {
                return Err(anyhow!("Resuming a run requires a checkpoint database"));
            }
            return Ok(None);
        };

        let transcript_hash =
            Repository::hash_text(&serde_json::to_string(words).context("Failed to serialize transcript words")?);

        if let Some(run_id) = resume {
            let run = repository
                .get_run(run_id)
                .await?
                .ok_or_else(|| anyhow!("No checkpointed run with id {}", run_id))?;
            if run.transcript_hash != transcript_hash {
                return Err(anyhow!("Run {} was created for a different transcript", run_id));
            }
            if run.source_language != self.config.source_language || run.target_language != self.config.target_language {
                return Err(anyhow!(
                    "Run {} was created for {} -> {}",
                    run_id,
                    run.source_language,
                    run.target_language
                ));
            }
            info!("Resuming run {}", run_id);
            return Ok(Some(run.id));
        }

        let run = RunRecord::new(
            transcript_hash,
            self.config.source_language.clone(),
            self.config.target_language.clone(),
        );
        repository.create_run(&run).await?;
        info!("Started run {}", run.id);
        Ok(Some(run.id))
    }

    async fn restore(&self, run_id: Option<&str>, stage: Stage, report: &mut PipelineReport) -> Result<Option<Vec<StageRow>>> {
        let (Some(repository), Some(run_id)) = (&self.repository, run_id) else {
            return Ok(None);
        };
        let rows = repository.load_stage(run_id, stage).await?;
        if let Some(rows) = &rows {
            info!("Restored {} rows of stage {} from run {}", rows.len(), stage, run_id);
            report.resumed_stages.push(stage);
        }
        Ok(rows)
    }

    async fn checkpoint(&self, run_id: Option<&str>, stage: Stage, rows: Vec<StageRow>) -> Result<()> {
        if let (Some(repository), Some(run_id)) = (&self.repository, run_id) {
            repository
                .save_stage(run_id, stage, rows)
                .await
                .with_context(|| format!("Failed to checkpoint stage {}", stage))?;
        }
        Ok(())
    }

    fn progress_bar(&self, length: u64, message: &'static str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress_bar = ProgressBar::new(length);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("#>-"));
        progress_bar.set_message(message);
        progress_bar
    }

    fn spinner(&self, message: &'static str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let spinner = ProgressBar::new_spinner();
        spinner.enable_steady_tick(std::time::Duration::from_millis(120));
        spinner.set_message(message);
        spinner
    }

    // @formats: Duration as "1h 2m 3s", "2m 3s" or "3.4s"
    fn format_duration(duration: std::time::Duration) -> String {
        let total_secs = duration.as_secs();
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{:.1}s", duration.as_secs_f64())
        }
    }
}
