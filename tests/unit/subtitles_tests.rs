/*!
 * Subtitle fitting, trimming and SRT output tests
 */

use anyhow::Result;
use std::sync::Arc;

use dubsync::app_config::{ScriptWeights, SegmentationConfig, SubtitleConfig, TrimConfig};
use dubsync::segmentation::{MeaningSplitter, RuleBasedAnalyzer};
use dubsync::subtitles::srt::{entry_track, write_srt};
use dubsync::subtitles::visual::visual_length;
use dubsync::subtitles::{remerge_translations, DurationTrimmer, SubtitleEntry, SubtitleFitter, TrackKind};
use dubsync::providers::mock::MockProvider;
use dubsync::translation::TranslationResult;

use crate::common::{self, mock_providers};

fn fitter(provider: MockProvider) -> SubtitleFitter {
    let client = common::test_client(provider, 3);
    let splitter = MeaningSplitter::new(
        client.clone(),
        Arc::new(RuleBasedAnalyzer::new()),
        SegmentationConfig::default(),
        "English",
        " ",
    );
    SubtitleFitter::new(splitter, client, SubtitleConfig::default(), "English", "Chinese", 2)
}

fn result(id: u64, source: &str, translation: &str, start: f64, end: f64) -> TranslationResult {
    TranslationResult {
        id,
        source_text: source.to_string(),
        translation: translation.to_string(),
        speaker_id: Some("A".to_string()),
        start: Some(start),
        end: Some(end),
    }
}

#[test]
fn test_visualLength_defaultWeights_shouldWeighCjkWider() {
    let weights = ScriptWeights::default();
    assert_eq!(visual_length("hello", &weights), 5.0);
    assert_eq!(visual_length("你好", &weights), 3.5);
}

#[tokio::test]
async fn test_fit_longChineseLine_shouldRemergeToOriginalTranslation() {
    let provider = mock_providers::pipeline_provider();
    let fitter = fitter(provider.clone());
    let source = "The committee met for several hours on Tuesday evening before finally agreeing on the new budget";
    let translation = "委员会周二晚上开了好几个小时的会最后终于就新的预算达成了一致意见";
    let results = vec![
        result(1, "Good evening.", "晚上好。", 0.0, 1.5),
        result(2, source, translation, 1.5, 9.5),
    ];

    let outcome = fitter.fit(&results).await;

    assert!(outcome.failed.is_empty());
    assert_eq!(outcome.lines[0].translation, "晚上好。");
    let pieces: Vec<_> = outcome.lines.iter().filter(|line| line.parent_id == 2).collect();
    assert!(pieces.len() >= 2);
    let window: f64 = pieces.iter().map(|l| l.end.unwrap_or_default() - l.start.unwrap_or_default()).sum();
    assert!((window - 8.0).abs() < 1e-9);

    let remerged = remerge_translations(
        &results,
        outcome.lines.iter().map(|line| (line.parent_id, line.translation.as_str())),
        "",
    );
    assert_eq!(remerged[1], (2, translation.to_string()));
    assert!(provider.history().iter().any(|request| request.title == "align_subs"));
}

#[tokio::test]
async fn test_fit_refitOfFittedLines_shouldNotSplitAgain() {
    let provider = mock_providers::pipeline_provider();
    let fitter = fitter(provider.clone());
    let results = vec![result(1, "A short line.", "短句。", 0.0, 2.0)];

    let first = fitter.fit(&results).await;
    let refit: Vec<TranslationResult> = first
        .lines
        .iter()
        .map(|line| result(line.parent_id, &line.source, &line.translation, 0.0, 2.0))
        .collect();
    let second = fitter.fit(&refit).await;

    assert_eq!(second.lines, first.lines);
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn test_trim_overBudgetEntry_shouldShortenOnlyThatEntry() {
    let provider = mock_providers::pipeline_provider();
    let trimmer = DurationTrimmer::new(common::test_client(provider, 3), TrimConfig::default(), "English", 2);
    let wordy = "This translation is considerably longer than anything a speaker could possibly say \
                 in four seconds, even when talking quickly and without pausing for breath at all";
    let entries = vec![
        SubtitleEntry::new("Hi.", "Hello there.", None, 0.0, 4.0),
        SubtitleEntry::new("Long one.", wordy, None, 4.0, 8.0),
    ];
    assert!(trimmer.needs_trim(&entries[1]));

    let outcome = trimmer.trim(entries).await;

    assert_eq!(outcome.trimmed, vec![1]);
    assert!(outcome.fallbacks.is_empty());
    assert_eq!(outcome.entries[0].translation, "Hello there.");
    assert!(outcome.entries[1].translation.chars().count() < wordy.chars().count());
}

#[test]
fn test_writeSrt_bilingualTrack_shouldStackSourceOverTranslation() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join(TrackKind::SourceOverTranslation.file_name());
    let entries = vec![
        SubtitleEntry::new("Hello.", "你好。", Some("A"), 0.0, 1.25),
        SubtitleEntry::new("Bye.", "再见。", Some("A"), 3661.5, 3662.0),
    ];

    write_srt(&entry_track(&entries, TrackKind::SourceOverTranslation), &path)?;

    let content = std::fs::read_to_string(&path)?;
    assert_eq!(
        content,
        "1\n00:00:00,000 --> 00:00:01,250\nHello.\n你好。\n\n2\n01:01:01,500 --> 01:01:02,000\nBye.\n再见。\n\n"
    );
    Ok(())
}
