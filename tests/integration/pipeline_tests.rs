/*!
 * End-to-end pipeline runs against the scripted completion service
 */

use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeSet;

use dubsync::app_controller::{AUDIO_TASKS_FILE, DUB_TRACK, REMERGED_TRACK, REPORT_FILE};
use dubsync::file_utils::FileManager;
use dubsync::completion::Term;
use dubsync::providers::mock::MockProvider;
use dubsync::subtitles::TrackKind;
use dubsync::timeline::AudioTask;
use dubsync::{AsrTranscript, Config, Controller};

use crate::common::{self, mock_providers};

fn controller(provider: MockProvider, attempts: usize) -> Controller {
    Controller::with_client(Config::default(), common::test_client(provider, attempts))
}

/// One speaker reading thirty numbered words in a single sentence
fn long_transcript() -> String {
    let words: Vec<Value> = (0..30)
        .map(|i| {
            let word = if i == 29 { format!("word{}.", i) } else { format!("word{}", i) };
            serde_json::json!({"word": word, "start": i as f64 * 0.5, "end": i as f64 * 0.5 + 0.5})
        })
        .collect();
    let text: Vec<&str> = words.iter().filter_map(|w| w["word"].as_str()).collect();
    serde_json::json!({
        "segments": [{"start": 0.0, "end": 15.0, "text": text.join(" "), "speaker": "A", "words": words}]
    })
    .to_string()
}

#[tokio::test]
async fn test_run_sampleTranscript_shouldProduceTranslatedTimeline() -> Result<()> {
    common::init_logging();
    let provider = mock_providers::pipeline_provider();
    let transcript = AsrTranscript::from_json(common::SAMPLE_TRANSCRIPT)?;

    let output = controller(provider.clone(), 3).run(&transcript, None).await?;

    let translations: Vec<&str> = output.translations.iter().map(|t| t.translation.as_str()).collect();
    assert_eq!(translations, vec!["HELLO WORLD.", "THIS IS A TEST.", "NICE TO MEET YOU."]);
    let ids: Vec<u64> = output.translations.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    assert_eq!(output.entries.len(), 3);
    assert_eq!(output.parent_ids, vec![1, 2, 3]);
    assert_eq!(output.tasks.len(), 2);
    assert_eq!(output.tasks[0].text, "HELLO WORLD. THIS IS A TEST.");
    assert_eq!((output.tasks[0].start_time, output.tasks[0].end_time), (0.0, 3.0));
    assert_eq!(output.tasks[1].speaker_id.as_deref(), Some("B"));
    assert_eq!(output.tasks[1].end_time, 7.0);

    let report = &output.report;
    assert_eq!(report.run_id, None);
    assert_eq!(report.merged_tasks, 1);
    assert!(report.failed_chunks.is_empty() && report.failed_alignments.is_empty());
    assert_eq!(report.trimmed, 0);

    let glossary = report.glossary.as_ref().expect("translations were computed");
    assert_eq!(glossary.theme.as_deref(), Some("Two people greet each other."));
    assert_eq!(glossary.terms.len(), 1);

    // one summary, then one faithful and one expressive request for the single chunk
    assert_eq!(provider.request_count(), 3);
    let history = provider.history();
    assert_eq!(history[0].title, "summarize");
    assert!(history[1].prompt.contains("### Points to Note\n1. \"world\": \"WORLD\", meaning: the planet"));
    Ok(())
}

#[tokio::test]
async fn test_runFile_sampleTranscript_shouldWriteEveryOutput() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let transcript = common::create_test_transcript(dir.path())?;
    let output_dir = dir.path().join("out");

    let report = controller(mock_providers::pipeline_provider(), 3)
        .run_file(&transcript, &output_dir, None)
        .await?;

    let mut expected: Vec<&str> = TrackKind::ALL.iter().map(|kind| kind.file_name()).collect();
    expected.extend([REMERGED_TRACK, DUB_TRACK, AUDIO_TASKS_FILE, REPORT_FILE]);
    for name in expected {
        assert!(FileManager::file_exists(output_dir.join(name)), "missing {}", name);
    }

    let remerged = FileManager::read_to_string(output_dir.join(REMERGED_TRACK))?;
    assert!(remerged.starts_with("1\n00:00:00,000 --> 00:00:01,000\nHELLO WORLD.\n\n"));
    assert_eq!(remerged.matches(" --> ").count(), 3);

    let tasks: Vec<AudioTask> = FileManager::read_json(output_dir.join(AUDIO_TASKS_FILE))?;
    assert_eq!(tasks.len(), report.audio_task_count);

    let written: Value = FileManager::read_json(output_dir.join(REPORT_FILE))?;
    assert_eq!(written["sentence_count"], Value::from(3));
    assert_eq!(written["subtitle_count"], Value::from(3));
    assert_eq!(written["audio_task_count"], Value::from(2));
    Ok(())
}

#[tokio::test]
async fn test_run_longSentence_shouldSplitFitAndRemergeExactly() -> Result<()> {
    let provider = mock_providers::pipeline_provider();
    let transcript = AsrTranscript::from_json(&long_transcript())?;
    let original = transcript.segments[0].text.clone();
    let config = Config {
        target_language: "fr".to_string(),
        ..Config::default()
    };
    let controller = Controller::with_client(config, common::test_client(provider.clone(), 3));

    let output = controller.run(&transcript, None).await?;

    assert!(output.sentences.len() >= 2);
    let rejoined: Vec<&str> = output.sentences.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(rejoined.join(" "), original);
    let covered: f64 = output
        .sentences
        .iter()
        .map(|s| s.end.unwrap_or_default() - s.start.unwrap_or_default())
        .sum();
    assert!((covered - 15.0).abs() < 1e-9);

    // every sentence keeps at least one subtitle line, and only its own
    assert!(output.entries.len() > output.sentences.len());
    let parents: BTreeSet<u64> = output.parent_ids.iter().copied().collect();
    let sentence_ids: BTreeSet<u64> = output.sentences.iter().map(|s| s.id).collect();
    assert_eq!(parents, sentence_ids);

    let remerged = output.remerged_track(controller.config().target_joiner());
    assert_eq!(remerged.len(), output.translations.len());
    for (block, translation) in remerged.iter().zip(&output.translations) {
        assert_eq!(block.text, translation.translation);
    }

    let titles: BTreeSet<String> = provider.history().into_iter().map(|r| r.title).collect();
    assert!(titles.contains("split_by_meaning"));
    assert!(titles.contains("align_subs"));
    assert!(output.report.failed_batches.is_empty());
    assert!(output.report.failed_alignments.is_empty());
    Ok(())
}

#[test]
fn test_run_configuredTermsWithoutSummary_shouldNoteTermsOnly() -> Result<()> {
    let provider = mock_providers::pipeline_provider();
    let transcript = AsrTranscript::from_json(common::SAMPLE_TRANSCRIPT)?;
    let mut config = Config::default();
    config.pipeline.chunking.summarize = false;
    config.pipeline.chunking.custom_terms = vec![Term {
        src: "Test".to_string(),
        tgt: "TEST-TERM".to_string(),
        note: String::new(),
    }];
    let controller = Controller::with_client(config, common::test_client(provider.clone(), 3));

    let output = tokio_test::block_on(async { controller.run(&transcript, None).await })?;

    assert_eq!(output.translations.len(), 3);
    let history = provider.history();
    assert!(history.iter().all(|request| request.title != "summarize"));
    let faithful = history
        .iter()
        .find(|request| request.title == "translate_faithfulness")
        .expect("faithful pass was sent");
    assert!(faithful.prompt.contains("### Points to Note\n1. \"Test\": \"TEST-TERM\"\n"));
    assert!(!faithful.prompt.contains("### Content Summary"));
    let glossary = output.report.glossary.expect("translations were computed");
    assert_eq!(glossary.theme, None);
    Ok(())
}

#[tokio::test]
async fn test_run_failingService_shouldReportChunkAndKeepSource() -> Result<()> {
    let transcript = AsrTranscript::from_json(common::SAMPLE_TRANSCRIPT)?;

    let output = controller(MockProvider::failing(), 1).run(&transcript, None).await?;

    assert_eq!(output.translations.len(), 3);
    for translation in &output.translations {
        assert_eq!(translation.translation, translation.source_text);
    }
    assert_eq!(output.report.failed_chunks.len(), 1);
    assert_eq!(output.report.failed_chunks[0].ids, vec![1, 2, 3]);
    assert!(output.report.warnings.iter().any(|w| w.starts_with("Translated without a summary")));
    assert_eq!(output.tasks.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_runFile_missingTranscript_shouldFail() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let result = controller(mock_providers::pipeline_provider(), 3)
        .run_file(&dir.path().join("absent.json"), dir.path(), None)
        .await;
    assert!(result.is_err());
    Ok(())
}
