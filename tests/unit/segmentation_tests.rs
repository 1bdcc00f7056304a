/*!
 * Segmentation tests across the analyzer, both splitters and timing
 */

use anyhow::Result;
use std::sync::Arc;

use dubsync::app_config::{LongSentenceConfig, SegmentationConfig};
use dubsync::segmentation::fuzzy::{apply_split_positions, similarity_ratio};
use dubsync::segmentation::{
    find_split_positions, renumber, LongSentenceSplitter, MeaningSplitter, RuleBasedAnalyzer, SentenceRecord,
    SentenceSegmenter, SPLIT_DELIMITER,
};
use dubsync::transcript::{AsrTranscript, TranscriptWord};

use crate::common::{self, mock_providers};

fn duration(record: &SentenceRecord) -> f64 {
    record.end.unwrap_or_default() - record.start.unwrap_or_default()
}

#[test]
fn test_segment_sampleTranscript_shouldTimeEverySentence() -> Result<()> {
    let words = AsrTranscript::from_json(common::SAMPLE_TRANSCRIPT)?.words();
    let segmenter = SentenceSegmenter::new(Arc::new(RuleBasedAnalyzer::new()), " ");

    let sentences = segmenter.segment(&words);

    let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Hello world.", "This is a test.", "Nice to meet you."]);
    assert_eq!((sentences[0].start, sentences[0].end), (Some(0.0), Some(1.0)));
    assert_eq!((sentences[1].start, sentences[1].end), (Some(1.2), Some(3.0)));
    assert_eq!(sentences[2].speaker_id.as_deref(), Some("B"));
    Ok(())
}

#[test]
fn test_findSplitPositions_llmDelimiter_shouldRecoverPrefix() {
    let original = "Hello world, this is a test of splitting";
    let modified = "Hello world, this is a test[br]of splitting";

    let found = find_split_positions(original, modified, " ", SPLIT_DELIMITER, 0.9);

    assert_eq!(found.positions.len(), 1);
    assert!(found.low_confidence.is_empty());
    let prefix: String = original.chars().take(found.positions[0]).collect();
    assert!(similarity_ratio(prefix.trim(), "Hello world, this is a test") >= 0.9);
    let parts = apply_split_positions(original, &found.positions);
    assert_eq!(parts, vec!["Hello world, this is a test", "of splitting"]);
}

#[test]
fn test_longSplitter_commaSentence_shouldRejoinAndCoverWindow() {
    let text = "We walked along the river for most of the afternoon, then we finally found the old stone bridge again.";
    let parent = SentenceRecord::new(7, text, Some("S1"), Some(10.0), Some(18.0));
    let splitter = LongSentenceSplitter::new(Arc::new(RuleBasedAnalyzer::new()), LongSentenceConfig::default(), " ");

    let children = splitter.split_records(std::slice::from_ref(&parent));

    assert!(children.len() >= 2);
    let rejoined: Vec<&str> = children.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(rejoined.join(" "), text);
    let total: f64 = children.iter().map(duration).sum();
    assert!((total - duration(&parent)).abs() < 1e-9);
    assert_eq!(children.first().and_then(|c| c.start), Some(10.0));
    assert!(children.iter().all(|c| c.id == 7 && c.speaker_id.as_deref() == Some("S1")));
}

#[tokio::test]
async fn test_meaningSplitter_longSentence_shouldKeepWindowAndText() {
    let provider = mock_providers::pipeline_provider();
    let client = common::test_client(provider.clone(), 3);
    let config = SegmentationConfig {
        max_split_length: 8,
        ..SegmentationConfig::default()
    };
    let splitter = MeaningSplitter::new(client, Arc::new(RuleBasedAnalyzer::new()), config, "English", " ");
    let text = "one two three four five six seven eight nine ten eleven twelve";
    let records = vec![
        SentenceRecord::new(1, "Short one.", None, Some(0.0), Some(1.0)),
        SentenceRecord::new(2, text, None, Some(1.0), Some(7.0)),
    ];

    let outcome = splitter.split_records(records).await;

    assert!(outcome.failed_batches.is_empty());
    assert!(provider.history().iter().all(|request| request.title == "split_by_meaning"));
    assert_eq!(outcome.records[0].text, "Short one.");
    let children: Vec<&SentenceRecord> = outcome.records.iter().filter(|r| r.id == 2).collect();
    assert!(children.len() >= 2);
    let rejoined: Vec<&str> = children.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(rejoined.join(" "), text);
    let total: f64 = children.iter().map(|c| duration(c)).sum();
    assert!((total - 6.0).abs() < 1e-9);
}

#[test]
fn test_renumber_afterSegmentAndSplit_shouldGiveUniqueIds() {
    let words: Vec<TranscriptWord> = "First sentence here. Second, and much longer, sentence that keeps going for a while."
        .split(' ')
        .enumerate()
        .map(|(i, w)| TranscriptWord::new(w, i as f64 * 0.4, i as f64 * 0.4 + 0.4, Some("S1")))
        .collect();
    let analyzer = Arc::new(RuleBasedAnalyzer::new());
    let config = LongSentenceConfig {
        char_threshold: 30,
        ..LongSentenceConfig::default()
    };

    let sentences = SentenceSegmenter::new(analyzer.clone(), " ").segment(&words);
    let mut split = LongSentenceSplitter::new(analyzer, config, " ").split_records(&sentences);
    renumber(&mut split);

    assert!(split.len() > sentences.len());
    let ids: Vec<u64> = split.iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=split.len() as u64).collect::<Vec<_>>());
}
