/*!
 * Tests for loading and validating conf.json
 */

use anyhow::Result;
use serde_json::Value;

use dubsync::app_config::{Config, LlmProvider};
use dubsync::file_utils::FileManager;

use crate::common;

fn ollama_config() -> Config {
    let mut config = Config::default();
    config.completion.provider = LlmProvider::Ollama;
    config
}

#[test]
fn test_config_writtenThenRead_shouldKeepEverySetting() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = dir.path().join("conf.json");

    let mut config = ollama_config();
    config.target_language = "ja".to_string();
    config.pipeline.subtitle.weights.cjk = 2.5;
    config.pipeline.segmentation.similarity_threshold = 0.85;
    FileManager::write_json(&path, &config)?;

    let loaded: Config = FileManager::read_json(&path)?;
    assert_eq!(serde_json::to_value(&loaded)?, serde_json::to_value(&config)?);
    assert_eq!(loaded.target_joiner(), "");
    Ok(())
}

#[test]
fn test_config_partialFile_shouldFillMissingSections() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        dir.path(),
        "conf.json",
        r#"{"source_language": "fr", "pipeline": {"timeline": {"min_subtitle_duration": 1.5}}}"#,
    )?;

    let config: Config = FileManager::read_json(&path)?;
    assert_eq!(config.source_language, "fr");
    assert_eq!(config.source_joiner(), " ");
    assert_eq!(config.pipeline.timeline.min_subtitle_duration, 1.5);
    assert_eq!(config.pipeline.trim.max_speed_factor, 1.45);
    assert_eq!(config.pipeline.subtitle.weights.cjk, 1.75);
    Ok(())
}

#[test]
fn test_config_serialized_shouldExposePipelineSections() -> Result<()> {
    let value = serde_json::to_value(Config::default())?;
    let pipeline = value["pipeline"].as_object().cloned().unwrap_or_default();
    for section in ["segmentation", "long_sentence", "chunking", "subtitle", "trim", "timeline", "audio"] {
        assert!(pipeline.contains_key(section), "missing section {}", section);
    }
    assert_eq!(value["pipeline"]["subtitle"]["weights"]["cjk"], Value::from(1.75));
    for key in ["max_workers", "max_split_length", "split_batch_size", "split_passes", "similarity_threshold"] {
        assert!(value["pipeline"]["segmentation"].get(key).is_some(), "missing segmentation.{}", key);
        assert!(value["pipeline"].get(key).is_none(), "{} should live under segmentation", key);
    }
    assert_eq!(value["pipeline"]["chunking"]["summarize"], Value::Bool(true));
    Ok(())
}

#[test]
fn test_validate_outOfRangeThreshold_shouldFail() {
    let mut config = ollama_config();
    config.pipeline.segmentation.similarity_threshold = 1.5;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_zeroWorkers_shouldFail() {
    let mut config = ollama_config();
    config.pipeline.segmentation.max_workers = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_unknownLanguage_shouldFail() {
    let mut config = ollama_config();
    config.target_language = "not-a-language".to_string();
    assert!(config.validate().is_err());
}
