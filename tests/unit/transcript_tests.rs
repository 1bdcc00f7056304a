/*!
 * Tests for reading recognizer output from disk
 */

use anyhow::Result;

use dubsync::transcript::AsrTranscript;

use crate::common;

#[test]
fn test_fromFile_sampleTranscript_shouldFlattenWordsInOrder() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let path = common::create_test_transcript(dir.path())?;

    let words = AsrTranscript::from_file(&path)?.words();

    assert_eq!(words.len(), 10);
    assert_eq!(words[0].text, "Hello");
    assert_eq!(words[6].text, "Nice");
    assert_eq!(words[6].speaker_id.as_deref(), Some("B"));
    assert!(words.windows(2).all(|pair| pair[0].start <= pair[1].start));
    Ok(())
}

#[test]
fn test_fromFile_missingFile_shouldNameThePath() {
    let err = AsrTranscript::from_file("does/not/exist.json").unwrap_err();
    assert!(format!("{:#}", err).contains("exist.json"));
}

#[test]
fn test_fromJson_noneSpeaker_shouldBeUnattributed() -> Result<()> {
    let json = r#"{"segments": [{"start": 0.0, "end": 1.0, "text": "hi", "speaker": "None",
        "words": [{"word": "hi", "start": 0.0, "end": 1.0}]}]}"#;
    let words = AsrTranscript::from_json(json)?.words();
    assert_eq!(words.len(), 1);
    assert_eq!(words[0].speaker_id, None);
    Ok(())
}
