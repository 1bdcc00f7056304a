/*!
 * Checkpointing and resuming runs through the stage tables
 */

use anyhow::Result;

use dubsync::database::{DatabaseConnection, Repository, Stage};
use dubsync::providers::mock::MockProvider;
use dubsync::{AsrTranscript, Config, Controller};

use crate::common::{self, mock_providers};

fn controller(config: Config, repository: &Repository) -> (Controller, MockProvider) {
    let provider = mock_providers::pipeline_provider();
    let controller =
        Controller::with_client(config, common::test_client(provider.clone(), 3)).with_repository(repository.clone());
    (controller, provider)
}

#[tokio::test]
async fn test_resume_afterRestart_shouldRestoreEveryStageWithoutRequests() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let db_path = dir.path().join("checkpoints.db");
    let transcript = AsrTranscript::from_json(common::SAMPLE_TRANSCRIPT)?;

    let first_repository = Repository::new(DatabaseConnection::new(&db_path)?);
    let (first, first_provider) = controller(Config::default(), &first_repository);
    let original = first.run(&transcript, None).await?;
    let run_id = original.report.run_id.clone().expect("checkpointed run id");
    assert!(original.report.resumed_stages.is_empty());
    assert!(first_provider.request_count() > 0);
    drop(first);
    drop(first_repository);

    // a fresh connection stands in for a new process
    let second_repository = Repository::new(DatabaseConnection::new(&db_path)?);
    let (second, second_provider) = controller(Config::default(), &second_repository);
    let resumed = second.run(&transcript, Some(&run_id)).await?;

    assert_eq!(
        resumed.report.resumed_stages,
        vec![Stage::Sentences, Stage::Translations, Stage::Subtitles, Stage::AudioTasks]
    );
    assert_eq!(second_provider.request_count(), 0);
    assert_eq!(resumed.report.run_id.as_deref(), Some(run_id.as_str()));
    assert_eq!(resumed.sentences, original.sentences);
    assert_eq!(resumed.translations, original.translations);
    assert_eq!(resumed.entries, original.entries);
    assert_eq!(resumed.parent_ids, original.parent_ids);
    assert_eq!(resumed.tasks, original.tasks);
    assert_eq!(resumed.remerged_track(""), original.remerged_track(""));
    Ok(())
}

#[tokio::test]
async fn test_resume_partialCheckpoint_shouldRecomputeMissingStages() -> Result<()> {
    let repository = Repository::new_in_memory()?;
    let transcript = AsrTranscript::from_json(common::SAMPLE_TRANSCRIPT)?;
    let (first, _) = controller(Config::default(), &repository);
    let original = first.run(&transcript, None).await?;
    let run_id = original.report.run_id.clone().expect("checkpointed run id");

    // simulate a run interrupted after translation
    repository.save_stage(&run_id, Stage::Subtitles, Vec::new()).await?;
    repository.save_stage(&run_id, Stage::AudioTasks, Vec::new()).await?;

    let (second, second_provider) = controller(Config::default(), &repository);
    let resumed = second.run(&transcript, Some(&run_id)).await?;

    assert_eq!(resumed.report.resumed_stages, vec![Stage::Sentences, Stage::Translations]);
    assert_eq!(resumed.tasks, original.tasks);
    // nothing in the sample needs fitting or trimming
    assert_eq!(second_provider.request_count(), 0);
    assert!(repository.load_stage(&run_id, Stage::AudioTasks).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_run_sameTranscriptTwice_shouldAnswerFromDurableCache() -> Result<()> {
    let repository = Repository::new_in_memory()?;
    let transcript = AsrTranscript::from_json(common::SAMPLE_TRANSCRIPT)?;

    let (first, first_provider) = controller(Config::default(), &repository);
    let original = first.run(&transcript, None).await?;
    let (second, second_provider) = controller(Config::default(), &repository);
    let repeated = second.run(&transcript, None).await?;

    assert_ne!(repeated.report.run_id, original.report.run_id);
    assert!(repeated.report.resumed_stages.is_empty());
    assert_eq!(first_provider.request_count(), 3);
    assert_eq!(second_provider.request_count(), 0);
    assert_eq!(repeated.translations, original.translations);
    Ok(())
}

#[tokio::test]
async fn test_resume_differentTargetLanguage_shouldBeRejected() -> Result<()> {
    let repository = Repository::new_in_memory()?;
    let transcript = AsrTranscript::from_json(common::SAMPLE_TRANSCRIPT)?;
    let (first, _) = controller(Config::default(), &repository);
    let run_id = first.run(&transcript, None).await?.report.run_id.expect("checkpointed run id");

    let config = Config {
        target_language: "ja".to_string(),
        ..Config::default()
    };
    let (second, _) = controller(config, &repository);
    let err = second.run(&transcript, Some(&run_id)).await.unwrap_err();
    assert!(err.to_string().contains(&run_id));
    Ok(())
}

#[tokio::test]
async fn test_resume_differentTranscript_shouldBeRejected() -> Result<()> {
    let repository = Repository::new_in_memory()?;
    let transcript = AsrTranscript::from_json(common::SAMPLE_TRANSCRIPT)?;
    let (first, _) = controller(Config::default(), &repository);
    let run_id = first.run(&transcript, None).await?.report.run_id.expect("checkpointed run id");

    let other = AsrTranscript::from_json(&common::SAMPLE_TRANSCRIPT.replace("Nice", "Glad"))?;
    let (second, _) = controller(Config::default(), &repository);
    assert!(second.run(&other, Some(&run_id)).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_resume_withoutDatabase_shouldFail() -> Result<()> {
    let transcript = AsrTranscript::from_json(common::SAMPLE_TRANSCRIPT)?;
    let controller = Controller::with_client(
        Config::default(),
        common::test_client(mock_providers::pipeline_provider(), 3),
    );
    assert!(controller.run(&transcript, Some("missing")).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_resume_unknownRunId_shouldFail() -> Result<()> {
    let repository = Repository::new_in_memory()?;
    let transcript = AsrTranscript::from_json(common::SAMPLE_TRANSCRIPT)?;
    let (controller, _) = controller(Config::default(), &repository);
    assert!(controller.run(&transcript, Some("no-such-run")).await.is_err());
    Ok(())
}
