//! Batch pipeline scenarios
//!
//! Drives full batches through the orchestrator with the in-memory
//! store and the scripted transcriber: credential rotation, rate limit
//! recovery, claim races, failures, and cancellation.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::Utc;
    use tokio::sync::Semaphore;

    use batchscribe::{
        BatchOrchestrator, CredentialState, ProgressCallback, Stage, TranscribeError,
        TranscriptStore, VideoStatus, VideoStore,
    };

    use crate::assert_ok;
    use crate::common::{
        collaborators, init_tracing, seeded_store, test_settings, Outcome, ScriptedTranscriber,
    };

    /// One credential drains the whole queue strictly one item at a time
    #[tokio::test]
    async fn test_single_credential_batch_completes_sequentially() {
        init_tracing();
        let (store, ids) = seeded_store(3).await;
        let transcriber = Arc::new(ScriptedTranscriber::always_succeeding());
        let orchestrator = BatchOrchestrator::new(
            test_settings(1),
            collaborators(&store, transcriber.clone()),
        );

        let handle = assert_ok!(orchestrator.start(ids.clone(), None).await);
        let summary = handle.wait().await;

        assert_eq!(summary.total, 3);
        assert_eq!(summary.completed, 3);
        assert_eq!(summary.errors, 0);
        assert!(!summary.is_running);
        assert_eq!(transcriber.calls(), 3);
        assert_eq!(transcriber.max_in_flight(), 1);
        assert!(summary.avg_secs_per_video.is_some());
        assert!(summary.eta_secs.is_none(), "nothing remains to estimate");
        assert_eq!(summary.items[0].title, "video-0");

        for id in ids {
            let record = store.video(id).await.unwrap();
            assert_eq!(record.status, VideoStatus::Transcribed);
            assert!(record.error_message.is_none());

            let rows = store.find_by_video(id).await.unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].model, "gemini-2.5-flash");
            assert_eq!(rows[0].language, "ja");
            assert!(!rows[0].segments.is_empty());
        }
    }

    /// In-flight work never exceeds the credential count, and no
    /// credential is handed to two workers at once
    #[tokio::test]
    async fn test_concurrency_bounded_by_credential_count() {
        let (store, ids) = seeded_store(6).await;
        let script = (0..6)
            .map(|i| Outcome::SucceedAfter(Duration::from_millis(40), format!("text-{i}")))
            .collect();
        let transcriber = Arc::new(ScriptedTranscriber::with_script(script));
        let orchestrator = BatchOrchestrator::new(
            test_settings(2),
            collaborators(&store, transcriber.clone()),
        );

        let handle = assert_ok!(orchestrator.start(ids, None).await);
        let summary = handle.wait().await;

        assert_eq!(summary.completed, 6);
        assert_eq!(summary.errors, 0);
        assert!(transcriber.max_in_flight() <= 2);
        assert!(!transcriber.saw_credential_overlap());
    }

    /// The progress callback observes every pipeline stage in order
    #[tokio::test]
    async fn test_progress_callback_sees_every_stage() {
        let (store, ids) = seeded_store(1).await;
        let id = ids[0];
        let transcriber = Arc::new(ScriptedTranscriber::always_succeeding());
        let orchestrator =
            BatchOrchestrator::new(test_settings(1), collaborators(&store, transcriber));

        let stages: Arc<Mutex<Vec<Stage>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let on_progress: ProgressCallback = Arc::new(move |snapshot| {
            if let Some(item) = snapshot.items.iter().find(|i| i.video_id == id) {
                let mut seen = sink.lock().unwrap();
                if seen.last() != Some(&item.stage) {
                    seen.push(item.stage);
                }
            }
        });

        let handle = assert_ok!(orchestrator.start(ids, Some(on_progress)).await);
        handle.wait().await;

        let observed = stages.lock().unwrap().clone();
        assert_eq!(
            observed,
            vec![
                Stage::Queued,
                Stage::Downloading,
                Stage::Preparing,
                Stage::Transcribing,
                Stage::Saving,
                Stage::Completed,
            ],
        );
    }

    /// A rate limited item goes back to the head of the queue and is
    /// retried on the credential that is not cooling down
    #[tokio::test]
    async fn test_rate_limited_item_retried_on_second_credential() {
        init_tracing();
        let (store, ids) = seeded_store(1).await;
        let transcriber = Arc::new(ScriptedTranscriber::with_script(vec![
            Outcome::RateLimited,
            Outcome::Succeed("second attempt".to_string()),
        ]));
        let orchestrator = BatchOrchestrator::new(
            test_settings(2),
            collaborators(&store, transcriber.clone()),
        );

        let handle = assert_ok!(orchestrator.start(ids.clone(), None).await);
        let summary = handle.wait().await;

        assert_eq!(summary.completed, 1);
        assert_eq!(summary.errors, 0);
        assert_eq!(transcriber.calls(), 2);

        let cooling = summary
            .key_statuses
            .iter()
            .filter(|k| k.state == CredentialState::RateLimited)
            .count();
        assert_eq!(cooling, 1, "the limited credential is still cooling");

        let rows = store.find_by_video(ids[0]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].full_text, "second attempt");
        assert_eq!(
            store.video(ids[0]).await.unwrap().status,
            VideoStatus::Transcribed
        );
    }

    /// With a single credential the worker waits out a server-suggested
    /// retry delay instead of the much longer configured cooldown
    #[tokio::test]
    async fn test_server_retry_delay_overrides_configured_cooldown() {
        let (store, ids) = seeded_store(1).await;
        let transcriber = Arc::new(ScriptedTranscriber::with_script(vec![
            Outcome::RateLimitedFor(Duration::from_millis(50)),
            Outcome::Succeed("after cooldown".to_string()),
        ]));
        let orchestrator = BatchOrchestrator::new(
            test_settings(1),
            collaborators(&store, transcriber.clone()),
        );

        let handle = assert_ok!(orchestrator.start(ids, None).await);
        // The configured cooldown is 60s; only the 50ms override lets
        // this finish in time.
        let summary = assert_ok!(
            tokio::time::timeout(Duration::from_secs(10), handle.wait()).await
        );

        assert_eq!(summary.completed, 1);
        assert_eq!(transcriber.calls(), 2);
    }

    /// An item already claimed by another live instance is skipped
    /// without touching the service or the store
    #[tokio::test]
    async fn test_claimed_elsewhere_item_skipped_without_writes() {
        let (store, ids) = seeded_store(2).await;
        assert_ok!(
            store
                .update_status(ids[0], VideoStatus::Transcribing, None)
                .await
        );

        let transcriber = Arc::new(ScriptedTranscriber::always_succeeding());
        let orchestrator = BatchOrchestrator::new(
            test_settings(1),
            collaborators(&store, transcriber.clone()),
        );

        let handle = assert_ok!(orchestrator.start(ids.clone(), None).await);
        let summary = handle.wait().await;

        assert_eq!(summary.completed, 2, "the skip still counts as done");
        assert_eq!(summary.errors, 0);
        assert_eq!(transcriber.calls(), 1, "only the unclaimed item is transcribed");

        let skipped = summary
            .items
            .iter()
            .find(|i| i.video_id == ids[0])
            .unwrap();
        assert_eq!(skipped.stage, Stage::Completed);
        assert!(skipped.error.is_none());

        // The foreign claim is untouched and nothing was written for it.
        assert_eq!(
            store.video(ids[0]).await.unwrap().status,
            VideoStatus::Transcribing
        );
        assert!(store.find_by_video(ids[0]).await.unwrap().is_empty());
        assert_eq!(
            store.video(ids[1]).await.unwrap().status,
            VideoStatus::Transcribed
        );
    }

    /// Two instances racing over the same video: exactly one reaches the
    /// service and exactly one transcript row exists afterwards
    #[tokio::test]
    async fn test_racing_instances_produce_one_transcript() {
        let (store, ids) = seeded_store(1).await;
        let transcriber = Arc::new(ScriptedTranscriber::with_script(vec![
            Outcome::SucceedAfter(Duration::from_millis(100), "claim winner".to_string()),
        ]));

        let first = BatchOrchestrator::new(
            test_settings(1),
            collaborators(&store, transcriber.clone()),
        );
        let second = BatchOrchestrator::new(
            test_settings(1),
            collaborators(&store, transcriber.clone()),
        );

        let (started_first, started_second) =
            tokio::join!(first.start(ids.clone(), None), second.start(ids.clone(), None));
        let summary_first = assert_ok!(started_first).wait().await;
        let summary_second = assert_ok!(started_second).wait().await;

        assert_eq!(summary_first.completed, 1);
        assert_eq!(summary_first.errors, 0);
        assert_eq!(summary_second.completed, 1);
        assert_eq!(summary_second.errors, 0);
        assert_eq!(transcriber.calls(), 1, "the claim loser never calls the service");
        assert_eq!(store.find_by_video(ids[0]).await.unwrap().len(), 1);
    }

    /// A row stuck in `transcribing` past the stale window is reclaimed
    #[tokio::test]
    async fn test_stale_claim_recovered() {
        let (store, ids) = seeded_store(1).await;
        let mut record = store.video(ids[0]).await.unwrap();
        record.status = VideoStatus::Transcribing;
        record.updated_at = Utc::now() - chrono::Duration::minutes(10);
        store.insert_video(record).await;

        let transcriber = Arc::new(ScriptedTranscriber::always_succeeding());
        let orchestrator = BatchOrchestrator::new(
            test_settings(1),
            collaborators(&store, transcriber.clone()),
        );

        let handle = assert_ok!(orchestrator.start(ids.clone(), None).await);
        let summary = handle.wait().await;

        assert_eq!(summary.completed, 1);
        assert_eq!(transcriber.calls(), 1);
        assert_eq!(
            store.video(ids[0]).await.unwrap().status,
            VideoStatus::Transcribed
        );
        assert_eq!(store.find_by_video(ids[0]).await.unwrap().len(), 1);
    }

    /// One failing item neither stops the batch nor leaks credentials
    /// into the persisted error text
    #[tokio::test]
    async fn test_failed_item_does_not_stop_batch() {
        let (store, ids) = seeded_store(2).await;
        let transcriber = Arc::new(ScriptedTranscriber::with_script(vec![
            Outcome::Fail(TranscribeError::Network(
                "connect error: https://host/upload?key=AIzaSySecretSecret123 refused".to_string(),
            )),
            Outcome::Succeed("survivor".to_string()),
        ]));
        let orchestrator = BatchOrchestrator::new(
            test_settings(1),
            collaborators(&store, transcriber.clone()),
        );

        let handle = assert_ok!(orchestrator.start(ids.clone(), None).await);
        let summary = handle.wait().await;

        assert_eq!(summary.completed, 1);
        assert_eq!(summary.errors, 1);

        let failed = store.video(ids[0]).await.unwrap();
        assert_eq!(failed.status, VideoStatus::Error);
        let message = failed.error_message.unwrap();
        assert!(!message.contains("AIzaSy"), "credential leaked: {message}");
        assert!(message.contains("key=REDACTED"));

        let failed_item = summary.items.iter().find(|i| i.video_id == ids[0]).unwrap();
        assert_eq!(failed_item.stage, Stage::Error);
        assert!(!failed_item.error.as_deref().unwrap().contains("AIzaSy"));

        assert_eq!(
            store.video(ids[1]).await.unwrap().status,
            VideoStatus::Transcribed
        );
    }

    /// Cancellation lets the in-flight item finish and leaves the rest
    /// untouched in the queue
    #[tokio::test]
    async fn test_cancellation_finishes_in_flight_item_only() {
        let (store, ids) = seeded_store(3).await;
        let gate = Arc::new(Semaphore::new(0));
        let transcriber = Arc::new(ScriptedTranscriber::with_script(vec![
            Outcome::SucceedWhenReleased(gate.clone(), "finished anyway".to_string()),
        ]));
        let orchestrator = BatchOrchestrator::new(
            test_settings(1),
            collaborators(&store, transcriber.clone()),
        );

        let handle = assert_ok!(orchestrator.start(ids.clone(), None).await);

        // Wait until the first item is inside the service call.
        while transcriber.calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.cancel().await;
        gate.add_permits(1);
        let summary = handle.wait().await;

        assert!(summary.is_cancelled);
        assert!(!summary.is_running);
        assert_eq!(summary.completed, 1, "the in-flight item ran to completion");
        assert_eq!(summary.errors, 0);
        assert_eq!(transcriber.calls(), 1);

        for &id in &ids[1..] {
            assert_eq!(store.video(id).await.unwrap().status, VideoStatus::Uploaded);
            let item = summary.items.iter().find(|i| i.video_id == id).unwrap();
            assert_eq!(item.stage, Stage::Queued);
        }
    }

    /// A credential the service rejects is disabled and its item is
    /// retried on the remaining one
    #[tokio::test]
    async fn test_rejected_credential_disabled_and_item_retried() {
        init_tracing();
        let (store, ids) = seeded_store(2).await;
        let transcriber = Arc::new(ScriptedTranscriber::with_script(vec![Outcome::Fail(
            TranscribeError::Authentication("API key expired".to_string()),
        )]));
        let orchestrator = BatchOrchestrator::new(
            test_settings(2),
            collaborators(&store, transcriber.clone()),
        );

        let handle = assert_ok!(orchestrator.start(ids.clone(), None).await);
        let summary = handle.wait().await;

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.errors, 0);
        assert_eq!(transcriber.calls(), 3, "one rejection plus two successes");

        let errored = summary
            .key_statuses
            .iter()
            .filter(|k| k.state == CredentialState::Error)
            .count();
        assert_eq!(errored, 1);
    }

    /// When every credential is rejected the batch stops without losing
    /// the queued items
    #[tokio::test]
    async fn test_exhausted_rotation_stops_without_losing_items() {
        let (store, ids) = seeded_store(2).await;
        let transcriber = Arc::new(ScriptedTranscriber::with_script(vec![Outcome::Fail(
            TranscribeError::Authentication("API key expired".to_string()),
        )]));
        let orchestrator = BatchOrchestrator::new(
            test_settings(1),
            collaborators(&store, transcriber.clone()),
        );

        let handle = assert_ok!(orchestrator.start(ids.clone(), None).await);
        let summary = handle.wait().await;

        assert!(!summary.is_running);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.errors, 0);
        assert_eq!(summary.remaining(), 2);
        assert_eq!(summary.key_statuses[0].state, CredentialState::Error);
        assert!(summary.items.iter().all(|i| i.stage == Stage::Queued));

        // The attempted item's claim was released; nothing is stranded
        // in `transcribing`.
        assert_eq!(store.video(ids[0]).await.unwrap().status, VideoStatus::Uploaded);
        assert_eq!(store.video(ids[1]).await.unwrap().status, VideoStatus::Uploaded);
    }

    /// Duplicate submissions collapse to one item
    #[tokio::test]
    async fn test_duplicate_ids_processed_once() {
        let (store, ids) = seeded_store(1).await;
        let transcriber = Arc::new(ScriptedTranscriber::always_succeeding());
        let orchestrator = BatchOrchestrator::new(
            test_settings(1),
            collaborators(&store, transcriber.clone()),
        );

        let submitted = vec![ids[0], ids[0], ids[0]];
        let handle = assert_ok!(orchestrator.start(submitted, None).await);
        let summary = handle.wait().await;

        assert_eq!(summary.total, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(transcriber.calls(), 1);
        assert_eq!(store.find_by_video(ids[0]).await.unwrap().len(), 1);
    }

    /// An id with no matching row counts as done without any service
    /// call, the same as losing the claim race
    #[tokio::test]
    async fn test_unknown_video_id_skipped() {
        let (store, mut ids) = seeded_store(1).await;
        ids.push(uuid::Uuid::new_v4());

        let transcriber = Arc::new(ScriptedTranscriber::always_succeeding());
        let orchestrator = BatchOrchestrator::new(
            test_settings(1),
            collaborators(&store, transcriber.clone()),
        );

        let handle = assert_ok!(orchestrator.start(ids, None).await);
        let summary = handle.wait().await;

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.errors, 0);
        assert_eq!(transcriber.calls(), 1);
    }

    /// An empty submission finishes immediately
    #[tokio::test]
    async fn test_empty_batch_finishes_immediately() {
        let (store, _ids) = seeded_store(0).await;
        let transcriber = Arc::new(ScriptedTranscriber::always_succeeding());
        let orchestrator = BatchOrchestrator::new(
            test_settings(2),
            collaborators(&store, transcriber.clone()),
        );

        let handle = assert_ok!(orchestrator.start(Vec::new(), None).await);
        let summary = handle.wait().await;

        assert_eq!(summary.total, 0);
        assert_eq!(summary.completed, 0);
        assert!(!summary.is_running);
        assert!(summary.eta_secs.is_none());
        assert_eq!(transcriber.calls(), 0);
    }
}
