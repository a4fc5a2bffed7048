//! Integration tests for the sluice intake pipeline.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use sluice::config::{AccessConfig, FoldersConfig, RoutingConfig};
use sluice::error::{ForwardError, ForwardStatusSnafu, NotifyError};
use sluice::forward::Forwarder;
use sluice::notify::Notifier;
use sluice::pipeline::{Orchestrator, PipelineContext};

/// Notifier recording every (file, reason) pair it is handed.
#[derive(Default)]
struct RecordingNotifier {
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_failure(&self, file_name: &str, reason: &str) -> Result<(), NotifyError> {
        self.calls
            .lock()
            .unwrap()
            .push((file_name.to_string(), reason.to_string()));
        Ok(())
    }
}

/// Forwarder recording every path it is handed; optionally always failing.
struct RecordingForwarder {
    calls: Mutex<Vec<PathBuf>>,
    fail: bool,
}

impl RecordingForwarder {
    fn succeeding() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn forward(&self, path: &Path) -> Result<(), ForwardError> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        if self.fail {
            return ForwardStatusSnafu { status: 503u16 }.fail();
        }
        Ok(())
    }
}

/// One pipeline instance over a fresh temp folder layout, with retry
/// delays collapsed so failure paths run instantly.
struct Fixture {
    temp: TempDir,
    orchestrator: Orchestrator,
    notifier: Arc<RecordingNotifier>,
    forwarder: Arc<RecordingForwarder>,
}

impl Fixture {
    fn new(forwarder: RecordingForwarder) -> Self {
        let temp = TempDir::new().unwrap();
        let folders = FoldersConfig {
            watched: temp.path().join("data"),
            processing: temp.path().join("processing"),
            validated: temp.path().join("validated"),
            returns: temp.path().join("returns"),
            logs: temp.path().join("logs"),
        };
        for folder in [
            &folders.watched,
            &folders.processing,
            &folders.validated,
            &folders.returns,
        ] {
            std::fs::create_dir_all(folder).unwrap();
        }

        let access = AccessConfig {
            max_attempts: 2,
            delay_secs: 0,
        };
        let routing = RoutingConfig { max_attempts: 2 };
        let ctx = PipelineContext::new(folders, access, routing);

        let notifier = Arc::new(RecordingNotifier::default());
        let forwarder = Arc::new(forwarder);
        let orchestrator = Orchestrator::new(ctx, notifier.clone(), forwarder.clone(), 3)
            .with_forward_backoff(Duration::ZERO);

        Self {
            temp,
            orchestrator,
            notifier,
            forwarder,
        }
    }

    fn drop_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.temp.path().join("data").join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn folder_entries(&self, folder: &str) -> Vec<PathBuf> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(self.temp.path().join(folder))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        entries.sort();
        entries
    }
}

mod success_path {
    use super::*;

    const VALID_FLAT: &[u8] = br#"{"OperatorID":"OP12345","CustomerID":"CUST0001","CustomerCardNumber":"4111111111111111"}"#;

    #[tokio::test]
    async fn test_valid_flat_record_reaches_validated_folder() {
        let fixture = Fixture::new(RecordingForwarder::succeeding());
        let original = fixture.drop_file("in.json", VALID_FLAT);

        assert!(fixture.orchestrator.process_file(&original).await);

        // Original consumed, staged copy cleaned up
        assert!(!original.exists());
        assert!(fixture.folder_entries("processing").is_empty());

        // Exactly one validated file, renamed with an 8-char prefix,
        // byte-identical to the input
        let validated = fixture.folder_entries("validated");
        assert_eq!(validated.len(), 1);
        let name = validated[0].file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("_in.json"));
        assert_eq!(name.len(), "in.json".len() + 9);
        assert_eq!(std::fs::read(&validated[0]).unwrap(), VALID_FLAT);

        // Forwarded once with the validated path, no notification
        assert_eq!(fixture.forwarder.calls(), vec![validated[0].clone()]);
        assert!(fixture.notifier.calls().is_empty());
        assert!(fixture.folder_entries("returns").is_empty());
    }

    #[tokio::test]
    async fn test_valid_nested_record_reaches_validated_folder() {
        let fixture = Fixture::new(RecordingForwarder::succeeding());
        let original = fixture.drop_file(
            "nested.json",
            br#"{"OperatorID":"OP12345","Customer":{"CustomerID":"CUST0001","CustomerCardNumber":"4111111111111111","CustomerDetails":{"tier":"gold"}}}"#,
        );

        assert!(fixture.orchestrator.process_file(&original).await);

        assert_eq!(fixture.folder_entries("validated").len(), 1);
        assert_eq!(fixture.forwarder.calls().len(), 1);
        assert!(fixture.notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_forwarding_failure_leaves_validated_file_final() {
        let fixture = Fixture::new(RecordingForwarder::failing());
        let original = fixture.drop_file("in.json", VALID_FLAT);

        // Processing reports the standing failure...
        assert!(!fixture.orchestrator.process_file(&original).await);

        // ...but the validated copy stays put and no notification is sent
        assert_eq!(fixture.folder_entries("validated").len(), 1);
        assert!(fixture.folder_entries("returns").is_empty());
        assert!(fixture.notifier.calls().is_empty());
        // All three configured attempts were spent
        assert_eq!(fixture.forwarder.calls().len(), 3);
    }
}

mod failure_path {
    use super::*;

    #[tokio::test]
    async fn test_malformed_json_routes_original_bytes_to_returns() {
        let fixture = Fixture::new(RecordingForwarder::succeeding());
        let content = b"{ this is not json";
        let original = fixture.drop_file("bad.json", content);

        assert!(!fixture.orchestrator.process_file(&original).await);

        let returns = fixture.folder_entries("returns");
        assert_eq!(returns.len(), 1);
        assert_eq!(std::fs::read(&returns[0]).unwrap(), content);

        let calls = fixture.notifier.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.contains("Invalid JSON format"));

        assert!(fixture.folder_entries("validated").is_empty());
        assert!(fixture.forwarder.calls().is_empty());
        assert!(fixture.folder_entries("processing").is_empty());
    }

    #[tokio::test]
    async fn test_schema_rejection_notifies_with_field_violation() {
        let fixture = Fixture::new(RecordingForwarder::succeeding());
        // OperatorID fails the alphanumeric/length constraints
        let original = fixture.drop_file(
            "short-op.json",
            br#"{"OperatorID":"op","Customer":{"CustomerID":"CUST0001","CustomerCardNumber":"4111111111111111"}}"#,
        );

        assert!(!fixture.orchestrator.process_file(&original).await);

        assert_eq!(fixture.folder_entries("returns").len(), 1);
        assert!(fixture.folder_entries("validated").is_empty());
        assert!(fixture.forwarder.calls().is_empty());

        let calls = fixture.notifier.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.ends_with("_short-op.json"));
        assert!(calls[0].1.contains("OperatorID"));
    }

    #[tokio::test]
    async fn test_rejection_reason_never_contains_card_number() {
        let fixture = Fixture::new(RecordingForwarder::succeeding());
        // Card number one character short
        let original = fixture.drop_file(
            "short-card.json",
            br#"{"OperatorID":"OP12345","CustomerID":"CUST0001","CustomerCardNumber":"411111111111111"}"#,
        );

        fixture.orchestrator.process_file(&original).await;

        let calls = fixture.notifier.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].1.contains("411111111111111"));
        assert!(calls[0].1.contains("length/format invalid"));
    }

    #[tokio::test]
    async fn test_unreadable_file_is_never_staged() {
        let fixture = Fixture::new(RecordingForwarder::succeeding());
        let missing = fixture.temp.path().join("data").join("never-arrived.json");

        assert!(!fixture.orchestrator.process_file(&missing).await);

        assert!(fixture.folder_entries("processing").is_empty());
        assert!(fixture.folder_entries("validated").is_empty());
        assert!(fixture.folder_entries("returns").is_empty());
        assert!(fixture.notifier.calls().is_empty());
        // Tracker entry released despite the early abort
        assert!(fixture.orchestrator.context().tracker.is_empty());
    }
}

mod duplicate_suppression {
    use super::*;

    const VALID_FLAT: &[u8] = br#"{"OperatorID":"OP12345","CustomerID":"CUST0001","CustomerCardNumber":"4111111111111111"}"#;

    #[tokio::test]
    async fn test_concurrent_duplicate_event_is_dropped() {
        let fixture = Fixture::new(RecordingForwarder::succeeding());
        let original = fixture.drop_file("in.json", VALID_FLAT);

        let (first, second) = tokio::join!(
            fixture.orchestrator.process_file(&original),
            fixture.orchestrator.process_file(&original),
        );

        // Exactly one attempt won; the other was a dropped no-op
        assert!(first ^ second);
        assert_eq!(fixture.folder_entries("validated").len(), 1);
        assert_eq!(fixture.forwarder.calls().len(), 1);
        assert!(fixture.notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_late_duplicate_finds_nothing_to_stage() {
        let fixture = Fixture::new(RecordingForwarder::succeeding());
        let original = fixture.drop_file("in.json", VALID_FLAT);

        assert!(fixture.orchestrator.process_file(&original).await);
        // Second event for a path whose file was already consumed
        assert!(!fixture.orchestrator.process_file(&original).await);

        assert_eq!(fixture.folder_entries("validated").len(), 1);
        assert_eq!(fixture.forwarder.calls().len(), 1);
    }
}

mod collision_resolution {
    use super::*;

    #[tokio::test]
    async fn test_same_named_rejects_are_both_retrievable() {
        let fixture = Fixture::new(RecordingForwarder::succeeding());

        // Two malformed files dropped under the same name, sequentially
        let first = fixture.drop_file("dup.json", b"not json at all");
        fixture.orchestrator.process_file(&first).await;
        let second = fixture.drop_file("dup.json", b"also not json");
        fixture.orchestrator.process_file(&second).await;

        // Unique staging prefixes keep the two apart in returns
        let returns = fixture.folder_entries("returns");
        assert_eq!(returns.len(), 2);
        let contents: Vec<Vec<u8>> = returns
            .iter()
            .map(|path| std::fs::read(path).unwrap())
            .collect();
        assert!(contents.contains(&b"not json at all".to_vec()));
        assert!(contents.contains(&b"also not json".to_vec()));
        assert_eq!(fixture.notifier.calls().len(), 2);
    }
}

mod startup_recovery {
    use super::*;
    use sluice::recovery::sweep_processing_area;

    #[tokio::test]
    async fn test_orphaned_files_move_to_returns_before_watching() {
        let temp = TempDir::new().unwrap();
        let processing = temp.path().join("processing");
        let returns = temp.path().join("returns");
        std::fs::create_dir_all(&processing).unwrap();
        std::fs::create_dir_all(&returns).unwrap();

        std::fs::write(processing.join("aaaa0000_one.json"), b"{\"n\":1}").unwrap();
        std::fs::write(processing.join("bbbb1111_two.json"), b"{\"n\":2}").unwrap();
        std::fs::write(processing.join("cccc2222_three.json"), b"{\"n\":3}").unwrap();

        let moved = sweep_processing_area(&processing, &returns, 3).await;

        assert_eq!(moved, 3);
        assert_eq!(std::fs::read_dir(&processing).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(&returns).unwrap().count(), 3);
        assert_eq!(
            std::fs::read(returns.join("bbbb1111_two.json")).unwrap(),
            b"{\"n\":2}"
        );
    }
}

mod polled_pipeline {
    use super::*;
    use sluice::Config;
    use sluice::pipeline::IntakeProcessor;
    use sluice_core::polling::{IterationResult, PollingProcessor};
    use tokio_util::sync::CancellationToken;

    fn config_for(temp: &TempDir) -> Config {
        let yaml = format!(
            r#"
folders:
  watched: "{base}/data"
  processing: "{base}/processing"
  validated: "{base}/validated"
  returns: "{base}/returns"
  logs: "{base}/logs"
access:
  max_attempts: 2
  delay_secs: 0
routing:
  max_attempts: 2
notification:
  webhook_url: "https://hooks.example.com/intake"
  credential: "token-123"
forwarding:
  endpoint: "https://api.example.com/upload"
"#,
            base = temp.path().display()
        );
        let config = Config::parse(&yaml).unwrap();
        config.ensure_folders().unwrap();
        config
    }

    #[tokio::test]
    async fn test_cold_start_recovers_then_drains_watched_folder() {
        let temp = TempDir::new().unwrap();
        let config = config_for(&temp);

        // An orphan from a "previous run" and a fresh valid drop
        std::fs::write(
            temp.path().join("processing").join("dead_orphan.json"),
            b"interrupted",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("data").join("fresh.json"),
            br#"{"OperatorID":"OP12345","CustomerID":"CUST0001","CustomerCardNumber":"4111111111111111"}"#,
        )
        .unwrap();
        // Non-JSON files are not picked up
        std::fs::write(temp.path().join("data").join("notes.txt"), b"ignore me").unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let forwarder = Arc::new(RecordingForwarder::succeeding());
        let mut processor = IntakeProcessor::new(
            &config,
            notifier.clone(),
            forwarder.clone(),
            CancellationToken::new(),
        );

        // First iteration: recovery sweep runs, then the drop is listed
        let state = processor.prepare(true).await.unwrap().unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(
            std::fs::read(temp.path().join("returns").join("dead_orphan.json")).unwrap(),
            b"interrupted"
        );

        let outcome = processor.process(state).await.unwrap();
        assert_eq!(outcome, IterationResult::ProcessedItems);

        assert_eq!(
            std::fs::read_dir(temp.path().join("validated")).unwrap().count(),
            1
        );
        assert_eq!(forwarder.calls().len(), 1);
        assert!(notifier.calls().is_empty());
        // The ignored .txt file is still sitting in the watched folder
        assert!(temp.path().join("data").join("notes.txt").exists());

        // Next poll finds nothing
        assert!(processor.prepare(false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_one_bad_file_does_not_halt_the_iteration() {
        let temp = TempDir::new().unwrap();
        let config = config_for(&temp);

        std::fs::write(temp.path().join("data").join("a-bad.json"), b"not json").unwrap();
        std::fs::write(
            temp.path().join("data").join("b-good.json"),
            br#"{"OperatorID":"OP12345","CustomerID":"CUST0001","CustomerCardNumber":"4111111111111111"}"#,
        )
        .unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let forwarder = Arc::new(RecordingForwarder::succeeding());
        let mut processor = IntakeProcessor::new(
            &config,
            notifier.clone(),
            forwarder.clone(),
            CancellationToken::new(),
        );

        let state = processor.prepare(true).await.unwrap().unwrap();
        assert_eq!(state.len(), 2);
        processor.process(state).await.unwrap();

        assert_eq!(
            std::fs::read_dir(temp.path().join("returns")).unwrap().count(),
            1
        );
        assert_eq!(
            std::fs::read_dir(temp.path().join("validated")).unwrap().count(),
            1
        );
        assert_eq!(notifier.calls().len(), 1);
        assert_eq!(forwarder.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_mid_iteration_stops_between_files() {
        let temp = TempDir::new().unwrap();
        let config = config_for(&temp);

        std::fs::write(temp.path().join("data").join("later.json"), b"{}").unwrap();

        let shutdown = CancellationToken::new();
        let mut processor = IntakeProcessor::new(
            &config,
            Arc::new(RecordingNotifier::default()),
            Arc::new(RecordingForwarder::succeeding()),
            shutdown.clone(),
        );

        let state = processor.prepare(true).await.unwrap().unwrap();
        shutdown.cancel();
        let outcome = processor.process(state).await.unwrap();

        assert_eq!(outcome, IterationResult::Shutdown);
        // Nothing was touched after the cancellation point
        assert!(temp.path().join("data").join("later.json").exists());
    }
}
