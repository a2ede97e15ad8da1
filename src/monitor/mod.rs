//! The orchestrating process: spawns the capture probe, polls the latest
//! observation slot on a fixed interval, and classifies every new
//! observation exactly once.

pub mod probe_process;
pub mod shutdown;

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use ansi_term::Colour;
use probe_process::{ProbeProcess, TERMINATION_GRACE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    classify::{Classifier, ClassifierConfig},
    store::{entities::Verdict, ActivityStore},
    utils::{
        clock::{Clock, DefaultClock},
        dir::output_dir,
    },
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Represents the starting point for the continuous monitor.
pub async fn start_monitor(application_dir: PathBuf) -> Result<()> {
    // The credential is the one fatal configuration error, checked before
    // anything is spawned.
    let classifier = Classifier::new(ClassifierConfig::from_env()?)?;
    let store = ActivityStore::new(output_dir(&application_dir))?;

    let probe = ProbeProcess::spawn(&application_dir)?;
    println!("Activity monitor started, press Ctrl+C to stop");

    let shutdown_token = CancellationToken::new();
    let module = MonitorModule::new(
        store,
        classifier,
        shutdown_token.clone(),
        DEFAULT_POLL_INTERVAL,
        Box::new(DefaultClock),
    );

    let (_, run_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        module.run(),
    );

    // The child must not outlive the monitor, even when the loop errored.
    if let Err(e) = probe.shutdown(TERMINATION_GRACE).await {
        error!("Failed to shut down the capture probe: {e:?}");
    }
    println!("Activity monitor stopped");

    run_result
}

pub struct MonitorModule {
    store: ActivityStore,
    classifier: Classifier,
    shutdown: CancellationToken,
    poll_interval: Duration,
    clock: Box<dyn Clock>,
    last_seen: Option<String>,
}

impl MonitorModule {
    pub fn new(
        store: ActivityStore,
        classifier: Classifier,
        shutdown: CancellationToken,
        poll_interval: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            store,
            classifier,
            shutdown,
            poll_interval,
            clock,
            last_seen: None,
        }
    }

    /// One poll of the latest-observation slot. Classifies and persists only
    /// when the observation timestamp differs from the last one handled, so
    /// an unchanged slot costs nothing.
    pub async fn poll_once(&mut self) -> Result<Option<Verdict>> {
        let Some(observation) = self.store.read_latest_observation().await else {
            return Ok(None);
        };
        if self.last_seen.as_deref() == Some(observation.timestamp.as_str()) {
            return Ok(None);
        }
        // Mark the timestamp as handled before classifying: a failure to
        // persist the verdict must not re-classify the same observation on
        // the next poll.
        self.last_seen = Some(observation.timestamp.clone());

        info!("Classifying observation {}", observation.timestamp);
        let verdict = self.classifier.classify(&observation).await;
        self.store.write_verdict(&verdict).await?;
        Ok(Some(verdict))
    }

    /// Executes the polling loop until cancelled. Classification failures
    /// degrade into unknown verdicts upstream, so nothing on the
    /// classification path breaks the loop.
    pub async fn run(mut self) -> Result<()> {
        loop {
            match self.poll_once().await {
                Ok(Some(verdict)) => print_live_verdict(&verdict),
                Ok(None) => debug!("No new observation"),
                Err(e) => error!("Failed to persist verdict: {e:?}"),
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep(self.poll_interval) => ()
            }
        }
    }
}

fn print_live_verdict(verdict: &Verdict) {
    println!(
        "{} {} (confidence {:.2})",
        Colour::Cyan.paint("Activity:"),
        Colour::Green.bold().paint(verdict.activity.to_string()),
        verdict.confidence,
    );
    if !verdict.description.is_empty() {
        println!("  {}", verdict.description);
    }
}

#[cfg(test)]
mod monitor_tests {
    use tempfile::tempdir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::{
        store::entities::{Activity, Observation},
        utils::logging::TEST_LOGGING,
    };

    fn classifier_for(server: &MockServer) -> Classifier {
        Classifier::with_base_url(ClassifierConfig::new("test-api-key".into()), server.uri())
            .unwrap()
    }

    fn module(store: ActivityStore, classifier: Classifier) -> MonitorModule {
        MonitorModule::new(
            store,
            classifier,
            CancellationToken::new(),
            Duration::from_millis(10),
            Box::new(DefaultClock),
        )
    }

    fn observation(timestamp: &str) -> Observation {
        Observation {
            timestamp: timestamp.into(),
            active_window: "slack".into(),
            focused_text: "hey, lunch?".into(),
            ..Default::default()
        }
    }

    fn messaging_reply() -> serde_json::Value {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": r#"{
                "activity": "messaging",
                "confidence": 0.8,
                "description": "Chatting in Slack",
                "details": "",
                "data_sources": "Active window",
                "timestamp": 0.0
            }"# }] } }]
        })
    }

    #[tokio::test]
    async fn unchanged_observation_is_classified_once() -> Result<()> {
        *TEST_LOGGING;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(messaging_reply()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let store = ActivityStore::new(dir.path().to_path_buf())?;
        store
            .write_observation(&observation("2025-03-15_10-00-00"))
            .await?;

        let mut module = module(
            ActivityStore::new(dir.path().to_path_buf())?,
            classifier_for(&server),
        );

        let first = module.poll_once().await?;
        assert_eq!(first.unwrap().activity, Activity::Messaging);
        for _ in 0..3 {
            assert!(module.poll_once().await?.is_none());
        }
        Ok(())
    }

    #[tokio::test]
    async fn new_timestamp_triggers_another_classification() -> Result<()> {
        *TEST_LOGGING;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(messaging_reply()))
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let store = ActivityStore::new(dir.path().to_path_buf())?;
        let mut module = module(
            ActivityStore::new(dir.path().to_path_buf())?,
            classifier_for(&server),
        );

        store
            .write_observation(&observation("2025-03-15_10-00-00"))
            .await?;
        assert!(module.poll_once().await?.is_some());

        store
            .write_observation(&observation("2025-03-15_10-00-20"))
            .await?;
        assert!(module.poll_once().await?.is_some());
        assert!(module.poll_once().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn unwritable_verdict_slot_does_not_reclassify() -> Result<()> {
        *TEST_LOGGING;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(messaging_reply()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let store = ActivityStore::new(dir.path().to_path_buf())?;
        store
            .write_observation(&observation("2025-03-15_10-00-00"))
            .await?;
        // A directory in the verdict slot's place makes every persist fail.
        tokio::fs::create_dir(dir.path().join(crate::store::LIVE_VERDICT_FILE)).await?;

        let mut module = module(
            ActivityStore::new(dir.path().to_path_buf())?,
            classifier_for(&server),
        );

        assert!(module.poll_once().await.is_err());
        // The timestamp was handled, failed persistence or not; further
        // polls of the unchanged slot must not call the model again.
        assert!(module.poll_once().await?.is_none());
        assert!(module.poll_once().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn missing_slot_is_no_data_not_an_error() -> Result<()> {
        *TEST_LOGGING;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(messaging_reply()))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let mut module = module(
            ActivityStore::new(dir.path().to_path_buf())?,
            classifier_for(&server),
        );
        assert!(module.poll_once().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn verdict_is_persisted_to_the_live_slot() -> Result<()> {
        *TEST_LOGGING;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(messaging_reply()))
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let store = ActivityStore::new(dir.path().to_path_buf())?;
        store
            .write_observation(&observation("2025-03-15_10-00-00"))
            .await?;

        let mut module = module(
            ActivityStore::new(dir.path().to_path_buf())?,
            classifier_for(&server),
        );
        module.poll_once().await?;

        let persisted = store.read_verdict().await.unwrap();
        assert_eq!(persisted.activity, Activity::Messaging);
        assert!(persisted.timestamp > 0.0);
        Ok(())
    }
}
