//! The capture side of the probe process. Each tick reads the desktop
//! signals in a fixed order, assembles one [Observation], and hands it to the
//! store. A failed signal becomes an error string inside the observation,
//! never a failed tick.

pub mod ocr;

use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    desktop::DesktopProbe,
    store::{entities::Observation, ActivityStore},
    utils::{clock::Clock, time::timestamp_slug},
};

pub const DEFAULT_CAPTURE_INTERVAL: Duration = Duration::from_secs(20);

/// Entry point for the probe process: capture loop plus signal handling.
pub async fn start_probe(application_dir: std::path::PathBuf) -> Result<()> {
    use crate::{desktop::GenericDesktopProbe, monitor::shutdown, utils::clock::DefaultClock};

    let desktop = GenericDesktopProbe::new()?;
    let store = ActivityStore::new(crate::utils::dir::output_dir(&application_dir))?;

    let shutdown_token = CancellationToken::new();
    let module = CaptureModule::new(
        Box::new(desktop),
        store,
        shutdown_token.clone(),
        DEFAULT_CAPTURE_INTERVAL,
        Box::new(DefaultClock),
    );

    let (_, capture_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        module.run(),
    );
    capture_result
}

pub struct CaptureModule {
    desktop: Box<dyn DesktopProbe>,
    store: ActivityStore,
    shutdown: CancellationToken,
    capture_interval: Duration,
    clock: Box<dyn Clock>,
}

impl CaptureModule {
    pub fn new(
        desktop: Box<dyn DesktopProbe>,
        store: ActivityStore,
        shutdown: CancellationToken,
        capture_interval: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            desktop,
            store,
            shutdown,
            capture_interval,
            clock,
        }
    }

    async fn capture(&mut self) -> Observation {
        let timestamp = timestamp_slug(self.clock.time());

        let active_window = field_or_error(self.desktop.active_window_title());
        let focused_text = field_or_error(self.desktop.focused_text());
        let clipboard = field_or_error(self.desktop.clipboard_text());
        let ocr_text = field_or_error(
            ocr::capture_and_recognize(self.store.dir(), &timestamp).await,
        );

        Observation {
            timestamp,
            active_window,
            focused_text,
            clipboard,
            ocr_text,
        }
    }

    /// Executes the capture event loop until cancelled.
    pub async fn run(mut self) -> Result<()> {
        let mut capture_point = self.clock.instant();
        loop {
            capture_point += self.capture_interval;

            let observation = self.capture().await;
            debug!("Captured observation {}", observation.timestamp);
            match self.store.write_observation(&observation).await {
                Ok(()) => info!("Stored observation {}", observation.timestamp),
                Err(e) => error!("Failed to store observation: {e:?}"),
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep_until(capture_point) => ()
            }
        }
    }
}

fn field_or_error(result: Result<String>) -> String {
    match result {
        Ok(v) => v,
        Err(e) => format!("[capture error: {e}]"),
    }
}
