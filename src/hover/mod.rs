//! Gesture-triggered interaction logging, run as its own utility process.
//! Unlike the capture probe this is not timer-driven: a record is appended
//! only when the user performs the designated mouse gesture.

use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    desktop::DesktopProbe,
    store::{entities::HoverRecord, ActivityStore},
    utils::clock::Clock,
};

pub const GESTURE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Entry point for the hover logger process.
pub async fn start_hover_logger(application_dir: std::path::PathBuf) -> Result<()> {
    use crate::{
        desktop::GenericDesktopProbe, monitor::shutdown, utils::clock::DefaultClock,
        utils::dir::output_dir,
    };

    let desktop = GenericDesktopProbe::new()?;
    let store = ActivityStore::new(output_dir(&application_dir))?;
    println!("Right-click to log the focused text, press Ctrl+C to stop");

    let shutdown_token = CancellationToken::new();
    let logger = HoverLogger::new(
        Box::new(desktop),
        store,
        shutdown_token.clone(),
        GESTURE_POLL_INTERVAL,
        Box::new(DefaultClock),
    );

    let (_, logger_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        logger.run(),
    );
    logger_result
}
const HOVER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct HoverLogger {
    desktop: Box<dyn DesktopProbe>,
    store: ActivityStore,
    shutdown: CancellationToken,
    poll_interval: Duration,
    clock: Box<dyn Clock>,
    /// Re-arms once the gesture is released, so one press logs one record.
    armed: bool,
}

impl HoverLogger {
    pub fn new(
        desktop: Box<dyn DesktopProbe>,
        store: ActivityStore,
        shutdown: CancellationToken,
        poll_interval: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            desktop,
            store,
            shutdown,
            poll_interval,
            clock,
            armed: true,
        }
    }

    async fn handle_gesture(&mut self) -> Result<()> {
        let timestamp = self
            .clock
            .time()
            .format(HOVER_TIMESTAMP_FORMAT)
            .to_string();
        let active_window = self.desktop.active_window_title().unwrap_or_else(|e| {
            warn!("Failed to read window title: {e:?}");
            format!("[capture error: {e}]")
        });
        let foctext = self.desktop.focused_text().unwrap_or_else(|e| {
            warn!("Failed to read focused text: {e:?}");
            format!("[capture error: {e}]")
        });
        if foctext.trim().is_empty() {
            info!("Gesture produced no text, skipping record");
            return Ok(());
        }

        self.store
            .append_hover_record(HoverRecord {
                timestamp: timestamp.clone(),
                active_window,
                foctext,
            })
            .await?;
        println!("Logged interaction at {timestamp}");
        Ok(())
    }

    pub async fn run(mut self) -> Result<()> {
        loop {
            match self.desktop.gesture_active() {
                Ok(true) if self.armed => {
                    self.armed = false;
                    if let Err(e) = self.handle_gesture().await {
                        error!("Failed to log interaction: {e:?}");
                    }
                }
                Ok(false) => self.armed = true,
                Ok(true) => {}
                Err(e) => error!("Failed to poll gesture state: {e:?}"),
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
