//! Full-screen OCR. A screenshot is written next to the observation files,
//! fed to the `tesseract` CLI, and deleted again whatever the outcome.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tokio::process::Command;
use tracing::warn;

fn screenshot_path(output_dir: &Path, timestamp: &str) -> PathBuf {
    output_dir.join(format!("screenshot_{timestamp}.png"))
}

/// Grabs the screen, recognizes its text, and removes the transient image.
pub async fn capture_and_recognize(output_dir: &Path, timestamp: &str) -> Result<String> {
    let path = screenshot_path(output_dir, timestamp);
    capture_screen(&path)?;
    let text = run_tesseract(&path).await;
    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("Failed to delete screenshot {path:?}: {e}");
    }
    text
}

cfg_if::cfg_if! {
    if #[cfg(any(feature = "win", feature = "x11"))] {
        fn capture_screen(path: &Path) -> Result<()> {
            let monitors = xcap::Monitor::all().context("Failed to enumerate monitors")?;
            let monitor = monitors
                .iter()
                .find(|m| m.is_primary())
                .or_else(|| monitors.first())
                .ok_or_else(|| anyhow!("No monitor available for capture"))?;
            let image = monitor.capture_image().context("Failed to capture screen")?;
            image.save(path).context("Failed to save screenshot")?;
            Ok(())
        }
    } else {
        fn capture_screen(_path: &Path) -> Result<()> {
            Err(anyhow!("Screen capture requires the win or x11 feature"))
        }
    }
}

/// Runs `tesseract <image> stdout` and returns the recognized text.
async fn run_tesseract(path: &Path) -> Result<String> {
    let output = Command::new("tesseract")
        .arg(path)
        .arg("stdout")
        .output()
        .await
        .context("Failed to launch tesseract, is it installed?")?;
    if !output.status.success() {
        return Err(anyhow!(
            "tesseract exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
