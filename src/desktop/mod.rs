//! Platform probing for the capture loop and the hover logger.
//! [GenericDesktopProbe] is the main artifact of this module, abstracting
//! the per-platform implementations behind one capability surface.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

use anyhow::Result;

/// Contract every platform backend must implement. The probe treats any of
/// these failing as degraded data, never as a fatal fault.
#[cfg_attr(test, mockall::automock)]
pub trait DesktopProbe: Send {
    /// Title of the foreground window.
    fn active_window_title(&mut self) -> Result<String>;

    /// Text of the focused element. On Windows this simulates select-all +
    /// copy and reads the clipboard back; on X11 it reads the PRIMARY
    /// selection, falling back to CLIPBOARD when PRIMARY is empty.
    fn focused_text(&mut self) -> Result<String>;

    /// Current clipboard contents.
    fn clipboard_text(&mut self) -> Result<String>;

    /// Whether the designated mouse gesture (right button held) is active.
    fn gesture_active(&mut self) -> Result<bool>;
}

/// Cross-compatible [DesktopProbe] selected at startup.
pub struct GenericDesktopProbe {
    inner: Box<dyn DesktopProbe>,
}

impl GenericDesktopProbe {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WindowsDesktopProbe;
                Ok(Self {
                    inner: Box::new(WindowsDesktopProbe::new()?),
                })
            }
            else if #[cfg(feature = "x11")] {
                use x11::X11DesktopProbe;
                Ok(Self {
                    inner: Box::new(X11DesktopProbe::new()?),
                })
            }
            else {
                // This runtime error is needed to allow the project to be compiled for during testing.
                unimplemented!("No desktop backend was specified")
            }
        }
    }
}

impl DesktopProbe for GenericDesktopProbe {
    fn active_window_title(&mut self) -> Result<String> {
        self.inner.active_window_title()
    }

    fn focused_text(&mut self) -> Result<String> {
        self.inner.focused_text()
    }

    fn clipboard_text(&mut self) -> Result<String> {
        self.inner.clipboard_text()
    }

    fn gesture_active(&mut self) -> Result<bool> {
        self.inner.gesture_active()
    }
}
