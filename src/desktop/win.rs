use std::{thread::sleep, time::Duration};

use anyhow::{anyhow, Result};
use tracing::error;
use windows::Win32::UI::{
    Input::KeyboardAndMouse::{
        GetAsyncKeyState, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP,
        VIRTUAL_KEY, VK_CONTROL, VK_RBUTTON,
    },
    WindowsAndMessaging::{GetForegroundWindow, GetWindowTextW},
};

use super::DesktopProbe;

const VK_A: VIRTUAL_KEY = VIRTUAL_KEY(0x41);
const VK_C: VIRTUAL_KEY = VIRTUAL_KEY(0x43);

pub fn get_active_title() -> Result<String> {
    let window = unsafe { GetForegroundWindow() };
    if window.is_invalid() {
        return Err(anyhow!("Failed to get foreground window"));
    }

    let mut text: [u16; 4096] = [0; 4096];
    let len = unsafe { GetWindowTextW(window, &mut text) };
    Ok(String::from_utf16_lossy(&text[..len as usize]))
}

fn key_input(key: VIRTUAL_KEY, up: bool) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: key,
                dwFlags: if up {
                    KEYEVENTF_KEYUP
                } else {
                    Default::default()
                },
                ..Default::default()
            },
        },
    }
}

/// Injects Ctrl+A followed by Ctrl+C into the focused window.
fn send_select_all_copy() -> Result<()> {
    let sequence = [
        key_input(VK_CONTROL, false),
        key_input(VK_A, false),
        key_input(VK_A, true),
        key_input(VK_C, false),
        key_input(VK_C, true),
        key_input(VK_CONTROL, true),
    ];
    let sent = unsafe { SendInput(&sequence, size_of::<INPUT>() as i32) };
    if sent != sequence.len() as u32 {
        return Err(anyhow!("SendInput injected {sent} of {} events", sequence.len()));
    }
    Ok(())
}

pub struct WindowsDesktopProbe {
    clipboard: arboard::Clipboard,
}

impl WindowsDesktopProbe {
    pub fn new() -> Result<Self> {
        Ok(Self {
            clipboard: arboard::Clipboard::new()?,
        })
    }
}

impl DesktopProbe for WindowsDesktopProbe {
    fn active_window_title(&mut self) -> Result<String> {
        get_active_title().inspect_err(|e| error!("Failed to get active window {e:?}"))
    }

    fn focused_text(&mut self) -> Result<String> {
        send_select_all_copy()?;
        // Give the focused application a moment to service the copy.
        sleep(Duration::from_millis(200));
        self.clipboard_text()
    }

    fn clipboard_text(&mut self) -> Result<String> {
        match self.clipboard.get_text() {
            Ok(text) => Ok(text),
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn gesture_active(&mut self) -> Result<bool> {
        let state = unsafe { GetAsyncKeyState(VK_RBUTTON.0 as i32) };
        Ok((state as u16 & 0x8000) != 0)
    }
}
