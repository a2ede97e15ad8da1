use anyhow::{anyhow, Result};
use arboard::{GetExtLinux, LinuxClipboardKind};
use tracing::error;
use xcb::{
    x::{self, Atom, GetProperty, InternAtom, KeyButMask, QueryPointer, Window, ATOM_ANY},
    Connection,
};

use super::DesktopProbe;

fn intern_atom(conn: &Connection, name: &[u8]) -> Result<Atom> {
    let reply = conn.wait_for_reply(conn.send_request(&InternAtom {
        only_if_exists: false,
        name,
    }))?;
    Ok(reply.atom())
}

fn get_active_window(conn: &Connection, root: Window, active_window_atom: Atom) -> Result<Window> {
    let result = conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window: root,
        property: active_window_atom,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length: 1,
    }))?;
    let windows = result.value::<Window>();
    if windows.is_empty() {
        return Err(anyhow!("No active window reported by the window manager"));
    }
    Ok(windows[0])
}

fn get_window_name(conn: &Connection, window: Window, name_atom: Atom) -> Result<Option<String>> {
    let result = conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window,
        property: name_atom,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length: 1024,
    }))?;
    let bytes = result.value::<u8>();
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(bytes).into_owned()))
}

pub struct X11DesktopProbe {
    conn: Connection,
    root: Window,
    active_window_atom: Atom,
    net_name_atom: Atom,
    clipboard: arboard::Clipboard,
}

impl X11DesktopProbe {
    pub fn new() -> Result<Self> {
        let (conn, screen_num) = Connection::connect(None)?;
        let root = conn
            .get_setup()
            .roots()
            .nth(screen_num as usize)
            .ok_or_else(|| anyhow!("X11 screen {screen_num} is missing"))?
            .root();
        let active_window_atom = intern_atom(&conn, b"_NET_ACTIVE_WINDOW")?;
        let net_name_atom = intern_atom(&conn, b"_NET_WM_NAME")?;
        Ok(Self {
            conn,
            root,
            active_window_atom,
            net_name_atom,
            clipboard: arboard::Clipboard::new()?,
        })
    }

    fn selection_text(&mut self, kind: LinuxClipboardKind) -> Result<String> {
        match self.clipboard.get().clipboard(kind).text() {
            Ok(text) => Ok(text),
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl DesktopProbe for X11DesktopProbe {
    fn active_window_title(&mut self) -> Result<String> {
        let window = get_active_window(&self.conn, self.root, self.active_window_atom)
            .inspect_err(|e| error!("Failed to get active window {e:?}"))?;
        // EWMH name first, classic WM_NAME as fallback.
        if let Some(name) = get_window_name(&self.conn, window, self.net_name_atom)? {
            return Ok(name);
        }
        Ok(get_window_name(&self.conn, window, x::ATOM_WM_NAME)?.unwrap_or_default())
    }

    fn focused_text(&mut self) -> Result<String> {
        let primary = self.selection_text(LinuxClipboardKind::Primary)?;
        if !primary.trim().is_empty() {
            return Ok(primary);
        }
        self.selection_text(LinuxClipboardKind::Clipboard)
    }

    fn clipboard_text(&mut self) -> Result<String> {
        self.selection_text(LinuxClipboardKind::Clipboard)
    }

    fn gesture_active(&mut self) -> Result<bool> {
        let reply = self
            .conn
            .wait_for_reply(self.conn.send_request(&QueryPointer { window: self.root }))?;
        Ok(reply.mask().contains(KeyButMask::BUTTON3))
    }
}
