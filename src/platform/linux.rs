use super::{ActiveWindow, PlatformTracker};
use log::warn;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ConnectionExt, Window};

pub struct LinuxTracker {
    conn: Option<x11rb::rust_connection::RustConnection>,
    root: Window,
}

impl Default for LinuxTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxTracker {
    pub fn new() -> Self {
        match x11rb::connect(None) {
            Ok((conn, screen_num)) => {
                let Some(root) = conn.setup().roots.get(screen_num).map(|s| s.root) else {
                    warn!(
                        "Invalid screen number {screen_num} ({} screens available). Foreground tracking disabled.",
                        conn.setup().roots.len()
                    );
                    return Self { conn: None, root: 0 };
                };
                Self {
                    conn: Some(conn),
                    root,
                }
            }
            Err(e) => {
                // Wayland and headless sessions land here; the recorder then
                // writes nothing and the probe reports Unknown.
                warn!("Failed to connect to X server: {e}. Foreground tracking disabled.");
                Self { conn: None, root: 0 }
            }
        }
    }

    fn get_atom(&self, name: &str) -> Option<u32> {
        self.conn.as_ref()?
            .intern_atom(false, name.as_bytes())
            .ok()?
            .reply()
            .ok()
            .map(|r| r.atom)
    }

    fn get_window_property(&self, window: Window, atom: u32) -> Option<String> {
        let reply = self.conn.as_ref()?
            .get_property(false, window, atom, AtomEnum::ANY, 0, 1024)
            .ok()?
            .reply()
            .ok()?;

        if reply.value.is_empty() {
            return None;
        }

        String::from_utf8(reply.value).ok()
    }

    fn get_active_window_id(&self) -> Option<Window> {
        let conn = self.conn.as_ref()?;
        let atom = self.get_atom("_NET_ACTIVE_WINDOW")?;
        let reply = conn
            .get_property(false, self.root, atom, AtomEnum::WINDOW, 0, 1)
            .ok()?
            .reply()
            .ok()?;

        let bytes: [u8; 4] = reply.value.get(..4)?.try_into().ok()?;
        let window = u32::from_ne_bytes(bytes);
        // 0 means no window has focus (e.g. the desktop)
        (window != 0).then_some(window)
    }
}

/// WM_CLASS holds "instance\0class\0"; the instance name identifies the app.
fn parse_wm_class(raw: &str) -> Option<&str> {
    raw.split('\0').next().filter(|s| !s.is_empty())
}

impl PlatformTracker for LinuxTracker {
    fn get_active_window(&self) -> Option<ActiveWindow> {
        let window_id = self.get_active_window_id()?;

        let class_atom = AtomEnum::WM_CLASS.into();
        let raw_class = self.get_window_property(window_id, class_atom)?;
        let app_name = parse_wm_class(&raw_class)?.to_string();

        Some(ActiveWindow {
            app_name,
            bundle_id: None,
        })
    }
}
