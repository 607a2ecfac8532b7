use super::{ActiveWindow, PlatformTracker};
use objc2_app_kit::NSWorkspace;

pub struct MacOSTracker;

impl Default for MacOSTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MacOSTracker {
    pub fn new() -> Self {
        Self
    }
}

impl PlatformTracker for MacOSTracker {
    #[allow(unsafe_code, reason = "objc2-app-kit exposes the NSWorkspace accessors as unsafe")]
    fn get_active_window(&self) -> Option<ActiveWindow> {
        let app = unsafe { NSWorkspace::sharedWorkspace().frontmostApplication() }?;
        let bundle_id = unsafe { app.bundleIdentifier() }.map(|id| id.to_string());
        let app_name = unsafe { app.localizedName() }
            .map_or_else(|| "Unknown".to_string(), |name| name.to_string());

        Some(ActiveWindow { app_name, bundle_id })
    }
}
