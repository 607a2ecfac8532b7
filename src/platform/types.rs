#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveWindow {
    pub app_name: String,
    pub bundle_id: Option<String>,
}

impl ActiveWindow {
    /// Stable identifier for the app: the bundle id where the platform has
    /// one, the window class otherwise.
    pub fn app_id(&self) -> &str {
        self.bundle_id.as_deref().unwrap_or(&self.app_name)
    }
}

pub trait PlatformTracker: Send + Sync {
    fn get_active_window(&self) -> Option<ActiveWindow>;
}
