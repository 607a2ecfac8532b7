pub mod types;

pub use types::{ActiveWindow, PlatformTracker};

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub use macos::MacOSTracker as NativeTracker;

#[cfg(target_os = "linux")]
pub use linux::LinuxTracker as NativeTracker;

// Platforms without a foreground API record nothing; the probe then reports
// Unknown and no usage is ever accounted.
#[cfg(not(any(target_os = "macos", target_os = "linux")))]
pub struct NativeTracker;

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
impl PlatformTracker for NativeTracker {
    fn get_active_window(&self) -> Option<ActiveWindow> {
        None
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
impl NativeTracker {
    pub fn new() -> Self { Self }
}
