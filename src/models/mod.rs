pub mod foreground_event;

pub use foreground_event::{EventKind, ForegroundEvent};
