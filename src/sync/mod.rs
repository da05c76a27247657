pub mod debounce;
pub mod notifier;
pub mod watcher;

pub use debounce::{is_zone_file, Debouncer};
pub use notifier::{PushReport, SecondaryNotifier};
pub use watcher::ZoneWatcher;
