use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-filename suppression window. Only events that actually fire move the
/// window forward; suppressed ones are forgotten.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last_fired: HashMap<String, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: HashMap::new(),
        }
    }

    pub fn should_fire(&mut self, filename: &str, now: Instant) -> bool {
        if let Some(last) = self.last_fired.get(filename) {
            if now.saturating_duration_since(*last) < self.window {
                return false;
            }
        }
        self.last_fired.insert(filename.to_string(), now);
        true
    }
}

pub fn is_zone_file(filename: &str, forward_suffix: &str, reverse_suffix: &str) -> bool {
    filename.ends_with(forward_suffix) || filename.ends_with(reverse_suffix)
}
