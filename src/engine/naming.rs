//! Output file naming.

use std::sync::Mutex;

use chrono::{DateTime, Local};

/// Hands out `out_<YYYYmmdd_HHMMSS>.wav` names that never repeat within the
/// process, suffixing `_<n>` when several outputs land in the same second.
#[derive(Debug, Default)]
pub struct TimestampNamer {
    last: Mutex<Option<(String, u32)>>,
}

impl TimestampNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name for an output produced at `now`.
    pub fn next_filename(&self, now: DateTime<Local>) -> String {
        let stamp = now.format("%Y%m%d_%H%M%S").to_string();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());

        let repeat = match last.as_ref() {
            Some((prev, count)) if *prev == stamp => count + 1,
            _ => 0,
        };
        *last = Some((stamp.clone(), repeat));

        if repeat == 0 {
            format!("out_{stamp}.wav")
        } else {
            format!("out_{stamp}_{repeat}.wav")
        }
    }
}

/// Console tool output name for the `counter`-th generation.
pub fn counter_filename(counter: usize) -> String {
    format!("output_{counter}.wav")
}
