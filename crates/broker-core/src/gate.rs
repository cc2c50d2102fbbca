//! Anti-stampede throttle on top of [`crate::launcher::LauncherPort`]: at
//! most one provisioning request per category per startup window.

use std::collections::HashMap;

use crate::category::WorkerCategory;

/// Tracks the last time capacity was requested for each category.
#[derive(Debug)]
pub(crate) struct ProvisionGate {
    last_request_millis: HashMap<WorkerCategory, i64>,
    startup_window_millis: i64,
}

impl ProvisionGate {
    /// Builds a gate with the given startup window: the minimum time a
    /// category must wait between provisioning requests, long enough for a
    /// freshly launched worker to boot and start polling.
    pub(crate) fn new(startup_window_millis: i64) -> Self {
        Self {
            last_request_millis: HashMap::new(),
            startup_window_millis,
        }
    }

    /// Returns true and records `now_millis` against `category` if enough
    /// time has passed since the last request for it. The caller is
    /// expected to roll the record back with [`Self::clear`] if the
    /// provisioning attempt this permitted turns out to fail.
    pub(crate) fn should_request(&mut self, category: &WorkerCategory, now_millis: i64) -> bool {
        if let Some(&last) = self.last_request_millis.get(category) {
            if now_millis - last < self.startup_window_millis {
                return false;
            }
        }
        self.last_request_millis.insert(category.clone(), now_millis);
        true
    }

    /// Rolls back a request record, allowing the next enqueue to retry
    /// immediately. Called when the launcher call that `should_request`
    /// permitted failed.
    pub(crate) fn clear(&mut self, category: &WorkerCategory) {
        self.last_request_millis.remove(category);
    }
}
