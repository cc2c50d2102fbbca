//! Live worker directory: who has polled recently, and from which category.

use std::collections::{HashMap, HashSet};

use broker_types::WorkerObservationView;

use crate::category::WorkerCategory;

/// A single worker's last-known state.
#[derive(Debug, Clone)]
pub struct WorkerObservation {
    /// Worker identifier.
    pub worker_id: String,
    /// Category the worker last advertised.
    pub category: WorkerCategory,
    /// Worker's last-known IP address.
    pub ip_address: String,
    /// Milliseconds since UNIX epoch of the last poll.
    pub last_seen_millis: i64,
}

impl From<WorkerObservation> for WorkerObservationView {
    fn from(obs: WorkerObservation) -> Self {
        WorkerObservationView {
            worker_id: obs.worker_id,
            graph_id: obs.category.graph_id,
            version: obs.category.version,
            ip_address: obs.ip_address,
            last_seen_millis: obs.last_seen_millis,
        }
    }
}

/// Directory of recently-seen workers, indexed by category and by graph so
/// dispatch can answer "is anyone out there for this job" in constant time.
#[derive(Debug, Default)]
pub(crate) struct WorkerCatalog {
    observations: HashMap<String, WorkerObservation>,
    by_category: HashMap<WorkerCategory, HashSet<String>>,
    by_graph: HashMap<String, HashSet<String>>,
}

impl WorkerCatalog {
    /// Builds an empty catalog.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records a poll from `worker_id`, refreshing its last-seen time and
    /// re-indexing it if its category changed since the last poll.
    pub(crate) fn record(
        &mut self,
        worker_id: impl Into<String>,
        category: WorkerCategory,
        ip_address: impl Into<String>,
        now_millis: i64,
    ) {
        let worker_id = worker_id.into();
        let ip_address = ip_address.into();
        if let Some(existing) = self.observations.get(&worker_id) {
            if existing.category != category {
                let old_category = existing.category.clone();
                self.detach(&worker_id, &old_category);
                self.attach(&worker_id, &category);
            }
        } else {
            self.attach(&worker_id, &category);
        }
        self.observations.insert(
            worker_id.clone(),
            WorkerObservation {
                worker_id,
                category,
                ip_address,
                last_seen_millis: now_millis,
            },
        );
    }

    fn attach(&mut self, worker_id: &str, category: &WorkerCategory) {
        self.by_category
            .entry(category.clone())
            .or_default()
            .insert(worker_id.to_string());
        self.by_graph
            .entry(category.graph_id.clone())
            .or_default()
            .insert(worker_id.to_string());
    }

    fn detach(&mut self, worker_id: &str, category: &WorkerCategory) {
        if let Some(set) = self.by_category.get_mut(category) {
            set.remove(worker_id);
            if set.is_empty() {
                self.by_category.remove(category);
            }
        }
        if let Some(set) = self.by_graph.get_mut(&category.graph_id) {
            set.remove(worker_id);
            if set.is_empty() {
                self.by_graph.remove(&category.graph_id);
            }
        }
    }

    /// Drops every worker whose last poll is older than `ttl_millis`.
    /// Returns the number of workers purged.
    pub(crate) fn purge_dead(&mut self, now_millis: i64, ttl_millis: i64) -> usize {
        let dead: Vec<String> = self
            .observations
            .iter()
            .filter(|(_, obs)| now_millis - obs.last_seen_millis > ttl_millis)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &dead {
            if let Some(obs) = self.observations.remove(id) {
                self.detach(id, &obs.category);
            }
        }
        dead.len()
    }

    /// True if at least one live worker matches `category`. When
    /// `allow_any_graph` is set, any worker on the same graph counts
    /// regardless of version (used for the `is_any` poller sentinel, in
    /// reverse, when deciding whether a job already has coverage).
    pub(crate) fn has_worker(&self, category: &WorkerCategory, allow_any_graph: bool) -> bool {
        if allow_any_graph {
            self.by_graph
                .get(&category.graph_id)
                .is_some_and(|s| !s.is_empty())
        } else {
            self.by_category.get(category).is_some_and(|s| !s.is_empty())
        }
    }

    /// Number of live workers tracked.
    pub(crate) fn len(&self) -> usize {
        self.observations.len()
    }

    /// True if no workers are tracked.
    pub(crate) fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Snapshot of every live worker, in no particular order.
    pub(crate) fn snapshot(&self) -> Vec<WorkerObservation> {
        self.observations.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_then_has_worker_matches_exact_category() {
        let mut catalog = WorkerCatalog::new();
        catalog.record("w1", WorkerCategory::new("graph-a", "1.0.0"), "10.0.0.1", 1000);
        assert!(catalog.has_worker(&WorkerCategory::new("graph-a", "1.0.0"), false));
        assert!(!catalog.has_worker(&WorkerCategory::new("graph-a", "2.0.0"), false));
    }

    #[test]
    fn category_change_reindexes() {
        let mut catalog = WorkerCatalog::new();
        catalog.record("w1", WorkerCategory::new("graph-a", "1.0.0"), "10.0.0.1", 1000);
        catalog.record("w1", WorkerCategory::new("graph-a", "2.0.0"), "10.0.0.1", 2000);
        assert!(!catalog.has_worker(&WorkerCategory::new("graph-a", "1.0.0"), false));
        assert!(catalog.has_worker(&WorkerCategory::new("graph-a", "2.0.0"), false));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn purge_dead_removes_stale_workers_only() {
        let mut catalog = WorkerCatalog::new();
        catalog.record("w1", WorkerCategory::new("graph-a", "1.0.0"), "10.0.0.1", 0);
        catalog.record("w2", WorkerCategory::new("graph-a", "1.0.0"), "10.0.0.2", 5000);
        let purged = catalog.purge_dead(6000, 1000);
        assert_eq!(purged, 1);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.snapshot()[0].worker_id, "w2");
    }

    #[test]
    fn allow_any_graph_matches_on_graph_alone() {
        let mut catalog = WorkerCatalog::new();
        catalog.record("w1", WorkerCategory::new("graph-a", "9.9.9"), "10.0.0.1", 0);
        assert!(catalog.has_worker(&WorkerCategory::new("graph-a", "1.0.0"), true));
        assert!(!catalog.has_worker(&WorkerCategory::new("graph-a", "1.0.0"), false));
    }
}
