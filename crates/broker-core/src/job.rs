//! A single enqueued job: its template, completion bitset, and delivery
//! cursor.

use broker_types::{mercator, JobStatus, Task, Template};

use crate::category::WorkerCategory;
use crate::error::BrokerError;

/// Fixed-size completion bitset, one bit per task index.
#[derive(Debug, Clone)]
struct Bitset {
    words: Vec<u64>,
    len: u32,
}

impl Bitset {
    fn new(len: u32) -> Self {
        let word_count = (len as usize).div_ceil(64);
        Self {
            words: vec![0; word_count],
            len,
        }
    }

    fn get(&self, index: u32) -> bool {
        let word = self.words[(index / 64) as usize];
        word & (1u64 << (index % 64)) != 0
    }

    /// Sets the bit, returning whether it was previously unset.
    fn set(&mut self, index: u32) -> bool {
        let word = &mut self.words[(index / 64) as usize];
        let mask = 1u64 << (index % 64);
        let was_set = *word & mask != 0;
        *word |= mask;
        !was_set
    }

    fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    #[allow(dead_code)]
    fn len(&self) -> u32 {
        self.len
    }
}

/// A job awaiting dispatch. Owns the one piece of mutable state the broker
/// cares about per job: which tasks are done, and where the delivery cursor
/// sits within the grid.
#[derive(Debug)]
pub(crate) struct Job {
    template: Template,
    category: WorkerCategory,
    n_tasks_total: u32,
    completed: Bitset,
    next_to_deliver: u32,
    n_completed: u32,
    last_delivery_millis: i64,
    delivery_pass: u32,
}

impl Job {
    /// Builds a job from a submitted template. Fails if the grid has zero
    /// area or would overflow a 32-bit task index.
    pub(crate) fn new(template: Template, now_millis: i64) -> Result<Self, BrokerError> {
        let area = template.width as u64 * template.height as u64;
        if area == 0 {
            return Err(BrokerError::InvalidTemplate(
                "grid width and height must both be positive".to_string(),
            ));
        }
        if area > u32::MAX as u64 {
            return Err(BrokerError::InvalidTemplate(
                "grid is too large: width * height overflows a task index".to_string(),
            ));
        }
        let n_tasks_total = area as u32;
        let category = WorkerCategory::new(template.graph_id.clone(), template.version.clone());
        Ok(Self {
            template,
            category,
            n_tasks_total,
            completed: Bitset::new(n_tasks_total),
            next_to_deliver: 0,
            n_completed: 0,
            last_delivery_millis: now_millis,
            delivery_pass: 0,
        })
    }

    /// The job's id, as supplied by the submitter.
    pub(crate) fn job_id(&self) -> &str {
        &self.template.job_id
    }

    /// The category this job's tasks require.
    pub(crate) fn category(&self) -> &WorkerCategory {
        &self.category
    }

    /// How many redelivery sweeps have started so far.
    pub(crate) fn delivery_pass(&self) -> u32 {
        self.delivery_pass
    }

    /// True once every task has been marked complete.
    pub(crate) fn is_complete(&self) -> bool {
        self.n_completed == self.n_tasks_total
    }

    /// True if this job has at least one task left to hand to a poller in
    /// the current delivery pass.
    pub(crate) fn has_deliverable(&self) -> bool {
        !self.is_complete() && self.next_to_deliver < self.n_tasks_total
    }

    /// Hands out up to `max` fresh tasks starting at the delivery cursor,
    /// skipping any index already marked complete. Advances the cursor past
    /// every index it considers, whether or not that index was emitted.
    /// A `max` of zero returns an empty batch without moving the cursor.
    pub(crate) fn take_some(&mut self, max: u32, now_millis: i64) -> Vec<Task> {
        let mut out = Vec::new();
        if max == 0 {
            return out;
        }
        while self.next_to_deliver < self.n_tasks_total && (out.len() as u32) < max {
            let index = self.next_to_deliver;
            self.next_to_deliver += 1;
            if self.completed.get(index) {
                continue;
            }
            out.push(self.synthesize_task(index));
        }
        if !out.is_empty() {
            self.last_delivery_millis = now_millis;
        }
        out
    }

    /// Marks `task_index` complete. Returns false if the index is out of
    /// range or was already complete.
    pub(crate) fn mark_complete(&mut self, task_index: u32) -> bool {
        if task_index >= self.n_tasks_total {
            return false;
        }
        if !self.completed.set(task_index) {
            return false;
        }
        self.n_completed += 1;
        true
    }

    /// Starts a new redelivery pass if the current pass has been fully
    /// handed out, the job is still incomplete, the redelivery budget isn't
    /// exhausted, and the quiet period since the last delivery has elapsed.
    /// Returns the number of tasks the new pass makes available.
    pub(crate) fn redeliver(&mut self, now_millis: i64, quiet_period_millis: i64, max_passes: u32) -> u32 {
        if self.is_complete() {
            return 0;
        }
        if self.next_to_deliver != self.n_tasks_total {
            return 0;
        }
        if self.delivery_pass >= max_passes {
            return 0;
        }
        if now_millis - self.last_delivery_millis < quiet_period_millis {
            return 0;
        }
        self.delivery_pass += 1;
        self.next_to_deliver = 0;
        self.n_tasks_total - self.n_completed
    }

    /// Logs (but does not panic on) a mismatch between the completion
    /// bitset's population count and `n_completed`. Called once, right
    /// before a job is retired from the ring.
    pub(crate) fn verify_complete(&self) {
        let counted = self.completed.count_ones();
        if counted != self.n_completed {
            tracing::error!(
                job_id = %self.job_id(),
                n_completed = self.n_completed,
                counted,
                "completion bitset and counter disagree"
            );
        }
    }

    /// A point-in-time status view of this job.
    pub(crate) fn status(&self) -> JobStatus {
        JobStatus {
            job_id: self.template.job_id.clone(),
            graph_id: self.template.graph_id.clone(),
            version: self.template.version.clone(),
            total: self.n_tasks_total,
            complete: self.n_completed,
            incomplete: self.n_tasks_total - self.n_completed,
            delivery_pass: self.delivery_pass,
        }
    }

    fn synthesize_task(&self, index: u32) -> Task {
        let grid_x = index % self.template.width;
        let grid_y = index / self.template.width;
        let (lon, lat) = mercator::grid_cell_center(
            self.template.west,
            self.template.north,
            self.template.zoom,
            grid_x,
            grid_y,
        );
        Task {
            job_id: self.template.job_id.clone(),
            task_index: index,
            grid_x,
            grid_y,
            lon,
            lat,
            payload: self.template.payload.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(job_id: &str, width: u32, height: u32) -> Template {
        Template {
            job_id: job_id.to_string(),
            graph_id: "graph-a".to_string(),
            version: "1.0.0".to_string(),
            width,
            height,
            zoom: 10,
            west: -74.25,
            north: 40.9,
            payload: serde_json::json!({"k": "v"}),
        }
    }

    #[test]
    fn new_rejects_zero_area() {
        assert!(Job::new(template("j1", 0, 5), 0).is_err());
        assert!(Job::new(template("j1", 5, 0), 0).is_err());
    }

    #[test]
    fn take_some_respects_max_and_advances_cursor() {
        let mut job = Job::new(template("j1", 3, 2), 1000).unwrap();
        let batch = job.take_some(2, 1000);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].task_index, 0);
        assert_eq!(batch[1].task_index, 1);
        assert!(job.has_deliverable());
    }

    #[test]
    fn take_some_zero_does_not_advance_cursor() {
        let mut job = Job::new(template("j1", 3, 2), 1000).unwrap();
        let batch = job.take_some(0, 1000);
        assert!(batch.is_empty());
        let next = job.take_some(1, 1000);
        assert_eq!(next[0].task_index, 0);
    }

    #[test]
    fn take_some_skips_completed_indices() {
        let mut job = Job::new(template("j1", 3, 1), 1000).unwrap();
        assert!(job.mark_complete(1));
        let batch = job.take_some(10, 1000);
        let indices: Vec<u32> = batch.iter().map(|t| t.task_index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn mark_complete_is_idempotent() {
        let mut job = Job::new(template("j1", 2, 1), 1000).unwrap();
        assert!(job.mark_complete(0));
        assert!(!job.mark_complete(0));
    }

    #[test]
    fn mark_complete_out_of_range_is_false() {
        let mut job = Job::new(template("j1", 2, 1), 1000).unwrap();
        assert!(!job.mark_complete(5));
    }

    #[test]
    fn job_completes_when_every_task_is_marked() {
        let mut job = Job::new(template("j1", 2, 1), 1000).unwrap();
        assert!(!job.is_complete());
        job.mark_complete(0);
        job.mark_complete(1);
        assert!(job.is_complete());
    }

    #[test]
    fn redeliver_waits_for_quiet_period_and_caps_passes() {
        let mut job = Job::new(template("j1", 2, 1), 1000).unwrap();
        job.take_some(2, 1000);
        job.mark_complete(0);
        // Not all tasks complete, current pass fully handed out, but quiet
        // period hasn't elapsed yet.
        assert_eq!(job.redeliver(1500, 1000, 2), 0);
        assert_eq!(job.redeliver(2500, 1000, 2), 1);
        assert_eq!(job.delivery_pass(), 1);
        // Hand out the new pass, then hit the redelivery cap.
        job.take_some(10, 2500);
        assert_eq!(job.redeliver(10000, 1000, 2), 1);
        assert_eq!(job.redeliver(20000, 1000, 2), 0);
    }

    #[test]
    fn redeliver_is_a_noop_once_complete() {
        let mut job = Job::new(template("j1", 1, 1), 1000).unwrap();
        job.take_some(1, 1000);
        job.mark_complete(0);
        assert_eq!(job.redeliver(100_000, 1000, 5), 0);
    }
}
