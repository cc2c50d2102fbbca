//! The broker actor: a single Tokio task that owns the job ring, the worker
//! catalog, and the provisioning gate, processing one command at a time off
//! an `mpsc` channel. The launcher call is fired from inside the loop but
//! awaited outside it, with its outcome fed back in as another command, so
//! a slow provisioning RPC never blocks dispatch.

use std::sync::Arc;

use broker_types::{JobStatus, Task, Template, WorkerObservationView, WorkerStatus};
use tokio::sync::{mpsc, oneshot};

use crate::catalog::WorkerCatalog;
use crate::category::WorkerCategory;
use crate::error::BrokerError;
use crate::gate::ProvisionGate;
use crate::job::Job;
use crate::launcher::LauncherPort;
use crate::ring::JobRing;

/// Dispatch policy knobs, with defaults as associated consts.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// When true, the broker never calls the launcher: every job is assumed
    /// to be served by workers that show up on their own.
    pub work_offline: bool,
    /// Ceiling on the number of distinct workers the catalog will track.
    /// Once reached, the broker stops requesting new capacity and logs the
    /// exhaustion instead.
    pub max_workers: usize,
    /// Minimum time between provisioning requests for the same category.
    pub worker_startup_window_millis: i64,
    /// A worker is dropped from the catalog once this long has passed
    /// since its last poll.
    pub worker_ttl_millis: i64,
    /// Maximum tasks handed out per `dequeueWork` call.
    pub max_tasks_per_poll: u32,
    /// Maximum number of redelivery sweeps a job can undergo.
    pub max_redelivery_passes: u32,
    /// Minimum idle time since a job's last delivery before it's eligible
    /// for another redelivery sweep.
    pub redelivery_quiet_period_millis: i64,
}

impl BrokerSettings {
    /// One hour: long enough for most worker fleets to finish booting.
    pub const DEFAULT_WORKER_STARTUP_WINDOW_MILLIS: i64 = 60 * 60 * 1000;
    /// Two minutes.
    pub const DEFAULT_WORKER_TTL_MILLIS: i64 = 120_000;
    /// Eight tasks per poll.
    pub const DEFAULT_MAX_TASKS_PER_POLL: u32 = 8;
    /// Two redelivery sweeps.
    pub const DEFAULT_MAX_REDELIVERY_PASSES: u32 = 2;
    /// Two minutes.
    pub const DEFAULT_REDELIVERY_QUIET_PERIOD_MILLIS: i64 = 120_000;
    /// 512 tracked workers.
    pub const DEFAULT_MAX_WORKERS: usize = 512;
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            work_offline: false,
            max_workers: Self::DEFAULT_MAX_WORKERS,
            worker_startup_window_millis: Self::DEFAULT_WORKER_STARTUP_WINDOW_MILLIS,
            worker_ttl_millis: Self::DEFAULT_WORKER_TTL_MILLIS,
            max_tasks_per_poll: Self::DEFAULT_MAX_TASKS_PER_POLL,
            max_redelivery_passes: Self::DEFAULT_MAX_REDELIVERY_PASSES,
            redelivery_quiet_period_millis: Self::DEFAULT_REDELIVERY_QUIET_PERIOD_MILLIS,
        }
    }
}

enum Command {
    EnqueueJob {
        template: Template,
        now_millis: i64,
        reply: oneshot::Sender<Result<(), BrokerError>>,
    },
    DequeueWork {
        status: WorkerStatus,
        now_millis: i64,
        reply: oneshot::Sender<Vec<Task>>,
    },
    CompleteTask {
        job_id: String,
        task_index: u32,
        reply: oneshot::Sender<bool>,
    },
    DeleteJob {
        job_id: String,
        reply: oneshot::Sender<bool>,
    },
    RecordWorker {
        status: WorkerStatus,
        now_millis: i64,
        reply: oneshot::Sender<()>,
    },
    ListJobs {
        reply: oneshot::Sender<Vec<JobStatus>>,
    },
    ListWorkers {
        reply: oneshot::Sender<Vec<WorkerObservationView>>,
    },
    LauncherOutcome {
        category: WorkerCategory,
        ok: bool,
    },
}

/// A cheaply-cloneable front for the broker actor. Every method sends a
/// command over the actor's `mpsc` channel and awaits the reply, so callers
/// never touch the ring, catalog, or gate directly.
#[derive(Clone)]
pub struct BrokerHandle {
    tx: mpsc::Sender<Command>,
}

impl BrokerHandle {
    /// Spawns the broker actor and returns a handle to it.
    pub fn spawn(settings: BrokerSettings, launcher: Arc<dyn LauncherPort>) -> Self {
        let (tx, rx) = mpsc::channel(256);
        let actor = BrokerActor {
            ring: JobRing::new(),
            catalog: WorkerCatalog::new(),
            gate: ProvisionGate::new(settings.worker_startup_window_millis),
            settings,
            launcher,
            cmd_tx: tx.clone(),
            rx,
        };
        tokio::spawn(actor.run());
        Self { tx }
    }

    /// Submits a new job. Fails if a job with the same id is already in
    /// the ring, or if the template's grid is invalid.
    pub async fn enqueue_job(&self, template: Template, now_millis: i64) -> Result<(), BrokerError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::EnqueueJob {
                template,
                now_millis,
                reply,
            })
            .await
            .map_err(|_| BrokerError::Shutdown)?;
        reply_rx.await.map_err(|_| BrokerError::Shutdown)?
    }

    /// A poller's heartbeat-and-poll call. Records the poller's presence
    /// and returns up to the configured batch of fresh tasks.
    pub async fn dequeue_work(&self, status: WorkerStatus, now_millis: i64) -> Result<Vec<Task>, BrokerError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::DequeueWork {
                status,
                now_millis,
                reply,
            })
            .await
            .map_err(|_| BrokerError::Shutdown)?;
        reply_rx.await.map_err(|_| BrokerError::Shutdown)
    }

    /// Marks a task complete. Returns false if the job or task index is
    /// unknown, or the task was already complete.
    pub async fn complete_task(&self, job_id: String, task_index: u32) -> Result<bool, BrokerError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::CompleteTask {
                job_id,
                task_index,
                reply,
            })
            .await
            .map_err(|_| BrokerError::Shutdown)?;
        reply_rx.await.map_err(|_| BrokerError::Shutdown)
    }

    /// Removes a job outright. Returns false if no such job exists.
    pub async fn delete_job(&self, job_id: String) -> Result<bool, BrokerError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::DeleteJob { job_id, reply })
            .await
            .map_err(|_| BrokerError::Shutdown)?;
        reply_rx.await.map_err(|_| BrokerError::Shutdown)
    }

    /// Records a worker's presence without asking for work. Used for an
    /// out-of-band heartbeat distinct from `dequeue_work`.
    pub async fn record_worker(&self, status: WorkerStatus, now_millis: i64) -> Result<(), BrokerError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::RecordWorker {
                status,
                now_millis,
                reply,
            })
            .await
            .map_err(|_| BrokerError::Shutdown)?;
        reply_rx.await.map_err(|_| BrokerError::Shutdown)
    }

    /// A point-in-time status view of every job in the ring.
    pub async fn list_jobs(&self) -> Result<Vec<JobStatus>, BrokerError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::ListJobs { reply })
            .await
            .map_err(|_| BrokerError::Shutdown)?;
        reply_rx.await.map_err(|_| BrokerError::Shutdown)
    }

    /// A point-in-time view of every live worker in the catalog.
    pub async fn list_workers(&self) -> Result<Vec<WorkerObservationView>, BrokerError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::ListWorkers { reply })
            .await
            .map_err(|_| BrokerError::Shutdown)?;
        reply_rx.await.map_err(|_| BrokerError::Shutdown)
    }
}

struct BrokerActor {
    ring: JobRing,
    catalog: WorkerCatalog,
    gate: ProvisionGate,
    settings: BrokerSettings,
    launcher: Arc<dyn LauncherPort>,
    cmd_tx: mpsc::Sender<Command>,
    rx: mpsc::Receiver<Command>,
}

impl BrokerActor {
    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                Command::EnqueueJob {
                    template,
                    now_millis,
                    reply,
                } => {
                    let result = self.handle_enqueue(template, now_millis);
                    let _ = reply.send(result);
                }
                Command::DequeueWork {
                    status,
                    now_millis,
                    reply,
                } => {
                    let tasks = self.handle_dequeue(status, now_millis);
                    let _ = reply.send(tasks);
                }
                Command::CompleteTask {
                    job_id,
                    task_index,
                    reply,
                } => {
                    let ok = self.handle_complete_task(&job_id, task_index);
                    let _ = reply.send(ok);
                }
                Command::DeleteJob { job_id, reply } => {
                    let ok = self.handle_delete_job(&job_id);
                    let _ = reply.send(ok);
                }
                Command::RecordWorker {
                    status,
                    now_millis,
                    reply,
                } => {
                    self.handle_record_worker(status, now_millis);
                    let _ = reply.send(());
                }
                Command::ListJobs { reply } => {
                    let jobs = self.ring.iter().map(Job::status).collect();
                    let _ = reply.send(jobs);
                }
                Command::ListWorkers { reply } => {
                    let workers = self
                        .catalog
                        .snapshot()
                        .into_iter()
                        .map(Into::into)
                        .collect();
                    let _ = reply.send(workers);
                }
                Command::LauncherOutcome { category, ok } => {
                    self.handle_launcher_outcome(&category, ok);
                }
            }
        }
        tracing::info!("broker actor shutting down: command channel closed");
    }

    fn handle_enqueue(&mut self, template: Template, now_millis: i64) -> Result<(), BrokerError> {
        if self.ring.get(&template.job_id).is_some() {
            return Err(BrokerError::DuplicateJob(template.job_id));
        }
        let job_id = template.job_id.clone();
        let job = Job::new(template, now_millis)?;
        let category = job.category().clone();
        tracing::info!(job_id = %job_id, graph_id = %category.graph_id, version = %category.version, "job enqueued");
        self.ring.insert(job);
        metrics::counter!("broker_jobs_enqueued_total").increment(1);

        if !self.settings.work_offline && !self.catalog.has_worker(&category, false) {
            self.request_capacity(category, now_millis);
        }
        Ok(())
    }

    fn request_capacity(&mut self, category: WorkerCategory, now_millis: i64) {
        if self.catalog.len() >= self.settings.max_workers {
            tracing::warn!(
                graph_id = %category.graph_id,
                version = %category.version,
                max_workers = self.settings.max_workers,
                "capacity exhausted: job remains unserved until capacity frees up"
            );
            metrics::counter!("broker_capacity_exhausted_total").increment(1);
            return;
        }
        if !self.gate.should_request(&category, now_millis) {
            return;
        }
        let launcher = self.launcher.clone();
        let cmd_tx = self.cmd_tx.clone();
        let category_for_task = category.clone();
        metrics::counter!("broker_launcher_requests_total").increment(1);
        tokio::spawn(async move {
            let result = launcher.ensure_capacity(&category_for_task, 1).await;
            let ok = result.is_ok();
            if let Err(err) = &result {
                tracing::warn!(error = %err, "launcher failed to provision capacity");
            }
            let _ = cmd_tx
                .send(Command::LauncherOutcome {
                    category: category_for_task,
                    ok,
                })
                .await;
        });
    }

    fn handle_dequeue(&mut self, status: WorkerStatus, now_millis: i64) -> Vec<Task> {
        self.catalog.purge_dead(now_millis, self.settings.worker_ttl_millis);
        let category = WorkerCategory::new(status.graph_id.clone(), status.version.clone());
        self.catalog
            .record(status.worker_id.clone(), category.clone(), status.ip_address.clone(), now_millis);

        let max = self.settings.max_tasks_per_poll;
        let found = if category.is_any() {
            self.ring.advance_to(|job| job.has_deliverable())
        } else if self.settings.work_offline {
            // Offline mode can't grow capacity, so affinity widens to a
            // graph-only match: a version mismatch is tolerated.
            self.ring
                .advance_to(|job| job.has_deliverable() && job.category().graph_id == category.graph_id)
        } else {
            self.ring.advance_to(|job| job.has_deliverable() && *job.category() == category)
        };

        if let Some(job) = found {
            let tasks = job.take_some(max, now_millis);
            metrics::counter!("broker_tasks_dispatched_total").increment(tasks.len() as u64);
            return tasks;
        }

        for job in self.ring.iter_mut() {
            let freed = job.redeliver(
                now_millis,
                self.settings.redelivery_quiet_period_millis,
                self.settings.max_redelivery_passes,
            );
            if freed > 0 {
                metrics::counter!("broker_redelivery_tasks_total").increment(freed as u64);
                tracing::info!(job_id = %job.job_id(), delivery_pass = job.delivery_pass(), freed, "redelivery pass started");
            }
        }
        Vec::new()
    }

    fn handle_complete_task(&mut self, job_id: &str, task_index: u32) -> bool {
        let Some(job) = self.ring.get_mut(job_id) else {
            return false;
        };
        let transitioned = job.mark_complete(task_index);
        if transitioned {
            metrics::counter!("broker_tasks_completed_total").increment(1);
        }
        if job.is_complete() {
            job.verify_complete();
            self.ring.remove(job_id);
            tracing::info!(job_id, "job complete, removed from ring");
            metrics::counter!("broker_jobs_retired_total").increment(1);
        }
        transitioned
    }

    fn handle_delete_job(&mut self, job_id: &str) -> bool {
        let removed = self.ring.remove(job_id).is_some();
        if removed {
            tracing::info!(job_id, "job deleted");
        }
        removed
    }

    fn handle_record_worker(&mut self, status: WorkerStatus, now_millis: i64) {
        self.catalog.purge_dead(now_millis, self.settings.worker_ttl_millis);
        let category = WorkerCategory::new(status.graph_id, status.version);
        self.catalog.record(status.worker_id, category, status.ip_address, now_millis);
    }

    fn handle_launcher_outcome(&mut self, category: &WorkerCategory, ok: bool) {
        if !ok {
            self.gate.clear(category);
            metrics::counter!("broker_launcher_failures_total").increment(1);
        }
    }
}
