use crate::result::OperationResult;
use crate::service::ProvisioningService;
use crate::subject::SubjectDescription;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// One unit of batch work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Job {
    Add {
        subject: SubjectDescription,
    },
    Update {
        subject: SubjectDescription,
    },
    Remove {
        subject_id: String,
        #[serde(default)]
        managed_only: bool,
    },
}

impl Job {
    pub fn subject_id(&self) -> &str {
        match self {
            Job::Add { subject } | Job::Update { subject } => &subject.id,
            Job::Remove { subject_id, .. } => subject_id,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Job::Add { .. } => "add",
            Job::Update { .. } => "update",
            Job::Remove { .. } => "remove",
        }
    }

    pub fn list_from_yaml(content: &str) -> serde_yaml::Result<Vec<Job>> {
        serde_yaml::from_str(content)
    }

    pub fn list_from_file(path: &Path) -> std::io::Result<Vec<Job>> {
        let content = std::fs::read_to_string(path)?;
        Self::list_from_yaml(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Result of a single job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectResult {
    pub subject_id: String,
    pub action: String,
    pub success: bool,
    pub fatal: bool,
    pub message: String,
    pub execution_time_ms: u128,
}

/// Report of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs never started because a fatal error stopped the batch
    pub skipped: usize,
    pub aborted: bool,
    pub execution_time_ms: u128,
    pub results: Vec<SubjectResult>,
}

/// Runs jobs for independent subjects on a bounded pool of tasks
pub struct BatchRunner {
    service: Arc<ProvisioningService>,
    workers: usize,
}

impl BatchRunner {
    pub fn new(service: Arc<ProvisioningService>) -> Self {
        let workers = service.config().workers;
        Self { service, workers }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub async fn run(&self, jobs: Vec<Job>) -> BatchReport {
        let started_at = Utc::now();
        let start_time = Instant::now();
        let total = jobs.len();
        info!("Running {} jobs on {} workers", total, self.workers);

        let semaphore = Arc::new(Semaphore::new(self.workers.max(1)));
        let aborted = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();
        let mut started = 0;

        for (index, job) in jobs.into_iter().enumerate() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if aborted.load(Ordering::SeqCst) {
                break;
            }
            started += 1;

            let service = Arc::clone(&self.service);
            let aborted = Arc::clone(&aborted);
            tasks.spawn(async move {
                let _permit = permit;
                let job_start = Instant::now();
                let outcome = run_job(&service, &job).await;
                if outcome.is_fatal() {
                    error!("Fatal error for {}, stopping the batch", job.subject_id());
                    aborted.store(true, Ordering::SeqCst);
                }
                let result = SubjectResult {
                    subject_id: job.subject_id().to_string(),
                    action: job.action().to_string(),
                    success: outcome.is_ok(),
                    fatal: outcome.is_fatal(),
                    message: outcome.to_string(),
                    execution_time_ms: job_start.elapsed().as_millis(),
                };
                (index, result)
            });
        }

        let mut results = Vec::with_capacity(started);
        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if !result.success {
                        failed += 1;
                    }
                    results.push((index, result));
                }
                Err(e) => {
                    error!("Batch task failed: {}", e);
                    failed += 1;
                }
            }
        }
        results.sort_by_key(|(index, _)| *index);

        let aborted = aborted.load(Ordering::SeqCst);
        let skipped = total - started;
        if aborted {
            warn!("Batch aborted, {} jobs not started", skipped);
        }
        let succeeded = results.iter().filter(|(_, r)| r.success).count();
        info!(
            "Batch finished: {} succeeded, {} failed, {} skipped",
            succeeded, failed, skipped
        );

        BatchReport {
            started_at,
            total,
            succeeded,
            failed,
            skipped,
            aborted,
            execution_time_ms: start_time.elapsed().as_millis(),
            results: results.into_iter().map(|(_, result)| result).collect(),
        }
    }
}

async fn run_job(service: &ProvisioningService, job: &Job) -> OperationResult {
    match job {
        Job::Add { subject } => service.add_to_groups(subject).await,
        Job::Update { subject } => service.update_memberships(subject).await,
        Job::Remove {
            subject_id,
            managed_only: true,
        } => service.remove_from_managed_groups(subject_id).await,
        Job::Remove { subject_id, .. } => service.remove_from_all_groups(subject_id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_from_yaml() {
        let jobs = Job::list_from_yaml(
            r#"
- action: add
  subject:
    id: jdoe
    person_type: STUDENT
    values: [ETB01, 6A]
- action: remove
  subject_id: old
  managed_only: true
- action: remove
  subject_id: gone
"#,
        )
        .unwrap();

        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].subject_id(), "jdoe");
        assert_eq!(jobs[0].action(), "add");
        assert_eq!(
            jobs[1],
            Job::Remove {
                subject_id: "old".to_string(),
                managed_only: true
            }
        );
        assert!(matches!(&jobs[2], Job::Remove { managed_only: false, .. }));
    }
}
