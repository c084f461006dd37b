use indicatif::ProgressBar;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;

use super::limiter::ConcurrencyLimiter;

/// Kind of throttled work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Clone,
    Scan,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Clone => write!(f, "clone"),
            JobKind::Scan => write!(f, "scan"),
        }
    }
}

/// Failure of a single clone or scan job. Never fatal for the run.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("job exceeded its {0:?} deadline")]
    TimedOut(Duration),

    #[error("invalid scratch path: {0}")]
    Scratch(#[from] crate::scratch::ScratchError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A task group for one phase: every job submitted here goes through the
/// limiter, and [`PhaseGroup::join`] is the barrier that ends the phase.
pub struct PhaseGroup<K> {
    limiter: ConcurrencyLimiter,
    kind: JobKind,
    deadline: Option<Duration>,
    tasks: JoinSet<(K, Result<(), JobError>)>,
}

impl<K: Send + 'static> PhaseGroup<K> {
    pub fn new(limiter: &ConcurrencyLimiter, kind: JobKind, deadline: Option<Duration>) -> Self {
        Self {
            limiter: limiter.clone(),
            kind,
            deadline,
            tasks: JoinSet::new(),
        }
    }

    /// Submit a job without waiting for it. The job only starts running once
    /// it holds a limiter slot, and the slot is released whatever the outcome.
    pub fn submit<F>(&mut self, key: K, job: F)
    where
        F: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let limiter = self.limiter.clone();
        let deadline = self.deadline;
        self.tasks.spawn(async move {
            let slot = limiter.acquire().await;
            let outcome = match deadline {
                Some(limit) => tokio::time::timeout(limit, job)
                    .await
                    .unwrap_or(Err(JobError::TimedOut(limit))),
                None => job.await,
            };
            slot.release();
            (key, outcome)
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every submitted job. Outcomes come back in completion order.
    pub async fn join(mut self, progress: Option<&ProgressBar>) -> Vec<(K, Result<(), JobError>)> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!("{} job task aborted: {}", self.kind, e),
            }
            if let Some(bar) = progress {
                bar.inc(1);
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_join_waits_for_all_jobs() {
        let limiter = ConcurrencyLimiter::new(2);
        let finished = Arc::new(AtomicUsize::new(0));
        let mut group = PhaseGroup::new(&limiter, JobKind::Clone, None);

        for i in 0..6 {
            let finished = Arc::clone(&finished);
            group.submit(i, async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        assert_eq!(group.len(), 6);

        let outcomes = group.join(None).await;
        assert_eq!(outcomes.len(), 6);
        assert_eq!(finished.load(Ordering::SeqCst), 6);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_affect_siblings() {
        let limiter = ConcurrencyLimiter::new(1);
        let mut group = PhaseGroup::new(&limiter, JobKind::Scan, None);
        group.submit("bad", async {
            Err(JobError::ExitStatus {
                program: "tool".into(),
                status: "exit status: 2".into(),
                stderr: String::new(),
            })
        });
        group.submit("good", async { Ok(()) });

        let mut outcomes = group.join(None).await;
        outcomes.sort_by_key(|(key, _)| *key);
        assert!(outcomes[0].1.is_err());
        assert!(outcomes[1].1.is_ok());
    }

    #[tokio::test]
    async fn test_deadline_releases_slot() {
        let limiter = ConcurrencyLimiter::new(1);
        let mut group = PhaseGroup::new(&limiter, JobKind::Clone, Some(Duration::from_millis(20)));
        group.submit("hung", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        group.submit("quick", async { Ok(()) });

        let outcomes = group.join(None).await;
        let hung = outcomes.iter().find(|(key, _)| *key == "hung").unwrap();
        assert!(matches!(hung.1, Err(JobError::TimedOut(_))));
        let quick = outcomes.iter().find(|(key, _)| *key == "quick").unwrap();
        assert!(quick.1.is_ok());
        assert_eq!(limiter.in_flight(), 0);
    }
}
