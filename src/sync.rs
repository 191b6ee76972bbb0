//! Mirror engine - orchestrates parallel repository mirroring
//!
//! A fixed pool of workers drains one shared work channel of repository
//! descriptors and applies the per-repository sync procedure: reuse check,
//! clone or refresh, and optional remote registration plus push. One
//! repository's failures never interrupt the others.

use crate::config::MirrorOptions;
use crate::git::GitClient;
use crate::repo::MirrorRepo;
use anyhow::Error;
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Sync procedure stages that can fail independently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RemoveCache,
    Clone,
    Fetch,
    RegisterRemote,
    Push,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::RemoveCache => "remove-cache",
            Stage::Clone => "clone",
            Stage::Fetch => "fetch",
            Stage::RegisterRemote => "register-remote",
            Stage::Push => "push",
        };
        f.write_str(name)
    }
}

/// One recorded stage failure
#[derive(Debug, Clone)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: String,
}

/// How the local mirror was brought up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Cache was absent or judged invalid and recreated from scratch
    Cloned,
    /// Existing cache passed the reuse probe and was refreshed in place
    Refreshed,
}

/// Typed per-repository result
///
/// Stages keep running after earlier failures, so one outcome can carry
/// several recorded failures; an empty list means a clean pass.
#[derive(Debug, Clone)]
pub struct RepoOutcome {
    pub name: String,
    pub action: SyncAction,
    pub failures: Vec<StageFailure>,
}

impl RepoOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, stage: Stage, error: &Error) {
        self.failures.push(StageFailure {
            stage,
            error: format!("{:#}", error),
        });
    }
}

/// Results from a complete mirror run
#[derive(Debug, Clone)]
pub struct MirrorSummary {
    pub total_repositories: usize,
    pub cloned: usize,
    pub refreshed: usize,
    pub failed_repositories: usize,
    pub duration: Duration,
    pub outcomes: Vec<RepoOutcome>,
}

/// The mirror engine: bounded worker pool plus per-repository sync procedure
#[derive(Clone)]
pub struct MirrorEngine {
    options: Arc<MirrorOptions>,
    git: GitClient,
}

impl MirrorEngine {
    /// Create an engine from runtime options
    pub fn new(options: MirrorOptions) -> Self {
        let git = GitClient::new(options.git_program.clone(), options.git_timeout);
        Self {
            options: Arc::new(options),
            git,
        }
    }

    /// Mirror all repositories and return only after every one has completed
    ///
    /// Descriptors are handed out through a shared rendezvous channel drained
    /// by long-lived workers; dropping the sender after submission is the
    /// sole termination signal. Completion order across repositories is
    /// nondeterministic.
    pub async fn run(&self, repos: Vec<MirrorRepo>) -> MirrorSummary {
        let start_time = Instant::now();
        let workers = self.options.workers.max(1);

        info!(
            "Mirroring {} repositories with {} workers",
            repos.len(),
            workers
        );

        let (tx, rx) = flume::bounded::<MirrorRepo>(0);

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let rx = rx.clone();
            let engine = self.clone();

            handles.push(tokio::spawn(async move {
                let mut outcomes = Vec::new();
                while let Ok(repo) = rx.recv_async().await {
                    debug!("Worker {} picked up repository {}", worker_id, repo.name);
                    outcomes.push(engine.sync_repo(&repo).await);
                }
                outcomes
            }));
        }
        drop(rx);

        for repo in repos {
            if tx.send_async(repo).await.is_err() {
                // All workers gone; nothing left to hand work to
                error!("Work channel closed before all repositories were submitted");
                break;
            }
        }
        drop(tx);

        let mut outcomes = Vec::new();
        for joined in join_all(handles).await {
            match joined {
                Ok(worker_outcomes) => outcomes.extend(worker_outcomes),
                Err(e) => error!("Worker task panicked: {}", e),
            }
        }

        let summary = compile_summary(outcomes, start_time.elapsed());

        info!(
            "Mirror run completed in {:.2}s: {} cloned, {} refreshed, {} with failures",
            summary.duration.as_secs_f64(),
            summary.cloned,
            summary.refreshed,
            summary.failed_repositories
        );

        summary
    }

    /// Per-repository sync procedure
    ///
    /// Reuse check, then clone or in-place refresh, then optional remote
    /// registration and push. Every stage failure is logged with repository
    /// and stage context, recorded, and execution continues with the next
    /// stage.
    async fn sync_repo(&self, repo: &MirrorRepo) -> RepoOutcome {
        let mut outcome = RepoOutcome {
            name: repo.name.clone(),
            action: SyncAction::Refreshed,
            failures: Vec::new(),
        };

        let mut reusable = repo.has_fetch_marker();
        if !reusable {
            info!("No fetch marker, cannot reuse cache: {}", repo.root.display());
        }

        if reusable {
            info!("Trying to reuse cached mirror: {}", repo.root.display());
            // The probe fetch doubles as the authoritative refresh; a failure
            // demotes to the clone path, which recovers from scratch.
            if let Err(e) = self.git.fetch_prune(repo).await {
                warn!("Failed to reuse cached mirror for {}: {:#}", repo.name, e);
                reusable = false;
            }
        }

        if !reusable {
            outcome.action = SyncAction::Cloned;

            if repo.root.exists() {
                if let Err(e) = tokio::fs::remove_dir_all(&repo.root).await {
                    let e = Error::from(e);
                    warn!(
                        "Failed to remove stale cache for {} at {}: {:#}",
                        repo.name,
                        repo.root.display(),
                        e
                    );
                    outcome.record(Stage::RemoveCache, &e);
                }
            }

            if let Err(e) = self.git.clone_mirror(repo).await {
                error!("Clone failed for {}: {:#}", repo.name, e);
                outcome.record(Stage::Clone, &e);
            }

            // A mirror clone alone does not guarantee prune semantics, so the
            // clone path still ends with one fetch.
            if let Err(e) = self.git.fetch_prune(repo).await {
                error!("Fetch failed for {}: {:#}", repo.name, e);
                outcome.record(Stage::Fetch, &e);
            }
        }

        if self.options.mirror_enabled {
            match repo.remote_name() {
                Ok(remote_name) => {
                    if let Err(e) = self.git.register_remote(repo, &remote_name).await {
                        error!("Remote registration failed for {}: {:#}", repo.name, e);
                        outcome.record(Stage::RegisterRemote, &e);
                    }

                    if let Err(e) = self.git.push_mirror(repo, &remote_name).await {
                        error!("Push failed for {}: {:#}", repo.name, e);
                        outcome.record(Stage::Push, &e);
                    }
                }
                Err(e) => {
                    // Without a remote name there is nothing to register or
                    // push to.
                    error!("Cannot derive remote name for {}: {:#}", repo.name, e);
                    outcome.record(Stage::RegisterRemote, &e);
                }
            }
        }

        outcome
    }
}

/// Compile a run summary from per-repository outcomes
fn compile_summary(outcomes: Vec<RepoOutcome>, duration: Duration) -> MirrorSummary {
    let total_repositories = outcomes.len();
    let mut cloned = 0;
    let mut refreshed = 0;
    let mut failed_repositories = 0;

    for outcome in &outcomes {
        match outcome.action {
            SyncAction::Cloned => cloned += 1,
            SyncAction::Refreshed => refreshed += 1,
        }
        if !outcome.is_clean() {
            failed_repositories += 1;
        }
    }

    MirrorSummary {
        total_repositories,
        cloned,
        refreshed,
        failed_repositories,
        duration,
        outcomes,
    }
}
