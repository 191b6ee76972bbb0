use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::repo::MirrorRepo;

/// Git subprocess runner
///
/// Executes one git operation per call, bounded by a fixed wall-clock
/// timeout. All git semantics live in the external binary; this type only
/// builds argument vectors and reports success or failure.
#[derive(Debug, Clone)]
pub struct GitClient {
    program: String,
    timeout: Duration,
}

impl GitClient {
    /// Create a client invoking `program` with the given per-operation timeout
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Full mirror clone from the repository source into its cache root
    ///
    /// Runs without a working directory: the target directory does not exist
    /// yet, git creates it.
    pub async fn clone_mirror(&self, repo: &MirrorRepo) -> Result<()> {
        info!("Cloning repository: {} -> {}", repo.name, repo.root.display());

        let root = repo.root.to_string_lossy();
        self.run_git(&repo.name, &["clone", "--mirror", &repo.source, &root], None)
            .await
    }

    /// Refresh the local mirror from origin, pruning refs deleted upstream
    pub async fn fetch_prune(&self, repo: &MirrorRepo) -> Result<()> {
        info!("Fetching repository: {} at {}", repo.name, repo.root.display());

        self.run_git(&repo.name, &["fetch", "--prune", "origin"], Some(&repo.root))
            .await
    }

    /// Force-push the full mirror to the named destination remote
    pub async fn push_mirror(&self, repo: &MirrorRepo, remote_name: &str) -> Result<()> {
        info!("Pushing repository: {} to remote {}", repo.name, remote_name);

        self.run_git(
            &repo.name,
            &["push", "--mirror", "--force", remote_name],
            Some(&repo.root),
        )
        .await
    }

    /// Write the destination remote definition into the mirror
    ///
    /// The registration restricts pushes to branch and tag refs; internal
    /// refs never propagate to the destination. Overwritten on every run.
    pub async fn register_remote(&self, repo: &MirrorRepo, remote_name: &str) -> Result<()> {
        debug!(
            "Registering remote {} for repository {}",
            remote_name, repo.name
        );

        let remotes_dir = repo.root.join("remotes");
        tokio::fs::create_dir_all(&remotes_dir)
            .await
            .with_context(|| format!("Failed to create remotes dir: {:?}", remotes_dir))?;

        let definition = format!(
            "URL: {}\nPush: +refs/heads/*:refs/heads/*\nPush: +refs/tags/*:refs/tags/*\n",
            repo.destination
        );

        let path = repo.remotes_file(remote_name);
        tokio::fs::write(&path, definition)
            .await
            .with_context(|| format!("Failed to write remote file: {:?}", path))?;

        Ok(())
    }

    /// Run one git subprocess to completion under the client timeout
    ///
    /// The child is spawned with kill-on-drop, so abandoning the wait on
    /// timeout also terminates the process. Stderr is captured and carried
    /// in the error on non-zero exit.
    async fn run_git(&self, repo_name: &str, args: &[&str], cwd: Option<&Path>) -> Result<()> {
        debug!("Running {} {} for {}", self.program, args.join(" "), repo_name);

        let mut cmd = AsyncCommand::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().with_context(|| {
            format!("Failed to start {} {} for {}", self.program, args.join(" "), repo_name)
        })?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.with_context(|| {
                format!("Failed waiting on {} {} for {}", self.program, args.join(" "), repo_name)
            })?,
            Err(_) => {
                return Err(anyhow!(
                    "{} {} timed out after {}s for {}",
                    self.program,
                    args.join(" "),
                    self.timeout.as_secs(),
                    repo_name
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} {} failed for {}: {}",
                self.program,
                args.join(" "),
                repo_name,
                stderr.trim()
            ));
        }

        Ok(())
    }
}
