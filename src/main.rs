use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gitmirror::repo::build_repos;
use gitmirror::{MirrorEngine, MirrorOptions, MirrorSummary, RepoMappings};

#[derive(Parser)]
#[command(name = "gitmirror")]
#[command(about = "Bounded-concurrency git repository mirroring tool")]
#[command(version)]
struct Cli {
    /// Repository mapping file
    #[arg(short, long, default_value = "repos.yaml")]
    mappings: PathBuf,

    /// Git cache directory (a temporary directory is created if omitted)
    #[arg(long)]
    cache_dir: Option<String>,

    /// Enable mirroring to the destination remotes
    #[arg(long)]
    mirror: bool,

    /// Number of concurrent sync workers
    #[arg(long, default_value_t = MirrorOptions::DEFAULT_WORKERS)]
    workers: usize,

    /// Timeout in seconds for each git operation
    #[arg(long, default_value_t = MirrorOptions::DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Git binary to invoke
    #[arg(long, default_value = "git")]
    git_binary: String,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    info!("Starting gitmirror v{}", env!("CARGO_PKG_VERSION"));

    let cache_dir = prepare_cache_dir(cli.cache_dir.as_deref())?;
    info!("Using cache directory: {}", cache_dir.display());

    let mappings = RepoMappings::load(&cli.mappings)?;
    info!(
        "Read mapping file {:?}: {} repositories",
        cli.mappings,
        mappings.repos.len()
    );

    let mut options = MirrorOptions::new(cache_dir);
    options.mirror_enabled = cli.mirror;
    options.workers = cli.workers;
    options.git_timeout = Duration::from_secs(cli.timeout);
    options.git_program = cli.git_binary;

    let repos = build_repos(&options.cache_dir, &mappings.repos);
    let engine = MirrorEngine::new(options);
    let summary = engine.run(repos).await;

    print_summary(&summary);

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

/// Create or validate the cache directory
///
/// With no directory configured, a kept temporary directory is used so the
/// run has somewhere to build mirrors; an explicit directory is created if
/// missing and must be a directory if it exists.
fn prepare_cache_dir(cache_dir: Option<&str>) -> Result<PathBuf> {
    let Some(dir) = cache_dir else {
        let temp = tempfile::Builder::new()
            .prefix("gitmirror")
            .tempdir()
            .context("Failed to create temporary cache directory")?;
        return Ok(temp.keep());
    };

    let expanded = shellexpand::full(dir).context("Failed to expand cache directory path")?;
    let path = PathBuf::from(expanded.as_ref());

    match std::fs::metadata(&path) {
        Ok(metadata) if !metadata.is_dir() => {
            bail!("Cache directory path is not a directory: {}", path.display());
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            std::fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create cache directory: {}", path.display()))?;
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to stat cache directory: {}", path.display()));
        }
    }

    Ok(path)
}

/// Print the run summary to stdout
fn print_summary(summary: &MirrorSummary) {
    println!("\nMirror run complete!");
    println!("   Total repositories: {}", summary.total_repositories);
    println!("   Cloned: {}", summary.cloned);
    println!("   Refreshed: {}", summary.refreshed);
    println!("   With failures: {}", summary.failed_repositories);
    println!("   Duration: {:.2}s", summary.duration.as_secs_f64());

    if summary.failed_repositories > 0 {
        println!("\nFailed stages:");
        for outcome in &summary.outcomes {
            for failure in &outcome.failures {
                println!("   ❌ {} [{}]: {}", outcome.name, failure.stage, failure.error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_cache_dir_defaults_to_temp_dir() {
        let dir = prepare_cache_dir(None).expect("Failed to prepare cache dir");
        assert!(dir.is_dir());
        assert!(dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("gitmirror"));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_prepare_cache_dir_creates_missing_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let target = temp_dir.path().join("nested").join("cache");

        let dir = prepare_cache_dir(Some(target.to_str().unwrap()))
            .expect("Failed to prepare cache dir");
        assert_eq!(dir, target);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_prepare_cache_dir_rejects_non_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file_path = temp_dir.path().join("not-a-dir");
        std::fs::write(&file_path, b"").expect("Failed to write file");

        let result = prepare_cache_dir(Some(file_path.to_str().unwrap()));
        assert!(result.is_err());
    }
}
