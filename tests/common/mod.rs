/// Common test utilities and helpers for gitmirror tests
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test fixture: a temp directory holding a cache dir, a mapping file and a
/// stand-in git executable
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub cache_dir: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cache_dir = temp_dir.path().join("cache");
        std::fs::create_dir_all(&cache_dir).expect("Failed to create cache dir");

        Self {
            temp_dir,
            cache_dir,
        }
    }

    /// Write a mapping file with the given YAML content
    pub fn create_mapping_file(&self, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join("repos.yaml");
        std::fs::write(&path, content).expect("Failed to write mapping file");
        path
    }

    /// Write a stand-in git executable mimicking the side effects the sync
    /// procedure observes: clone creates the target directory, fetch touches
    /// FETCH_HEAD in its working directory. Every verb exits 0.
    pub fn create_fake_git(&self) -> PathBuf {
        write_fake_git(self.temp_dir.path(), 0)
    }

    /// Stand-in git whose fetch verb fails with the given exit code
    pub fn create_fake_git_with_failing_fetch(&self, exit_code: i32) -> PathBuf {
        write_fake_git(self.temp_dir.path(), exit_code)
    }
}

fn write_fake_git(dir: &Path, fetch_exit: i32) -> PathBuf {
    let path = dir.join("fake-git");
    let script = format!(
        "#!/bin/sh\ncase \"$1\" in\n  clone) mkdir -p \"$4\" ;;\n  fetch) : > FETCH_HEAD; exit {} ;;\nesac\nexit 0\n",
        fetch_exit
    );
    std::fs::write(&path, script).expect("Failed to write fake git");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to mark fake git executable");
    path
}
