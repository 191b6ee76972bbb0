//! gitmirror - Bounded-Concurrency Git Repository Mirroring
//!
//! gitmirror maintains a local bare mirror clone for every repository
//! declared in a mapping file, refreshes each one, and optionally
//! force-pushes the refreshed state to a destination remote.
//!
//! ## Core Behavior
//!
//! - **Worker Pool**: a fixed set of workers drains a shared work channel
//! - **Reuse Policy**: existing caches are refreshed in place when a fetch
//!   marker is present, otherwise deleted and recreated
//! - **Subprocess Boundary**: all git semantics are delegated to the `git`
//!   binary, each invocation bounded by a timeout
//! - **Fault Isolation**: a failing stage is logged and recorded, never
//!   aborting sibling repositories or later stages
//!
//! ## Modules
//!
//! - [`config`]: mapping-file parsing and runtime options
//! - [`repo`]: per-repository mirror descriptor
//! - [`git`]: git subprocess runner and remote registration
//! - [`sync`]: worker pool and per-repository sync procedure

pub mod config;
pub mod git;
pub mod repo;
pub mod sync;

pub use config::{MirrorOptions, RepoMapping, RepoMappings};
pub use git::GitClient;
pub use repo::MirrorRepo;
pub use sync::{MirrorEngine, MirrorSummary, RepoOutcome, Stage, SyncAction};
