//! gitdep - checkout engine for git-hosted package dependencies
//!
//! Given an endpoint (a repository source plus a version/branch/tag/commit
//! target) and a concrete [`Resolution`] produced by an external resolver,
//! gitdep materializes the dependency into a working directory. It drives the
//! system `git` binary (the same approach Cargo takes with
//! `git-fetch-with-cli`) and adapts to whatever the remote server supports:
//!
//! - **Shallow first**: named refs are fetched with `--depth 1`; hosts that
//!   reject shallow requests are remembered in a bounded, time-expiring cache
//!   and retried once at full depth.
//! - **Incremental when possible**: endpoints with a stable name can be
//!   updated in place (fetch + hard reset) instead of cloned fresh, after
//!   confirming that uncommitted changes may be discarded.
//! - **One ls-remote per source**: concurrent ref listings for the same
//!   source are coalesced into a single in-flight request.
//! - **Quiet progress**: clone/fetch progress output is filtered down to
//!   percentage lines, throttled to one emission per second, and only after
//!   the operation has been running for a few seconds.
//! - **Actionable failures**: clone failures behind a proxy on `git://`
//!   transports carry concrete `git config` remediation steps.
//!
//! # Core Modules
//!
//! - [`checkout`] - the orchestrator: [`GitCheckout`], [`Endpoint`],
//!   [`Resolution`] and the clone strategy state machine
//! - [`cache`] - the ref-listing cache and the no-shallow host cache
//! - [`git`] - the [`GitRunner`] subprocess seam, command builder, and
//!   progress monitor
//! - [`config`] - checkout configuration (packages directory, direct-update
//!   mode, proxy settings)
//! - [`core`] - error types shared across the crate
//! - [`prompt`] - the confirmation seam used before destructive updates
//!
//! # Example
//!
//! ```rust,no_run
//! use gitdep::checkout::{Endpoint, GitCheckout, Resolution};
//! use gitdep::config::CheckoutConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = GitCheckout::new(CheckoutConfig::default());
//!
//! let endpoint = Endpoint::named("https://github.com/example/pkg.git", "pkg", "^1.0.0");
//! let resolution = Resolution::tag("v1.2.3", None);
//!
//! let outcome = engine.checkout(&endpoint, &resolution).await?;
//! println!("checked out into {}", outcome.path().display());
//! # Ok(())
//! # }
//! ```
//!
//! [`GitCheckout`]: checkout::GitCheckout
//! [`Endpoint`]: checkout::Endpoint
//! [`Resolution`]: checkout::Resolution
//! [`GitRunner`]: git::GitRunner

pub mod cache;
pub mod checkout;
pub mod config;
pub mod core;
pub mod git;
pub mod prompt;

pub use checkout::{CheckoutOutcome, Endpoint, GitCheckout, Resolution};
pub use config::CheckoutConfig;
pub use crate::core::GitdepError;
