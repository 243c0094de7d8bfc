//! The checkout engine
//!
//! [`GitCheckout`] materializes a resolved dependency into a working
//! directory. The inputs are an [`Endpoint`] (the repository source plus the
//! target the user asked for) and a [`Resolution`] (the concrete branch,
//! tag, version tag, or commit an external resolver picked).
//!
//! The engine adapts its git usage to the situation:
//!
//! - named refs are cloned single-branch and shallow; a host that rejects
//!   the shallow request is remembered and the clone retried once at full
//!   depth
//! - commit resolutions get a full clone followed by a hard reset, since
//!   `clone -b` cannot target a commit id
//! - endpoints with a stable name and an existing working copy can be
//!   updated in place (fetch + hard reset) when configured, after
//!   confirming that uncommitted changes may be discarded
//! - ancient git versions that exit 0 from `clone -b` without actually
//!   checking out the branch are detected from their stderr and repaired
//!   with an explicit checkout
//!
//! All subprocess access goes through the [`GitRunner`] seam and every
//! failure passes the proxy diagnostic augmenter, so `git://` failures
//! behind a proxy surface concrete remediation steps.

mod diagnostics;
pub mod meta;
pub mod plan;

pub use meta::{PackageMeta, save_pkg_meta};
pub use plan::{CheckoutPlan, CloneDepth, CloneStrategy};

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use regex::Regex;
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::cache::{NoShallowCache, RefCache};
use crate::config::CheckoutConfig;
use crate::core::GitdepError;
use crate::git::progress::ProgressMonitor;
use crate::git::{CliGitRunner, GitCommandOutput, GitRequest, GitRunner, host_of, is_git_repo};
use crate::prompt::{Confirm, StdinConfirm};

/// Old git warns on stderr (while exiting 0) when `clone -b` did not find
/// the branch and fell back to the default branch.
static OLD_GIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)branch .+? not found").expect("valid regex"));

/// Server-side rejection of a shallow request, across git version wordings.
static SHALLOW_REJECTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)rpc failed|shallow|--depth").expect("valid regex"));

/// A repository source plus the target the user declared for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    source: String,
    name: Option<String>,
    target: String,
}

impl Endpoint {
    /// An anonymous endpoint: a source with no stable package name.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: normalize_source(source.into()),
            name: None,
            target: target.into(),
        }
    }

    /// An endpoint with a stable package name. Named endpoints have a
    /// persistent working directory and are eligible for in-place updates.
    pub fn named(
        source: impl Into<String>,
        name: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: normalize_source(source.into()),
            name: Some(name.into()),
            target: target.into(),
        }
    }

    /// The normalized repository source URL.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The stable package name, when one was declared.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The declared target (version range, branch, tag, or commit).
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The name to show in messages: the declared name, or a guess from the
    /// last path segment of the source.
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.source
            .rsplit('/')
            .next()
            .unwrap_or(&self.source)
            .trim_end_matches(".git")
            .to_string()
    }
}

/// Trailing slashes are dropped so `repo.git` and `repo.git/` coalesce in
/// the ref cache. `file://` sources keep theirs; a root path is legal there.
fn normalize_source(source: String) -> String {
    if source.starts_with("file://") {
        source
    } else {
        source.trim_end_matches('/').to_string()
    }
}

/// The concrete object an external resolver picked for an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An exact commit id, optionally with the branch it was found on.
    Commit {
        /// The commit id to check out
        commit: String,
        /// Branch the commit lives on, when known
        branch: Option<String>,
    },
    /// The head of a branch.
    Branch {
        /// The branch name
        branch: String,
        /// The head commit at resolution time, when known
        commit: Option<String>,
    },
    /// A plain tag.
    Tag {
        /// The tag name
        tag: String,
        /// The tagged commit, when known
        commit: Option<String>,
    },
    /// A tag picked by semantic-version matching. Checked out like a tag,
    /// but never eligible for in-place update.
    Version {
        /// The tag the version range resolved to
        tag: String,
        /// The tagged commit, when known
        commit: Option<String>,
    },
}

impl Resolution {
    /// A commit resolution.
    pub fn commit(commit: impl Into<String>, branch: Option<&str>) -> Self {
        Self::Commit {
            commit: commit.into(),
            branch: branch.map(str::to_string),
        }
    }

    /// A branch resolution.
    pub fn branch(branch: impl Into<String>, commit: Option<&str>) -> Self {
        Self::Branch {
            branch: branch.into(),
            commit: commit.map(str::to_string),
        }
    }

    /// A tag resolution.
    pub fn tag(tag: impl Into<String>, commit: Option<&str>) -> Self {
        Self::Tag {
            tag: tag.into(),
            commit: commit.map(str::to_string),
        }
    }

    /// A version resolution (a tag picked from a version range).
    pub fn version(tag: impl Into<String>, commit: Option<&str>) -> Self {
        Self::Version {
            tag: tag.into(),
            commit: commit.map(str::to_string),
        }
    }

    /// The exact commit id, when the resolution carries one.
    #[must_use]
    pub fn commit_id(&self) -> Option<&str> {
        match self {
            Self::Commit {
                commit, ..
            } => Some(commit),
            Self::Branch {
                commit, ..
            }
            | Self::Tag {
                commit, ..
            }
            | Self::Version {
                commit, ..
            } => commit.as_deref(),
        }
    }

    /// The branch name, when the resolution has one.
    #[must_use]
    pub fn branch_name(&self) -> Option<&str> {
        match self {
            Self::Commit {
                branch, ..
            } => branch.as_deref(),
            Self::Branch {
                branch, ..
            } => Some(branch),
            _ => None,
        }
    }

    /// The named ref to pass to `clone -b`, falling back to the commit id
    /// for commit resolutions.
    #[must_use]
    pub fn reference(&self) -> &str {
        match self {
            Self::Commit {
                commit, ..
            } => commit,
            Self::Branch {
                branch, ..
            } => branch,
            Self::Tag {
                tag, ..
            }
            | Self::Version {
                tag, ..
            } => tag,
        }
    }

    /// The tag a version range resolved to, for version resolutions only.
    #[must_use]
    pub fn version_tag(&self) -> Option<&str> {
        match self {
            Self::Version {
                tag, ..
            } => Some(tag),
            _ => None,
        }
    }

    /// Whether this resolution came from semantic-version matching.
    #[must_use]
    pub fn is_version(&self) -> bool {
        matches!(self, Self::Version { .. })
    }
}

/// Where a checkout landed.
pub struct CheckoutOutcome {
    path: PathBuf,
    updated_in_place: bool,
    // Keeps a fresh clone's directory alive for the outcome's lifetime.
    _temp: Option<TempDir>,
}

impl CheckoutOutcome {
    /// The directory holding the checked-out tree.
    ///
    /// For fresh clones this is a temporary directory owned by the outcome;
    /// it is removed when the outcome is dropped, so consumers move or copy
    /// the contents out first.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an existing working directory was updated in place.
    #[must_use]
    pub fn updated_in_place(&self) -> bool {
        self.updated_in_place
    }
}

impl std::fmt::Debug for CheckoutOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutOutcome")
            .field("path", &self.path)
            .field("updated_in_place", &self.updated_in_place)
            .finish()
    }
}

/// The checkout engine. See the [module documentation](self) for the
/// strategies it applies.
///
/// One engine is meant to live for a whole resolution run: the ref cache
/// and the no-shallow host cache are scoped to the instance.
pub struct GitCheckout {
    config: CheckoutConfig,
    runner: Arc<dyn GitRunner>,
    prompt: Arc<dyn Confirm>,
    refs: RefCache,
    no_shallow: NoShallowCache,
}

impl GitCheckout {
    /// Creates an engine that drives the system git binary and prompts on
    /// the controlling terminal.
    #[must_use]
    pub fn new(config: CheckoutConfig) -> Self {
        Self {
            config,
            runner: Arc::new(CliGitRunner),
            prompt: Arc::new(StdinConfirm),
            refs: RefCache::new(),
            no_shallow: NoShallowCache::new(),
        }
    }

    /// Substitutes the git subprocess implementation.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn GitRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Substitutes the confirmation prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: Arc<dyn Confirm>) -> Self {
        self.prompt = prompt;
        self
    }

    /// The no-shallow host cache, shared across this engine's checkouts.
    #[must_use]
    pub fn no_shallow(&self) -> &NoShallowCache {
        &self.no_shallow
    }

    /// Lists the remote refs (heads and tags) of `source`.
    ///
    /// Concurrent calls for the same source share one `git ls-remote`
    /// subprocess, and successful listings are cached for the engine's
    /// lifetime. Each returned line is `"<commit> <refname>"`.
    pub async fn refs(&self, source: &str) -> Result<Vec<String>> {
        let runner = Arc::clone(&self.runner);
        let config = self.config.clone();
        let src = source.to_string();
        self.refs
            .get_or_fetch(source, move || async move {
                let host = host_of(&src);
                let request = GitRequest::new(["ls-remote", "--tags", "--heads", src.as_str()]);
                let output = runner.run(request).await.map_err(|err| {
                    diagnostics::suggest_proxy_workaround(err, &config, &src, &host)
                })?;
                Ok(output.stdout)
            })
            .await
    }

    /// Materializes `resolution` for `endpoint` into a working directory.
    ///
    /// Named endpoints additionally get a metadata file written into the
    /// resulting tree.
    pub async fn checkout(
        &self,
        endpoint: &Endpoint,
        resolution: &Resolution,
    ) -> Result<CheckoutOutcome> {
        crate::git::ensure_git_available()?;

        let host = host_of(endpoint.source());
        let has_working_copy = endpoint
            .name()
            .is_some_and(|name| is_git_repo(&self.config.working_dir_for(name)));

        tracing::debug!(
            target: "git",
            "checking out {} for {}",
            resolution.reference(),
            endpoint.display_name()
        );

        let outcome =
            match CheckoutPlan::select(&self.config, endpoint, resolution, has_working_copy) {
                CheckoutPlan::DirectUpdate {
                    working_dir,
                } => self.direct_update(&working_dir, endpoint, resolution, &host).await?,
                CheckoutPlan::FreshClone => self.fresh_clone(endpoint, resolution, &host).await?,
            };

        if endpoint.name().is_some() {
            let pkg_meta = PackageMeta {
                name: endpoint.display_name(),
                source: endpoint.source().to_string(),
                target: endpoint.target().to_string(),
                version: resolution.version_tag().map(str::to_string),
                commit: resolution.commit_id().map(str::to_string),
            };
            save_pkg_meta(&pkg_meta, outcome.path(), outcome.updated_in_place()).await?;
        }

        Ok(outcome)
    }

    /// Fetch and hard-reset an existing working directory.
    async fn direct_update(
        &self,
        working_dir: &Path,
        endpoint: &Endpoint,
        resolution: &Resolution,
        host: &str,
    ) -> Result<CheckoutOutcome> {
        let source = endpoint.source();

        let status = self
            .run(
                GitRequest::new(["status", "--untracked-files=no", "--porcelain"])
                    .current_dir(working_dir),
                source,
                host,
            )
            .await?;

        if !status.stdout.trim().is_empty() {
            let question = format!(
                "{} has uncommitted changes that will be discarded. Continue?",
                working_dir.display()
            );
            if !self.prompt.confirm(&question).await? {
                return Err(GitdepError::UpdateDeclined {
                    path: working_dir.display().to_string(),
                }
                .into());
            }
        }

        self.run_monitored(GitRequest::new(["fetch", "origin"]).current_dir(working_dir), source, host)
            .await?;

        // Prefer the exact commit; a branch is reset to its fetched remote
        // head, anything else to the local ref the fetch updated.
        let target = match (resolution.commit_id(), resolution.branch_name()) {
            (Some(commit), _) => commit.to_string(),
            (None, Some(branch)) => format!("origin/{branch}"),
            (None, None) => resolution.reference().to_string(),
        };
        self.run(
            GitRequest::new(["reset", "--hard", target.as_str()]).current_dir(working_dir),
            source,
            host,
        )
        .await?;

        Ok(CheckoutOutcome {
            path: working_dir.to_path_buf(),
            updated_in_place: true,
            _temp: None,
        })
    }

    /// Clone into a fresh temporary directory.
    async fn fresh_clone(
        &self,
        endpoint: &Endpoint,
        resolution: &Resolution,
        host: &str,
    ) -> Result<CheckoutOutcome> {
        let temp = tempfile::tempdir().context("Failed to create checkout directory")?;
        let dir = temp.path().to_path_buf();

        match CloneStrategy::select(resolution, self.no_shallow.is_no_shallow(host)) {
            CloneStrategy::Full {
                commit,
            } => self.slow_clone(&dir, endpoint, resolution, host, &commit).await?,
            CloneStrategy::Targeted {
                reference,
                depth,
            } => self.fast_clone(&dir, endpoint, resolution, host, &reference, depth).await?,
        }

        Ok(CheckoutOutcome {
            path: dir,
            updated_in_place: false,
            _temp: Some(temp),
        })
    }

    /// Full clone followed by a hard reset to the target commit.
    async fn slow_clone(
        &self,
        dir: &Path,
        endpoint: &Endpoint,
        resolution: &Resolution,
        host: &str,
        commit: &str,
    ) -> Result<()> {
        let source = endpoint.source();

        let mut args = vec!["clone".to_string(), source.to_string()];
        if let Some(branch) = resolution.branch_name() {
            args.push("-b".to_string());
            args.push(branch.to_string());
        }
        args.push("--progress".to_string());
        args.push(".".to_string());

        self.run_monitored(GitRequest::new(args).current_dir(dir), source, host).await?;
        self.run(GitRequest::new(["reset", "--hard", commit]).current_dir(dir), source, host)
            .await?;
        Ok(())
    }

    /// Single-branch clone of a named ref, shallow when the host allows it.
    ///
    /// A shallow rejection marks the host and retries once at full depth.
    /// Success with an old-git "branch not found" warning, or outright
    /// failure to find the branch, falls back to an explicit checkout.
    async fn fast_clone(
        &self,
        dir: &Path,
        endpoint: &Endpoint,
        resolution: &Resolution,
        host: &str,
        reference: &str,
        mut depth: CloneDepth,
    ) -> Result<()> {
        let source = endpoint.source();

        loop {
            let mut args = vec![
                "clone".to_string(),
                source.to_string(),
                "-b".to_string(),
                reference.to_string(),
                "--progress".to_string(),
                ".".to_string(),
            ];
            if depth.is_shallow() {
                args.push("--depth".to_string());
                args.push("1".to_string());
            }

            match self.run_monitored(GitRequest::new(args).current_dir(dir), source, host).await {
                Ok(output) => {
                    if OLD_GIT_RE.is_match(&output.stderr) {
                        // Old git exits 0 from `clone -b` with an unknown
                        // ref and leaves the default branch checked out.
                        tracing::warn!(
                            target: "git",
                            "git did not honor -b {reference}; checking out explicitly"
                        );
                        self.checkout_ref(dir, resolution, reference, source, host).await?;
                    }
                    return Ok(());
                }
                Err(err) => {
                    let detail = err
                        .downcast_ref::<GitdepError>()
                        .and_then(GitdepError::stderr_detail)
                        .map_or_else(|| format!("{err:#}"), str::to_string);

                    if SHALLOW_REJECTED_RE.is_match(&detail) {
                        if let Some(next) = depth.after_shallow_rejection() {
                            tracing::debug!(
                                target: "git",
                                "{host} rejected a shallow clone, retrying at full depth"
                            );
                            self.no_shallow.mark_no_shallow(host);
                            depth = next;
                            continue;
                        }
                    }

                    if OLD_GIT_RE.is_match(&detail) {
                        tracing::warn!(
                            target: "git",
                            "clone -b {reference} failed, falling back to a plain clone"
                        );
                        self.run_monitored(
                            GitRequest::new(["clone", source, ".", "--progress"])
                                .current_dir(dir),
                            source,
                            host,
                        )
                        .await?;
                        self.checkout_ref(dir, resolution, reference, source, host).await?;
                        return Ok(());
                    }

                    return Err(err);
                }
            }
        }
    }

    /// `git checkout` of the exact commit when known, else the named ref.
    async fn checkout_ref(
        &self,
        dir: &Path,
        resolution: &Resolution,
        reference: &str,
        source: &str,
        host: &str,
    ) -> Result<()> {
        let target = resolution.commit_id().unwrap_or(reference);
        self.run(GitRequest::new(["checkout", target]).current_dir(dir), source, host).await?;
        Ok(())
    }

    /// Runs a short git command through the runner seam.
    async fn run(
        &self,
        request: GitRequest,
        source: &str,
        host: &str,
    ) -> Result<GitCommandOutput> {
        self.runner
            .run(request)
            .await
            .map_err(|err| diagnostics::suggest_proxy_workaround(err, &self.config, source, host))
    }

    /// Runs a long git command with a progress monitor attached.
    async fn run_monitored(
        &self,
        request: GitRequest,
        source: &str,
        host: &str,
    ) -> Result<GitCommandOutput> {
        let (tx, rx) = mpsc::channel(256);
        let monitor = ProgressMonitor::spawn(rx);
        let result = self.runner.run(request.with_progress(tx)).await;
        drop(monitor);
        result.map_err(|err| diagnostics::suggest_proxy_workaround(err, &self.config, source, host))
    }
}
