//! Checkout planning: acquisition mode, clone depth, and clone strategy
//!
//! These types make the engine's decisions explicit and testable without a
//! subprocess. [`CheckoutPlan`] picks between updating an existing working
//! directory and cloning fresh; [`CloneStrategy`] picks the clone shape for
//! a given resolution; [`CloneDepth`] encodes the single permitted
//! shallow-to-full retry.

use std::path::PathBuf;

use crate::checkout::{Endpoint, Resolution};
use crate::config::CheckoutConfig;

/// How a resolution will be materialized on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutPlan {
    /// Fetch and hard-reset an existing working directory in place.
    DirectUpdate {
        /// The persistent working directory to update
        working_dir: PathBuf,
    },
    /// Clone into a fresh temporary directory.
    FreshClone,
}

impl CheckoutPlan {
    /// Selects the acquisition mode.
    ///
    /// Direct update requires all of: the mode enabled in configuration, a
    /// stable endpoint name, an existing git working copy at the persistent
    /// directory, and a non-version resolution. Version resolutions always
    /// clone fresh, since the tag an existing directory was created from may
    /// differ from the newly resolved one.
    #[must_use]
    pub fn select(
        config: &CheckoutConfig,
        endpoint: &Endpoint,
        resolution: &Resolution,
        has_working_copy: bool,
    ) -> Self {
        if !config.direct_update || resolution.is_version() {
            return Self::FreshClone;
        }
        let Some(name) = endpoint.name() else {
            return Self::FreshClone;
        };
        if !has_working_copy {
            return Self::FreshClone;
        }
        Self::DirectUpdate {
            working_dir: config.working_dir_for(name),
        }
    }
}

/// Depth of a targeted clone attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneDepth {
    /// `--depth 1`
    Shallow,
    /// Unrestricted history
    Full,
}

impl CloneDepth {
    /// The depth to retry at after the server rejected this attempt as a
    /// shallow problem. A rejection at full depth is final.
    #[must_use]
    pub const fn after_shallow_rejection(self) -> Option<Self> {
        match self {
            Self::Shallow => Some(Self::Full),
            Self::Full => None,
        }
    }

    /// Whether this depth passes `--depth 1`.
    #[must_use]
    pub const fn is_shallow(self) -> bool {
        matches!(self, Self::Shallow)
    }
}

/// Shape of the clone for a fresh checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneStrategy {
    /// Full clone followed by a hard reset to an exact commit. Used when the
    /// resolution pins a commit id, which `-b` cannot target.
    Full {
        /// The commit to reset to after cloning
        commit: String,
    },
    /// Single-branch clone of a named ref (`-b <ref>`), shallow when the
    /// host allows it.
    Targeted {
        /// The branch or tag to clone
        reference: String,
        /// Initial depth for the attempt
        depth: CloneDepth,
    },
}

impl CloneStrategy {
    /// Selects the clone shape for `resolution`.
    #[must_use]
    pub fn select(resolution: &Resolution, host_rejects_shallow: bool) -> Self {
        match resolution {
            Resolution::Commit {
                commit, ..
            } => Self::Full {
                commit: commit.clone(),
            },
            Resolution::Branch {
                branch: reference, ..
            }
            | Resolution::Tag {
                tag: reference, ..
            }
            | Resolution::Version {
                tag: reference, ..
            } => Self::Targeted {
                reference: reference.clone(),
                depth: if host_rejects_shallow {
                    CloneDepth::Full
                } else {
                    CloneDepth::Shallow
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_update_config() -> CheckoutConfig {
        CheckoutConfig {
            direct_update: true,
            ..CheckoutConfig::default()
        }
    }

    #[test]
    fn test_plan_requires_direct_update_enabled() {
        let endpoint = Endpoint::named("https://example.com/repo.git", "pkg", "main");
        let resolution = Resolution::branch("main", None);
        let plan =
            CheckoutPlan::select(&CheckoutConfig::default(), &endpoint, &resolution, true);
        assert_eq!(plan, CheckoutPlan::FreshClone);
    }

    #[test]
    fn test_plan_requires_stable_name() {
        let endpoint = Endpoint::new("https://example.com/repo.git", "main");
        let resolution = Resolution::branch("main", None);
        let plan = CheckoutPlan::select(&direct_update_config(), &endpoint, &resolution, true);
        assert_eq!(plan, CheckoutPlan::FreshClone);
    }

    #[test]
    fn test_plan_version_resolution_always_clones_fresh() {
        let endpoint = Endpoint::named("https://example.com/repo.git", "pkg", "^1.0.0");
        let resolution = Resolution::version("v1.2.3", None);
        let plan = CheckoutPlan::select(&direct_update_config(), &endpoint, &resolution, true);
        assert_eq!(plan, CheckoutPlan::FreshClone);
    }

    #[test]
    fn test_plan_direct_update_when_all_conditions_hold() {
        let endpoint = Endpoint::named("https://example.com/repo.git", "pkg", "main");
        let resolution = Resolution::branch("main", None);
        let config = direct_update_config();
        let plan = CheckoutPlan::select(&config, &endpoint, &resolution, true);
        assert_eq!(
            plan,
            CheckoutPlan::DirectUpdate {
                working_dir: config.working_dir_for("pkg")
            }
        );
    }

    #[test]
    fn test_depth_retries_exactly_once() {
        assert_eq!(CloneDepth::Shallow.after_shallow_rejection(), Some(CloneDepth::Full));
        assert_eq!(CloneDepth::Full.after_shallow_rejection(), None);
    }

    #[test]
    fn test_strategy_for_commit_is_full_clone() {
        let resolution = Resolution::commit("abc123", None);
        let strategy = CloneStrategy::select(&resolution, false);
        assert_eq!(
            strategy,
            CloneStrategy::Full {
                commit: "abc123".to_string()
            }
        );
        // A flagged host changes nothing for commit resolutions.
        assert_eq!(CloneStrategy::select(&resolution, true), strategy);
    }

    #[test]
    fn test_strategy_for_tag_respects_host_flag() {
        let resolution = Resolution::tag("v1.0", None);
        assert_eq!(
            CloneStrategy::select(&resolution, false),
            CloneStrategy::Targeted {
                reference: "v1.0".to_string(),
                depth: CloneDepth::Shallow
            }
        );
        assert_eq!(
            CloneStrategy::select(&resolution, true),
            CloneStrategy::Targeted {
                reference: "v1.0".to_string(),
                depth: CloneDepth::Full
            }
        );
    }
}
