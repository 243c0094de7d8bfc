//! Failure diagnostics for git subprocess errors
//!
//! The `git://` protocol cannot traverse an HTTP proxy, and the resulting
//! git error ("unable to connect", timeouts) never says so. When a proxy is
//! configured and a `git://` operation fails, the remediation steps are
//! appended to the captured stderr so the operator sees concrete `git
//! config` commands instead of a dead end.

use crate::config::CheckoutConfig;
use crate::core::GitdepError;

/// Appends proxy remediation guidance to `err` when it plausibly failed
/// because a `git://` transport met an HTTP proxy.
///
/// The error's classification is preserved; only its captured stderr grows.
/// Errors without subprocess detail, non-`git://` sources, and unproxied
/// environments pass through untouched.
pub fn suggest_proxy_workaround(
    err: anyhow::Error,
    config: &CheckoutConfig,
    source: &str,
    host: &str,
) -> anyhow::Error {
    if !config.has_proxy() || !source.starts_with("git://") {
        return err;
    }

    match err.downcast::<GitdepError>() {
        Ok(typed) if typed.stderr_detail().is_some() => {
            typed.with_appended_detail(&remediation(host)).into()
        }
        Ok(typed) => typed.into(),
        Err(other) => other,
    }
}

fn remediation(host: &str) -> String {
    format!(
        "A proxy is configured, and the git:// protocol does not work through \
         HTTP proxies.\n\
         Tell git to use https:// instead:\n\n    \
         git config --global url.\"https://\".insteadOf git://\n\n\
         or, for this host only:\n\n    \
         git config --global url.\"https://{host}/\".insteadOf \"git://{host}/\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxied_config() -> CheckoutConfig {
        CheckoutConfig {
            proxy: Some("http://proxy.local:8080".to_string()),
            ..CheckoutConfig::default()
        }
    }

    fn clone_error() -> anyhow::Error {
        GitdepError::GitCloneFailed {
            url: "git://example.com/repo.git".to_string(),
            reason: "fatal: unable to connect to example.com".to_string(),
        }
        .into()
    }

    #[test]
    fn test_appends_hint_for_git_protocol_behind_proxy() {
        let augmented = suggest_proxy_workaround(
            clone_error(),
            &proxied_config(),
            "git://example.com/repo.git",
            "example.com",
        );
        let typed = augmented.downcast_ref::<GitdepError>().expect("classification kept");
        let detail = typed.stderr_detail().unwrap();
        assert!(detail.starts_with("fatal: unable to connect"));
        assert!(detail.contains("url.\"https://example.com/\".insteadOf"));
    }

    #[test]
    fn test_no_hint_without_proxy() {
        let err = suggest_proxy_workaround(
            clone_error(),
            &CheckoutConfig::default(),
            "git://example.com/repo.git",
            "example.com",
        );
        let typed = err.downcast_ref::<GitdepError>().unwrap();
        assert!(!typed.stderr_detail().unwrap().contains("insteadOf"));
    }

    #[test]
    fn test_no_hint_for_https_source() {
        let err = suggest_proxy_workaround(
            clone_error(),
            &proxied_config(),
            "https://example.com/repo.git",
            "example.com",
        );
        let typed = err.downcast_ref::<GitdepError>().unwrap();
        assert!(!typed.stderr_detail().unwrap().contains("insteadOf"));
    }
}
