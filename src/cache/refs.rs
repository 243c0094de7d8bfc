//! Request-coalescing cache for remote ref listings

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::core::GitdepError;

/// A shared in-flight (or completed) ref listing for one source.
///
/// `Shared` requires a cloneable output, and `anyhow::Error` is not `Clone`,
/// so failures travel behind an `Arc` and are rehydrated per caller.
type SharedRefs = Shared<BoxFuture<'static, Result<Vec<String>, Arc<anyhow::Error>>>>;

/// Coalesces and caches `git ls-remote` listings per source URL.
///
/// The future for a source is stored before it is first awaited, so any
/// number of concurrent callers share a single subprocess. Successful
/// listings stay cached for the lifetime of the cache; failed listings are
/// evicted so the next caller retries.
#[derive(Default)]
pub struct RefCache {
    entries: DashMap<String, SharedRefs>,
}

impl RefCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ref listing for `source`, invoking `fetch` at most once
    /// per source no matter how many callers arrive concurrently.
    ///
    /// `fetch` produces the raw `ls-remote` stdout; each line is normalized
    /// (trimmed, internal runs of tabs and spaces collapsed to one space)
    /// before being cached.
    pub async fn get_or_fetch<F, Fut>(&self, source: &str, fetch: F) -> Result<Vec<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let shared = match self.entries.entry(source.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let future = fetch();
                let shared: SharedRefs = async move {
                    let stdout = future.await.map_err(Arc::new)?;
                    Ok(parse_ref_lines(&stdout))
                }
                .boxed()
                .shared();
                entry.insert(shared.clone());
                shared
            }
        };

        match shared.clone().await {
            Ok(refs) => Ok(refs),
            Err(err) => {
                // Evict only our own failed future; a concurrent retry may
                // already have replaced it.
                self.entries.remove_if(source, |_, cached| cached.ptr_eq(&shared));
                Err(unwrap_shared_error(&err))
            }
        }
    }

    /// Number of sources with a cached (or in-flight) listing.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Normalizes raw `ls-remote` output into one string per ref line.
fn parse_ref_lines(stdout: &str) -> Vec<String> {
    static WS_RUN: std::sync::LazyLock<regex::Regex> =
        std::sync::LazyLock::new(|| regex::Regex::new(r"[\t ]+").expect("valid regex"));

    stdout
        .trim()
        .lines()
        .map(|line| WS_RUN.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Rebuilds a caller-owned error from the shared one.
fn unwrap_shared_error(err: &Arc<anyhow::Error>) -> anyhow::Error {
    match err.downcast_ref::<GitdepError>() {
        Some(typed) => typed.clone().into(),
        None => anyhow::anyhow!("{err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_requests_coalesce() {
        let cache = Arc::new(RefCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok("abc123\trefs/heads/main\ndef456\trefs/tags/v1.0".to_string())
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_fetch("https://example.com/repo.git", fetch(Arc::clone(&calls))),
            cache.get_or_fetch("https://example.com/repo.git", fetch(Arc::clone(&calls))),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_normalizes_whitespace() {
        let cache = RefCache::new();
        let refs = cache
            .get_or_fetch("src", || async {
                Ok("  abc123\t \trefs/heads/main  \n\ndef456\trefs/tags/v1.0\n".to_string())
            })
            .await
            .unwrap();
        assert_eq!(refs, vec!["abc123 refs/heads/main", "def456 refs/tags/v1.0"]);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = RefCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = Arc::clone(&calls);
        let result = cache
            .get_or_fetch("src", move || async move {
                failing.fetch_add(1, Ordering::SeqCst);
                Err(GitdepError::GitCommandError {
                    operation: "ls-remote".to_string(),
                    stderr: "fatal: could not read from remote".to_string(),
                }
                .into())
            })
            .await;
        let err = result.expect_err("first fetch fails");
        assert!(err.downcast_ref::<GitdepError>().is_some());

        let succeeding = Arc::clone(&calls);
        let refs = cache
            .get_or_fetch("src", move || async move {
                succeeding.fetch_add(1, Ordering::SeqCst);
                Ok("abc123\trefs/heads/main".to_string())
            })
            .await
            .unwrap();
        assert_eq!(refs, vec!["abc123 refs/heads/main"]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_success_is_cached() {
        let cache = RefCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = Arc::clone(&calls);
            let refs = cache
                .get_or_fetch("src", move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok("abc123\trefs/heads/main".to_string())
                })
                .await
                .unwrap();
            assert_eq!(refs.len(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }
}
