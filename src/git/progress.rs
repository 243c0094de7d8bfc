//! Progress reporting for long-running git operations
//!
//! Git writes transfer progress to stderr as carriage-return updated lines
//! like `Receiving objects:  42% (1234/2938)`. Forwarding that stream raw
//! would flood the logs, and echoing it for fast operations is pure noise.
//! [`ProgressMonitor`] applies three filters:
//!
//! - nothing is emitted during an initial grace period, so operations that
//!   finish quickly stay silent
//! - only lines containing a percentage figure are forwarded
//! - emissions are throttled to at most one per second, keeping the latest
//!   batch of lines seen in the interval

use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use regex::Regex;

/// Silence window before any progress is reported.
const GRACE_PERIOD: Duration = Duration::from_secs(8);

/// Minimum interval between progress emissions.
const EMIT_INTERVAL: Duration = Duration::from_secs(1);

/// Matches a percentage figure of up to three digits.
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,3}%").expect("valid regex"));

/// Monitors the stderr stream of a git subprocess and forwards throttled
/// percentage lines.
///
/// The monitor owns a background task; dropping the monitor aborts it, so a
/// command that finishes within the grace period never reports anything.
pub struct ProgressMonitor {
    handle: JoinHandle<()>,
}

impl ProgressMonitor {
    /// Spawns a monitor that logs progress lines via `tracing`.
    #[must_use]
    pub fn spawn(receiver: mpsc::Receiver<String>) -> Self {
        Self::spawn_with(receiver, |line| {
            tracing::info!(target: "progress", "{line}");
        })
    }

    /// Spawns a monitor with a custom emitter. Tests use this to capture
    /// exactly what would have been logged.
    pub fn spawn_with<F>(mut receiver: mpsc::Receiver<String>, emit: F) -> Self
    where
        F: Fn(&str) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            // Chunks arriving during the grace period are discarded, matching
            // the silence the user expects from a fast operation.
            let grace = tokio::time::sleep(GRACE_PERIOD);
            tokio::pin!(grace);
            loop {
                tokio::select! {
                    () = &mut grace => break,
                    chunk = receiver.recv() => {
                        if chunk.is_none() {
                            return;
                        }
                    }
                }
            }

            let mut pending = String::new();
            let mut last_emit: Option<Instant> = None;

            while let Some(chunk) = receiver.recv().await {
                pending.push_str(&chunk);

                if last_emit.is_none_or(|at| at.elapsed() >= EMIT_INTERVAL) {
                    if emit_percent_lines(&pending, &emit) {
                        last_emit = Some(Instant::now());
                    }
                    pending.clear();
                }
            }
        });

        Self {
            handle,
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Emits the percentage-bearing lines of `chunk`, returning whether anything
/// was emitted.
fn emit_percent_lines<F: Fn(&str)>(chunk: &str, emit: &F) -> bool {
    let mut emitted = false;
    for line in chunk.split(['\r', '\n']) {
        let line = line.trim_matches(|c: char| c.is_whitespace() || c.is_control());
        if !line.is_empty() && PERCENT_RE.is_match(line) {
            emit(line);
            emitted = true;
        }
    }
    emitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn collector() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + 'static) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        (lines, move |line: &str| sink.lock().unwrap().push(line.to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_during_grace_period() {
        let (lines, emit) = collector();
        let (tx, rx) = mpsc::channel(16);
        let _monitor = ProgressMonitor::spawn_with(rx, emit);

        tx.send("Receiving objects:  10% (1/10)\r".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(lines.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_filters_to_percentage_lines() {
        let (lines, emit) = collector();
        let (tx, rx) = mpsc::channel(16);
        let _monitor = ProgressMonitor::spawn_with(rx, emit);

        tokio::time::sleep(Duration::from_secs(9)).await;
        tx.send("Cloning into 'pkg'...\nReceiving objects:  42% (420/1000)\r".to_string())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let lines = lines.lock().unwrap();
        assert_eq!(lines.as_slice(), ["Receiving objects:  42% (420/1000)"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttles_to_one_emission_per_second() {
        let (lines, emit) = collector();
        let (tx, rx) = mpsc::channel(64);
        let _monitor = ProgressMonitor::spawn_with(rx, emit);

        tokio::time::sleep(Duration::from_secs(9)).await;
        for pct in 0..10 {
            tx.send(format!("Receiving objects:  {pct}% (x/y)\r")).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        // 10 chunks over one second: the first emits immediately, chunks
        // inside the throttle window accumulate and flush together once the
        // interval elapses.
        let count = lines.lock().unwrap().len();
        assert!(count <= 10, "emissions not throttled: {count}");
        assert!(count >= 1, "nothing emitted");
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_after_drop() {
        let (lines, emit) = collector();
        let (tx, rx) = mpsc::channel(16);
        let monitor = ProgressMonitor::spawn_with(rx, emit);

        tokio::time::sleep(Duration::from_secs(9)).await;
        drop(monitor);
        let _ = tx.send("Receiving objects:  99% (99/100)\r".to_string()).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(lines.lock().unwrap().is_empty());
    }
}
