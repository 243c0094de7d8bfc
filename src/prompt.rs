//! Interactive confirmation seam
//!
//! An in-place update hard-resets a working directory; when that directory
//! has uncommitted changes, the engine asks before discarding them. The
//! question goes through the [`Confirm`] trait so library consumers can
//! substitute their own UI (or an always-yes policy for unattended runs) and
//! tests can script answers.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::io::{BufRead, Write};

/// Asks the operator a yes/no question.
pub trait Confirm: Send + Sync {
    /// Returns `Ok(true)` if the operator accepted.
    fn confirm<'a>(&'a self, question: &'a str) -> BoxFuture<'a, Result<bool>>;
}

/// Prompts on the controlling terminal via stdin/stderr.
///
/// Re-asks on unrecognized input. End of input is treated as a refusal, so
/// a non-interactive run never silently discards changes.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm<'a>(&'a self, question: &'a str) -> BoxFuture<'a, Result<bool>> {
        let question = question.to_string();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let stdin = std::io::stdin();
                let mut lines = stdin.lock().lines();
                loop {
                    eprint!("{question} [y/n]: ");
                    std::io::stderr().flush().context("Failed to flush stderr")?;
                    let Some(line) = lines.next() else {
                        return Ok(false);
                    };
                    let line = line.context("Failed to read confirmation answer")?;
                    if let Some(answer) = parse_answer(&line) {
                        return Ok(answer);
                    }
                }
            })
            .await
            .context("Confirmation prompt task failed")?
        })
    }
}

/// Parses a yes/no answer. Accepts `yes`/`y` and `no`/`n` in any case.
#[must_use]
pub fn parse_answer(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" => Some(true),
        "no" | "n" => Some(false),
        _ => None,
    }
}
