//! Isolated-failure fan-out: every task runs on its own, and a failure,
//! panic or timeout is recorded for that task without touching the others.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::rate_limiter::SourceLimiter;
use crate::error::Result;
use crate::observability::metrics;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    Ok(T),
    Failed(String),
    TimedOut,
}

impl<T> TaskOutcome<T> {
    fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Ok(_) => "ok",
            TaskOutcome::Failed(_) => "failed",
            TaskOutcome::TimedOut => "timed_out",
        }
    }
}

/// Run `task` over every item. At most `limiter`'s concurrency run at once;
/// each task gets its own `timeout`. Outcomes come back in input order.
pub async fn run_isolated<I, T, F, Fut>(
    items: Vec<I>,
    limiter: &SourceLimiter,
    timeout: Option<Duration>,
    task: F,
) -> Vec<TaskOutcome<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let total = items.len();
    let mut set = JoinSet::new();
    for (index, item) in items.into_iter().enumerate() {
        let limiter = limiter.clone();
        let fut = task(item);
        set.spawn(async move {
            let _permit = limiter.acquire().await;
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(Ok(value)) => TaskOutcome::Ok(value),
                    Ok(Err(e)) => TaskOutcome::Failed(e.to_string()),
                    Err(_) => TaskOutcome::TimedOut,
                },
                None => match fut.await {
                    Ok(value) => TaskOutcome::Ok(value),
                    Err(e) => TaskOutcome::Failed(e.to_string()),
                },
            };
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<TaskOutcome<T>>> = (0..total).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, outcome)) => {
                metrics::tasks::finished(outcome.label());
                match &outcome {
                    TaskOutcome::Failed(msg) => debug!("Task {} failed: {}", index, msg),
                    TaskOutcome::TimedOut => debug!("Task {} timed out", index),
                    TaskOutcome::Ok(_) => {}
                }
                slots[index] = Some(outcome);
            }
            // a panicked task leaves its slot empty and is reported below
            Err(e) => warn!("Task aborted: {}", e),
        }
    }

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                metrics::tasks::finished("failed");
                TaskOutcome::Failed("task panicked".to_string())
            })
        })
        .collect()
}
