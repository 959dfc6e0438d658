//! # Request Context
//!
//! Carries the caller's cancellation signal and deadline into every repository
//! and executor call made on its behalf. A client that gives up (token
//! cancelled or deadline passed) aborts all in-flight engine work at the next
//! await point.

use crate::error::RepositoryError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RequestContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    correlation_id: Uuid,
    workspace_id: Option<String>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Context with no deadline and a fresh cancellation token
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            deadline: None,
            correlation_id: Uuid::now_v7(),
            workspace_id: None,
        }
    }

    /// Derive a context bound to an existing token (for example one owned by a
    /// transport layer)
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    /// Child context sharing this deadline; cancelling the parent cancels the child
    pub fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
            deadline: self.deadline,
            correlation_id: self.correlation_id,
            workspace_id: self.workspace_id.clone(),
        }
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn workspace_id(&self) -> Option<&str> {
        self.workspace_id.as_deref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Fail fast when the caller has already gone away
    pub fn ensure_active(&self, operation: &str) -> Result<(), RepositoryError> {
        if self.is_cancelled() {
            return Err(RepositoryError::Cancelled(operation.to_string()));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(RepositoryError::DeadlineExceeded(operation.to_string()));
            }
        }
        Ok(())
    }

    /// Race `fut` against cancellation and the deadline.
    ///
    /// The future is dropped as soon as either fires, so work it has not yet
    /// completed is abandoned rather than left running in the background.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        self.ensure_active(operation)?;

        let deadline = self.deadline;
        let sleep = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => {
                Err(RepositoryError::Cancelled(operation.to_string()))
            }
            _ = sleep => Err(RepositoryError::DeadlineExceeded(operation.to_string())),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_through_result() {
        let ctx = RequestContext::new();
        let value = ctx.run("read", async { Ok::<_, RepositoryError>(7) }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn test_cancelled_context_short_circuits() {
        let ctx = RequestContext::new();
        ctx.cancel();
        let result = ctx
            .run("read", async { Ok::<_, RepositoryError>(()) })
            .await;
        assert!(matches!(result, Err(RepositoryError::Cancelled(_))));
    }

    #[test]
    fn test_run_wakes_on_cancellation() {
        let ctx = RequestContext::new();
        let mut call = tokio_test::task::spawn(
            ctx.run("wait", std::future::pending::<Result<(), RepositoryError>>()),
        );
        tokio_test::assert_pending!(call.poll());

        ctx.cancel();
        assert!(call.is_woken());
        let result = tokio_test::assert_ready!(call.poll());
        assert!(matches!(result, Err(RepositoryError::Cancelled(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_slow_call() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(50));
        let result = ctx
            .run("slow_read", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, RepositoryError>(())
            })
            .await;
        assert!(matches!(result, Err(RepositoryError::DeadlineExceeded(_))));
    }

    #[tokio::test]
    async fn test_child_is_cancelled_with_parent() {
        let parent = RequestContext::new().with_workspace("ops");
        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
        assert_eq!(child.workspace_id(), Some("ops"));
        assert_eq!(child.correlation_id(), parent.correlation_id());
    }
}
