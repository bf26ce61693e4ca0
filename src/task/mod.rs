//! Polling of asynchronous backend tasks.
//!
//! Accepted change-sets are processed asynchronously; the backend answers
//! with a `Location` URL hosting a `datagator#Task` document. A [`Task`]
//! polls that URL on demand. Polling is always explicit, never started in
//! the background.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use crate::entity::{normalized, Context, EntityError, Kind, Result};
use crate::protocol::{self, TaskDocument, TaskStatus};
use crate::response::ValidatedResponse;

/// Handle on an asynchronous backend operation.
pub struct Task {
    ctx: Arc<Context>,
    location: String,
}

impl Task {
    pub(crate) fn new(ctx: Arc<Context>, location: String) -> Self {
        Self { ctx, location }
    }

    /// The task's `Location` URL.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Fetch the task document once.
    pub async fn poll(&self) -> Result<TaskDocument> {
        let response = self
            .ctx
            .service()
            .get(&self.location, HeaderMap::new())
            .await?;
        let validated =
            ValidatedResponse::receive(response, self.ctx.schema(), &[StatusCode::OK]).await?;
        let document: TaskDocument = protocol::from_value(validated.into_document())?;
        if !Kind::Task.matches(&document.kind) {
            return Err(EntityError::KindMismatch {
                expected: Kind::Task.as_str().to_string(),
                actual: normalized(&document.kind).to_string(),
            });
        }
        Ok(document)
    }

    /// Poll until the task reaches a terminal state.
    ///
    /// Waits `interval` between polls and gives up after `max_polls`
    /// attempts. A task ending in `ERR` is reported as a failure.
    pub async fn wait(&self, interval: Duration, max_polls: usize) -> Result<TaskDocument> {
        for attempt in 1..=max_polls {
            let document = self.poll().await?;
            match document.status {
                TaskStatus::Success => return Ok(document),
                TaskStatus::Failure => {
                    return Err(EntityError::TaskFailed {
                        message: document.message.unwrap_or_default(),
                    })
                }
                TaskStatus::Pending if attempt < max_polls => {
                    tokio::time::sleep(interval).await;
                }
                TaskStatus::Pending => {}
            }
        }
        Err(EntityError::TaskIncomplete(max_polls))
    }
}

// =============================================================================
// Tests
// =============================================================================
