//! Rate-limited note submission.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::{Method, Request, StatusCode};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::note::{Note, Visibility};
use super::transport::{ReqwestTransport, Transport};
use super::NotePublisher;
use crate::config::MisskeyConfig;
use crate::context::Context;
use crate::error::{PostError, Result};
use crate::ratelimit::TokenBucket;

/// Path of the note creation endpoint.
const CREATE_NOTE_PATH: &str = "/api/notes/create";

/// Body of a `notes/create` call.
#[derive(Serialize)]
struct CreateNoteRequest<'a> {
    i: &'a str,
    text: &'a str,
    visibility: Visibility,
}

/// Posts notes to one Misskey instance, throttled by a token bucket.
///
/// Safe to share across tasks; the bucket is the only mutable state.
pub struct NoteSubmitter<T: Transport = ReqwestTransport> {
    host: String,
    auth_token: String,
    http_timeout: Duration,
    limiter: Arc<TokenBucket>,
    transport: T,
}

impl NoteSubmitter<ReqwestTransport> {
    /// Create a submitter with its own bucket and HTTP client.
    pub fn new(config: &MisskeyConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.http_timeout())?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> NoteSubmitter<T> {
    /// Create a submitter sending through `transport`.
    pub fn with_transport(config: &MisskeyConfig, transport: T) -> Self {
        let limiter = Arc::new(TokenBucket::new(
            config.max_requests(),
            config.refill_interval(),
        ));

        debug!(
            host = %config.host,
            max_requests = limiter.max_tokens(),
            refill_interval_ms = limiter.refill_interval().as_millis() as u64,
            "Creating note submitter"
        );

        Self {
            host: config.host.clone(),
            auth_token: config.auth_token.clone(),
            http_timeout: config.http_timeout(),
            limiter,
            transport,
        }
    }

    /// Replace the bucket, e.g. to share one quota between submitters.
    pub fn with_limiter(mut self, limiter: Arc<TokenBucket>) -> Self {
        self.limiter = limiter;
        self
    }

    /// The bucket throttling this submitter.
    pub fn limiter(&self) -> &Arc<TokenBucket> {
        &self.limiter
    }

    /// Host this submitter posts to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Full URL of the note creation endpoint.
    pub fn endpoint(&self) -> String {
        format!("https://{}{}", self.host, CREATE_NOTE_PATH)
    }

    /// Post a note.
    ///
    /// Waits for a token first; if `ctx` is done before one is available the
    /// call fails with [`PostError::RateLimited`] without touching the
    /// network. Otherwise exactly one request is sent, and only a `200 OK`
    /// counts as success.
    #[instrument(
        skip(self, ctx, note),
        fields(host = %self.host, visibility = %note.visibility())
    )]
    pub async fn post(&self, ctx: &Context, note: &Note) -> std::result::Result<(), PostError> {
        self.limiter
            .acquire(ctx)
            .await
            .map_err(PostError::RateLimited)?;

        let payload = serde_json::to_vec(&CreateNoteRequest {
            i: &self.auth_token,
            text: note.text(),
            visibility: note.visibility(),
        })?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint())
            .header(CONTENT_TYPE, "application/json")
            .body(payload)?;

        let status = tokio::select! {
            biased;
            cause = ctx.done() => {
                debug!(cause = %cause, "Request cancelled in flight");
                return Err(PostError::Transport(Box::new(cause)));
            }
            result = tokio::time::timeout(self.http_timeout, self.transport.send(request)) => {
                match result {
                    Ok(Ok(status)) => status,
                    Ok(Err(e)) => return Err(PostError::Transport(e)),
                    Err(elapsed) => return Err(PostError::Transport(Box::new(elapsed))),
                }
            }
        };

        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "Note rejected by API");
            return Err(PostError::Api { status });
        }

        debug!("Note posted");
        Ok(())
    }
}

#[async_trait]
impl<T: Transport> NotePublisher for NoteSubmitter<T> {
    async fn publish(&self, ctx: &Context, note: &Note) -> std::result::Result<(), PostError> {
        self.post(ctx, note).await
    }
}
