//! Misskey API client for posting notes.

mod note;
mod submitter;
mod transport;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::PostError;

pub use note::{Note, Visibility};
pub use submitter::NoteSubmitter;
pub use transport::{ReqwestTransport, Transport};

/// Trait for anything that can publish notes.
///
/// Feed pollers and other producers depend on this rather than on
/// [`NoteSubmitter`] directly, so they can be driven against a fake.
#[async_trait]
pub trait NotePublisher: Send + Sync {
    /// Publish one note, honouring `ctx` for cancellation.
    async fn publish(&self, ctx: &Context, note: &Note) -> Result<(), PostError>;
}
