//! Collaborator traits the harvester is written against.
//!
//! The reddit, bulk-index and renderer crates provide the production
//! implementations; tests substitute in-memory fakes.

use crate::{CommentNode, CoreError};
use async_trait::async_trait;

/// Reports whether a post is closed to new comments. Every call is a fresh
/// round trip.
#[async_trait]
pub trait LockOracle: Send + Sync {
    async fn is_locked(&self, identifier: &str) -> Result<bool, CoreError>;
}

/// Paginated comment tree access through the authenticated API.
#[async_trait]
pub trait CommentForest: Send + Sync {
    /// Top-level nodes of the post's comment tree.
    async fn top_level(&self, identifier: &str) -> Result<Vec<CommentNode>, CoreError>;

    /// Resolves up to one batch of placeholder child ids.
    async fn expand_more(
        &self,
        identifier: &str,
        children: &[String],
    ) -> Result<Vec<CommentNode>, CoreError>;

    /// Replies below `parent_id` for a "continue this thread" placeholder.
    async fn continue_thread(
        &self,
        identifier: &str,
        parent_id: &str,
    ) -> Result<Vec<CommentNode>, CoreError>;
}

/// Secondary, eventually consistent comment index.
#[async_trait]
pub trait BulkIndex: Send + Sync {
    async fn comment_bodies(&self, identifier: &str) -> Result<Vec<String>, CoreError>;
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Opens a session on `url`. The caller must close it.
    async fn open(&self, url: &str) -> Result<Box<dyn RenderSession>, CoreError>;
}

#[async_trait]
pub trait RenderSession: Send + Sync {
    /// Text of every element whose class attribute equals `class_name`.
    async fn texts(&self, class_name: &str) -> Result<Vec<String>, CoreError>;

    /// Attribute `attribute` of every element whose class attribute equals
    /// `class_name`; elements without the attribute are left out.
    async fn attributes(&self, class_name: &str, attribute: &str)
        -> Result<Vec<String>, CoreError>;

    async fn close(&mut self) -> Result<(), CoreError>;
}
