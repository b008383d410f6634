//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;

use crate::dto::{
    CreatePostRequest, CreatedPost, ImageUpload, ListParams, StatusChange, UpdatePostRequest,
    UploadedImage,
};
use crate::error::Result;
use crate::models::{RawPostRow, SellerId};
use crate::status::Status;

/// Marketplace backend contract for bicycle posts.
///
/// Row shapes are backend-owned; the builder normalizes them.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostingBackend: Send + Sync {
    // Post Operations
    async fn create_posting(&self, request: &CreatePostRequest) -> Result<CreatedPost>;
    async fn get_posting(&self, post_id: i64) -> Result<RawPostRow>;
    async fn update_posting(&self, post_id: i64, request: &UpdatePostRequest) -> Result<RawPostRow>;
    async fn delete_posting(&self, post_id: i64) -> Result<()>;

    /// Admin approve/reject, inspector submit-result and the remaining moves.
    async fn update_posting_status(&self, post_id: i64, change: &StatusChange) -> Result<RawPostRow>;

    // Listing Operations
    async fn list_by_seller(&self, seller_id: SellerId) -> Result<Vec<RawPostRow>>;
    async fn list_by_status(&self, status: Status) -> Result<Vec<RawPostRow>>;
    async fn list_all(&self, params: ListParams) -> Result<Vec<RawPostRow>>;

    // Media Operations
    async fn upload_image(&self, upload: ImageUpload) -> Result<UploadedImage>;
}

/// Durable string storage (the browser's localStorage, a directory, ...).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}
