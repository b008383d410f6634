//! bike-exchange/crates/bx-core/src/lib.rs
//!
//! Posting lifecycle and reconciliation engine for the bike-exchange
//! marketplace client: domain models, ports, and the logic that keeps the
//! seller's view consistent with the backend.

pub mod builder;
pub mod cache;
pub mod cancel;
pub mod desks;
pub mod dto;
pub mod error;
pub mod models;
pub mod notifier;
pub mod public;
pub mod repository;
pub mod session;
pub mod status;
pub mod storage;
pub mod traits;

// Re-exporting for easier access in other crates
pub use desks::{AdminDesk, InspectorDesk, SellerDesk, SyncReport};
pub use dto::*;
pub use error::*;
pub use models::*;
pub use notifier::{Notification, StatusChangeNotifier, Tone};
pub use repository::{merge_postings, PostingRepository};
pub use session::{Role, SessionContext, UserProfile};
pub use status::*;
pub use storage::MemoryStore;
pub use traits::*;
