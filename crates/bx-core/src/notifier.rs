//! # Status-Change Notifier
//!
//! Tells a seller when one of their postings moved to a status they care
//! about, exactly once per move and across restarts. The persisted mapping
//! is the last *notified* state, not an audit log: it is overwritten with
//! the current collection after every run.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::Posting;
use crate::status::Status;
use crate::traits::KeyValueStore;

pub const SNAPSHOT_KEY: &str = "bx.posting-status.prev";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Success,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub posting_id: String,
    pub title: String,
    pub message: String,
    pub tone: Tone,
}

/// Decides whether `previous -> posting.status` deserves a notification.
pub fn notification_for(previous: Option<Status>, posting: &Posting) -> Option<Notification> {
    let previous = previous?;
    let name = &posting.name;
    let (title, message, tone) = match (previous, posting.status) {
        (Status::Pending, Status::AdminApproved) => (
            "Listing approved",
            format!("\"{name}\" was approved by an admin and is awaiting inspection."),
            Tone::Success,
        ),
        (Status::Pending | Status::AdminApproved, Status::Available) => (
            "Listing is live",
            format!("\"{name}\" passed inspection and is now visible on the marketplace."),
            Tone::Success,
        ),
        (prev, Status::Rejected) if prev != Status::Rejected => (
            "Listing rejected",
            match posting.rejection_reason.as_deref().map(str::trim) {
                Some(reason) if !reason.is_empty() => {
                    format!("\"{name}\" was rejected: {reason}")
                }
                _ => format!("\"{name}\" was rejected."),
            },
            Tone::Warning,
        ),
        _ => return None,
    };
    Some(Notification {
        posting_id: posting.id.clone(),
        title: title.to_string(),
        message,
        tone,
    })
}

pub struct StatusChangeNotifier<S> {
    store: Arc<S>,
}

impl<S: KeyValueStore> StatusChangeNotifier<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn load_snapshot(&self) -> HashMap<String, Status> {
        let raw = match self.store.get(SNAPSHOT_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return HashMap::new(),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read status snapshot");
                return HashMap::new();
            }
        };
        match serde_json::from_str::<HashMap<String, String>>(&raw) {
            // Entries written by older clients may hold statuses we no longer
            // know; they count as unobserved.
            Ok(entries) => entries
                .into_iter()
                .filter_map(|(id, status)| status.parse().ok().map(|status| (id, status)))
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "Discarding corrupt status snapshot");
                HashMap::new()
            }
        }
    }

    async fn store_snapshot(&self, postings: &[Posting]) {
        let snapshot: HashMap<&str, Status> = postings
            .iter()
            .map(|posting| (posting.id.as_str(), posting.status))
            .collect();
        let outcome = match serde_json::to_string(&snapshot) {
            Ok(json) => self.store.set(SNAPSHOT_KEY, json).await,
            Err(err) => Err(err.into()),
        };
        if let Err(err) = outcome {
            tracing::warn!(error = %err, "Failed to write status snapshot");
        }
    }

    /// Diffs `postings` against the last run and returns what to show.
    pub async fn observe(&self, postings: &[Posting]) -> Vec<Notification> {
        if postings.is_empty() {
            return Vec::new();
        }
        let previous = self.load_snapshot().await;
        let notifications: Vec<Notification> = postings
            .iter()
            .filter_map(|posting| notification_for(previous.get(&posting.id).copied(), posting))
            .collect();
        for notification in &notifications {
            tracing::info!(posting_id = %notification.posting_id, title = %notification.title, "Posting status notification");
        }
        self.store_snapshot(postings).await;
        notifications
    }
}
