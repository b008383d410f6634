//! # Listing Lifecycle
//!
//! The closed status vocabulary of a bicycle posting and the graph of legal
//! moves between statuses. Every status change in the client goes through
//! [`Status::transition`] or a named [`Transition`].
//!
//! ```text
//! DRAFT ──► PENDING ──► ADMIN_APPROVED ──► AVAILABLE ◄──► SOLD
//!              │              │    │           │
//!              └──► REJECTED ◄┘    └─► EXPIRED ◄┘
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Saved by the seller, never submitted.
    Draft,
    /// Awaiting admin content review.
    Pending,
    /// Content approved, awaiting inspection.
    AdminApproved,
    /// Passed inspection, publicly listed.
    Available,
    /// Content or inspection rejected. Carries a rejection reason.
    Rejected,
    Sold,
    Expired,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::Draft,
        Status::Pending,
        Status::AdminApproved,
        Status::Available,
        Status::Rejected,
        Status::Sold,
        Status::Expired,
    ];

    /// Statuses shown on the public marketplace.
    pub const PUBLIC: [Status; 2] = [Status::Available, Status::AdminApproved];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Draft => "DRAFT",
            Status::Pending => "PENDING",
            Status::AdminApproved => "ADMIN_APPROVED",
            Status::Available => "AVAILABLE",
            Status::Rejected => "REJECTED",
            Status::Sold => "SOLD",
            Status::Expired => "EXPIRED",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Draft => "Draft",
            Status::Pending => "Pending",
            Status::AdminApproved => "Admin Approved",
            Status::Available => "Available",
            Status::Rejected => "Rejected",
            Status::Sold => "Sold",
            Status::Expired => "Expired",
        }
    }

    /// Newly approved postings are discoverable before inspection completes.
    pub fn is_publicly_visible(self) -> bool {
        Status::PUBLIC.contains(&self)
    }

    /// Returns true if `self -> next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Draft, Status::Pending)
                | (Status::Pending, Status::AdminApproved)
                | (Status::Pending, Status::Rejected)
                | (Status::AdminApproved, Status::Available)
                | (Status::AdminApproved, Status::Rejected)
                | (Status::AdminApproved, Status::Expired)
                | (Status::Available, Status::Sold)
                | (Status::Available, Status::Expired)
                | (Status::Sold, Status::Available)
        )
    }

    /// Total transition function: the requested status, or `InvalidTransition`.
    pub fn transition(self, requested: Status) -> Result<Status> {
        if self.can_transition_to(requested) {
            Ok(requested)
        } else {
            Err(AppError::InvalidTransition {
                from: self,
                to: requested,
            })
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase();
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| AppError::Validation(format!("unknown posting status '{s}'")))
    }
}

/// A named lifecycle operation, as triggered by one of the three actors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Seller submits a draft for review.
    Submit,
    /// Admin approves the content.
    Approve,
    /// Admin rejects the content.
    Reject { reason: String },
    /// Inspector passes the bike.
    PassInspection,
    /// Inspector fails the bike.
    FailInspection { reason: String },
    /// External sale event.
    MarkSold,
    /// Seller relists a sold bike.
    Relist,
    /// Time-based expiry.
    Expire,
}

impl Transition {
    pub fn target(&self) -> Status {
        match self {
            Transition::Submit => Status::Pending,
            Transition::Approve => Status::AdminApproved,
            Transition::Reject { .. } | Transition::FailInspection { .. } => Status::Rejected,
            Transition::PassInspection => Status::Available,
            Transition::MarkSold => Status::Sold,
            Transition::Relist => Status::Available,
            Transition::Expire => Status::Expired,
        }
    }

    /// Trimmed rejection reason, if this transition carries one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Transition::Reject { reason } | Transition::FailInspection { reason } => {
                Some(reason.trim())
            }
            _ => None,
        }
    }

    /// Validates the move from `current` and returns the resulting status.
    ///
    /// Stricter than [`Status::transition`]: each actor may only act on the
    /// status it owns, so an admin reject must start from `PENDING` and an
    /// inspector fail from `ADMIN_APPROVED`.
    pub fn apply(&self, current: Status) -> Result<Status> {
        let target = self.target();
        let invalid = AppError::InvalidTransition {
            from: current,
            to: target,
        };
        let source_ok = match self {
            Transition::Reject { .. } => current == Status::Pending,
            Transition::FailInspection { .. } => current == Status::AdminApproved,
            Transition::Relist => current == Status::Sold,
            Transition::PassInspection => current == Status::AdminApproved,
            _ => true,
        };
        if !source_ok {
            return Err(invalid);
        }
        if let Some(reason) = self.reason() {
            if reason.is_empty() {
                return Err(AppError::Validation(
                    "a rejection reason is required".to_string(),
                ));
            }
        }
        current.transition(target)
    }
}
