//! Review transition table.
//!
//! Pure rules only: which statuses a transition may start from, who may
//! trigger it and which audit columns it writes. The engine in
//! [`crate::engine::review`] applies them with conditional updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::entry_status::EntryStatus;
use crate::model::ReviewPatch;

/// Reviewer decision on a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
    Reset,
}

/// Reviewer decision applicable to many entries at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Approve,
    Reject,
}

impl From<BulkAction> for ReviewAction {
    fn from(action: BulkAction) -> Self {
        match action {
            BulkAction::Approve => Self::Approve,
            BulkAction::Reject => Self::Reject,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Owner hands the entry in for review.
    Submit,
    Approve,
    Reject,
    /// Reviewer sends a decided entry back to the queue.
    Reset,
    /// Owner hands a rejected entry back in.
    Resubmit,
}

impl From<ReviewAction> for Transition {
    fn from(action: ReviewAction) -> Self {
        match action {
            ReviewAction::Approve => Self::Approve,
            ReviewAction::Reject => Self::Reject,
            ReviewAction::Reset => Self::Reset,
        }
    }
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Reset => "reset",
            Self::Resubmit => "resubmit",
        }
    }

    /// Statuses the transition may start from.
    pub fn allowed_from(&self) -> &'static [EntryStatus] {
        use EntryStatus::*;
        match self {
            Self::Submit => &[Draft, Submitted, Rejected],
            Self::Approve | Self::Reject => &[Submitted],
            Self::Reset => &[Submitted, Approved, Rejected],
            Self::Resubmit => &[Rejected],
        }
    }

    pub fn target(&self) -> EntryStatus {
        match self {
            Self::Approve => EntryStatus::Approved,
            Self::Reject => EntryStatus::Rejected,
            Self::Submit | Self::Reset | Self::Resubmit => EntryStatus::Submitted,
        }
    }

    pub fn requires_reviewer(&self) -> bool {
        matches!(self, Self::Approve | Self::Reject | Self::Reset)
    }

    pub fn is_allowed_from(&self, status: EntryStatus) -> bool {
        self.allowed_from().contains(&status)
    }

    /// Columns written when the transition succeeds.
    ///
    /// Only approve and reject record a decision; every other transition
    /// clears the audit fields and the lock.
    pub fn patch(&self, actor: &Actor, notes: Option<String>, now: DateTime<Utc>) -> ReviewPatch {
        match self {
            Self::Approve | Self::Reject => ReviewPatch {
                status: self.target(),
                is_locked: matches!(self, Self::Approve),
                reviewer_id: Some(actor.id),
                review_notes: notes,
                reviewed_at: Some(now),
            },
            Self::Submit | Self::Reset | Self::Resubmit => ReviewPatch {
                status: self.target(),
                is_locked: false,
                reviewer_id: None,
                review_notes: None,
                reviewed_at: None,
            },
        }
    }
}
