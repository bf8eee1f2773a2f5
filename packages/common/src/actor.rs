use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoreError;

/// The authenticated caller of a core operation.
///
/// Built by the session layer. Engines re-check [`Actor::ensure_active`]
/// before every write, so an actor that expires mid-pipeline stops the
/// remaining steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub is_reviewer: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Actor {
    pub fn owner(id: Uuid) -> Self {
        Self {
            id,
            is_reviewer: false,
            expires_at: None,
        }
    }

    pub fn reviewer(id: Uuid) -> Self {
        Self {
            id,
            is_reviewer: true,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn ensure_active(&self) -> Result<(), CoreError> {
        match self.expires_at {
            Some(at) if at <= Utc::now() => Err(CoreError::Auth("session has expired".into())),
            _ => Ok(()),
        }
    }

    pub fn require_reviewer(&self) -> Result<(), CoreError> {
        self.ensure_active()?;
        if self.is_reviewer {
            Ok(())
        } else {
            Err(CoreError::forbidden("reviewer capability required"))
        }
    }

    /// Owners see their own rows; reviewers see everything.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.is_reviewer || self.id == owner_id
    }
}
