//! Explicit session passed to the desks and the HTTP backend instead of
//! ambient browser storage.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SellerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Member,
    Admin,
    Inspector,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: SellerId,
    pub email: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub token: Option<SecretString>,
    pub user: Option<UserProfile>,
    pub role: Role,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user: UserProfile, role: Role, token: Option<SecretString>) -> Self {
        Self {
            token,
            user: Some(user),
            role,
        }
    }

    pub fn bearer(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret()))
    }

    pub fn user(&self) -> Result<&UserProfile> {
        self.user
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))
    }

    pub fn seller_id(&self) -> Result<SellerId> {
        self.user().map(|user| user.id)
    }

    /// Fails unless a user is signed in with `role`.
    pub fn require_role(&self, role: Role) -> Result<&UserProfile> {
        let user = self.user()?;
        if self.role == role {
            Ok(user)
        } else {
            Err(AppError::Unauthorized(format!(
                "{:?} role required, signed in as {:?}",
                role, self.role
            )))
        }
    }
}
