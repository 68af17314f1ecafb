use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Consecutive failed logins after which an account is locked for good.
pub const MAX_FAILED_ATTEMPTS: i32 = 5;

/// Account record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String, // normalised, lower-case
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, not exposed in JSON
    pub failed_attempts: i32,
    pub locked: bool,
    pub avatar_key: Option<String>, // object storage key
    pub created_at: OffsetDateTime,
}

/// Fields supplied at registration; everything else starts at its default.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
}

/// Lockout dimension of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked { failed_attempts: i32 },
    Locked,
}

impl Account {
    pub fn from_new(new: NewAccount) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            failed_attempts: 0,
            locked: false,
            avatar_key: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn lock_state(&self) -> LockState {
        if self.locked {
            LockState::Locked
        } else {
            LockState::Unlocked {
                failed_attempts: self.failed_attempts,
            }
        }
    }

    /// Counts a failed login. Locks the account once the threshold is hit.
    /// A locked account is left as is.
    pub fn record_failure(&mut self) -> LockState {
        if self.locked {
            return LockState::Locked;
        }
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        if self.failed_attempts >= MAX_FAILED_ATTEMPTS {
            self.locked = true;
        }
        self.lock_state()
    }

    pub fn record_success(&mut self) {
        self.failed_attempts = 0;
    }

    pub fn attempts_remaining(&self) -> u32 {
        if self.locked {
            return 0;
        }
        (MAX_FAILED_ATTEMPTS - self.failed_attempts).max(0) as u32
    }
}
