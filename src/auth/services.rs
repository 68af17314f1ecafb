use std::sync::Arc;

use anyhow::Context;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{
    password::CredentialHasher,
    repo::AccountRepository,
    repo_types::{Account, LockState, NewAccount},
    validation::{normalize_email, require_credentials, validate_registration},
};
use crate::error::{AuthError, AuthResult};

/// Hashed once per service and verified against when the email is unknown,
/// so that path costs the same as a wrong password.
const DUMMY_PASSWORD: &str = "profilehub-dummy-password-0";

/// Result of a successful login, handed to the session issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAccount {
    pub id: Uuid,
    pub email: String,
}

/// Registration, login with lockout, and avatar reference updates.
///
/// Each call is a read-then-write against one account record. Concurrent
/// logins for the same account are not serialised here, so the failure
/// counter is only as accurate as the store's per-row updates.
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    hasher: Arc<dyn CredentialHasher>,
    dummy_digest: Arc<OnceCell<String>>,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountRepository>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self {
            accounts,
            hasher,
            dummy_digest: Arc::new(OnceCell::new()),
        }
    }

    pub async fn register(&self, email: &str, password: &str) -> AuthResult<Account> {
        let email = normalize_email(email);
        validate_registration(&email, password)?;

        if self.accounts.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AuthError::Conflict);
        }

        let password_hash = self.hash(password).await?;
        let account = self
            .accounts
            .create(NewAccount {
                email,
                password_hash,
            })
            .await?;

        info!(account_id = %account.id, email = %account.email, "account registered");
        Ok(account)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> AuthResult<AuthenticatedAccount> {
        let email = normalize_email(email);
        require_credentials(&email, password)?;

        let mut account = match self.accounts.find_by_email(&email).await? {
            Some(a) => a,
            None => {
                self.verify_dummy(password).await;
                warn!(email = %email, "login unknown email");
                return Err(AuthError::NotFound);
            }
        };

        // Locked accounts never reach the hash comparison.
        if account.locked {
            warn!(account_id = %account.id, "login attempt on locked account");
            return Err(AuthError::Locked);
        }

        if !self.verify(password, &account.password_hash).await? {
            let state = account.record_failure();
            self.accounts.save(&account).await?;
            match state {
                LockState::Locked => {
                    warn!(account_id = %account.id, "account locked after repeated failures")
                }
                LockState::Unlocked { failed_attempts } => {
                    warn!(account_id = %account.id, failed_attempts, "login invalid password")
                }
            }
            return Err(AuthError::InvalidCredential {
                attempts_remaining: account.attempts_remaining(),
            });
        }

        account.record_success();
        self.accounts.save(&account).await?;

        info!(account_id = %account.id, "account authenticated");
        Ok(AuthenticatedAccount {
            id: account.id,
            email: account.email,
        })
    }

    pub async fn profile(&self, account_id: Uuid) -> AuthResult<Account> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// Stores `reference` as the avatar and returns the one it replaced.
    pub async fn update_avatar(&self, account_id: Uuid, reference: String) -> AuthResult<Option<String>> {
        let mut account = self.profile(account_id).await?;
        let previous = account.avatar_key.replace(reference);
        self.accounts.save(&account).await?;
        debug!(account_id = %account_id, "avatar updated");
        Ok(previous.filter(|p| Some(p) != account.avatar_key.as_ref()))
    }

    /// Clears the avatar and returns the removed reference. Nothing is
    /// written when there is no avatar.
    pub async fn remove_avatar(&self, account_id: Uuid) -> AuthResult<Option<String>> {
        let mut account = self.profile(account_id).await?;
        let Some(previous) = account.avatar_key.take() else {
            return Ok(None);
        };
        self.accounts.save(&account).await?;
        debug!(account_id = %account_id, "avatar removed");
        Ok(Some(previous))
    }

    /// Runs one verify against a throwaway digest made by the same hasher.
    async fn verify_dummy(&self, password: &str) {
        let digest = match self
            .dummy_digest
            .get_or_try_init(|| self.hash(DUMMY_PASSWORD))
            .await
        {
            Ok(d) => d.clone(),
            Err(e) => {
                warn!(error = %e, "dummy digest unavailable");
                return;
            }
        };
        if let Err(e) = self.verify(password, &digest).await {
            warn!(error = %e, "dummy verify failed");
        }
    }

    async fn hash(&self, password: &str) -> AuthResult<String> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_owned();
        let digest = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .context("join hashing task")??;
        Ok(digest)
    }

    async fn verify(&self, password: &str, digest: &str) -> AuthResult<bool> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_owned();
        let digest = digest.to_owned();
        let ok = tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .context("join verify task")??;
        Ok(ok)
    }
}
