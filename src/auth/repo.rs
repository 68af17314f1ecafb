use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{Account, NewAccount};
use crate::error::{AuthError, AuthResult};

/// Persistence for account records.
///
/// Email uniqueness is the store's job: `create` fails with
/// [`AuthError::Conflict`] on a duplicate.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<Account>>;
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<Account>>;
    async fn create(&self, new: NewAccount) -> AuthResult<Account>;
    /// Writes back every mutable field of the account.
    async fn save(&self, account: &Account) -> AuthResult<()>;
}

#[derive(Clone)]
pub struct PgAccountRepository {
    db: PgPool,
}

impl PgAccountRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, password_hash, failed_attempts, locked, avatar_key, created_at
            FROM accounts
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find account by email")?;
        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, password_hash, failed_attempts, locked, avatar_key, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find account by id")?;
        Ok(account)
    }

    async fn create(&self, new: NewAccount) -> AuthResult<Account> {
        let account = Account::from_new(new);
        let result = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, email, password_hash, failed_attempts, locked, avatar_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, email, password_hash, failed_attempts, locked, avatar_key, created_at
            "#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.failed_attempts)
        .bind(account.locked)
        .bind(account.avatar_key.as_deref())
        .bind(account.created_at)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(account) => Ok(account),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AuthError::Conflict),
            Err(e) => Err(anyhow::Error::new(e).context("insert account").into()),
        }
    }

    async fn save(&self, account: &Account) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE accounts
               SET failed_attempts = $2,
                   locked = $3,
                   avatar_key = $4
             WHERE id = $1
            "#,
        )
        .bind(account.id)
        .bind(account.failed_attempts)
        .bind(account.locked)
        .bind(account.avatar_key.as_deref())
        .execute(&self.db)
        .await
        .context("update account")?;
        Ok(())
    }
}
