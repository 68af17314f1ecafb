//! In-memory stand-ins for the database, session store and object store.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{
    password::{Argon2Hasher, CredentialHasher},
    repo::AccountRepository,
    repo_types::{Account, NewAccount},
    session::{Session, SessionStore},
};
use crate::error::{AuthError, AuthResult};
use crate::storage::StorageClient;

pub fn fast_hasher() -> Arc<dyn CredentialHasher> {
    Arc::new(Argon2Hasher::insecure_fast())
}

/// Accounts keyed by email.
#[derive(Default)]
pub struct MemoryAccountRepository {
    accounts: Mutex<HashMap<String, Account>>,
    saves: AtomicUsize,
}

impl MemoryAccountRepository {
    pub fn get(&self, email: &str) -> Option<Account> {
        self.accounts.lock().unwrap().get(email).cloned()
    }

    pub fn len(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<Account>> {
        Ok(self.get(email))
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<Account>> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.values().find(|a| a.id == id).cloned())
    }

    async fn create(&self, new: NewAccount) -> AuthResult<Account> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&new.email) {
            return Err(AuthError::Conflict);
        }
        let account = Account::from_new(new);
        accounts.insert(account.email.clone(), account.clone());
        Ok(account)
    }

    async fn save(&self, account: &Account) -> AuthResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.accounts
            .lock()
            .unwrap()
            .insert(account.email.clone(), account.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: &Session) -> anyhow::Result<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Session>> {
        Ok(self.sessions.lock().unwrap().get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        self.sessions.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> anyhow::Result<u64> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

/// Objects keyed by storage key, with their content type.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    fail_deletes: bool,
}

impl MemoryStorage {
    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.lock().unwrap().get(key).map(|(_, ct)| ct.clone())
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        if self.fail_deletes {
            anyhow::bail!("delete refused");
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, _seconds: u64) -> anyhow::Result<String> {
        Ok(format!("https://fake.local/{}", key))
    }
}
