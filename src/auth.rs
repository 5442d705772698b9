//! In-process account collaborator: sign-up, sign-in, sign-out and a
//! push-based auth-state channel.

use std::collections::HashMap;

use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, RwLock};

use crate::error::AuthError;
use crate::types::UserAccount;

/// Minimum password length accepted at sign-up.
const MIN_PASSWORD_LEN: usize = 6;

/// Consecutive failed sign-ins for one email before it is rate limited.
const MAX_FAILED_SIGNINS: u32 = 5;

struct StoredAccount {
    account: UserAccount,
    salt: String,
    password_hash: String,
}

/// Account registry with salted SHA-256 password hashes.
///
/// Subscribers receive `Some(account)` on sign-in and `None` on sign-out,
/// mirroring an auth-state listener.
pub struct AuthService {
    accounts: RwLock<HashMap<String, StoredAccount>>,
    failed_signins: RwLock<HashMap<String, u32>>,
    auth_tx: broadcast::Sender<Option<UserAccount>>,
}

impl AuthService {
    pub fn new() -> Self {
        let (auth_tx, _rx) = broadcast::channel(100);
        Self {
            accounts: RwLock::new(HashMap::new()),
            failed_signins: RwLock::new(HashMap::new()),
            auth_tx,
        }
    }

    /// Subscribe to auth-state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<Option<UserAccount>> {
        self.auth_tx.subscribe()
    }

    /// Create an account and sign it in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserAccount, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN));
        }

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(AuthError::EmailInUse);
        }

        let now = chrono::Utc::now().to_rfc3339();
        let salt = generate_salt();
        let account = UserAccount {
            uid: ulid::Ulid::new().to_string(),
            email: email.clone(),
            display_name: display_name.to_string(),
            created_at: now.clone(),
            last_login: now,
            games_played: 0,
            total_score: 0,
        };
        accounts.insert(
            email,
            StoredAccount {
                account: account.clone(),
                password_hash: hash_password(&salt, password),
                salt,
            },
        );
        drop(accounts);

        tracing::info!(uid = %account.uid, "account created");
        let _ = self.auth_tx.send(Some(account.clone()));
        Ok(account)
    }

    /// Sign in with email and password. Updates the last-login timestamp.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserAccount, AuthError> {
        let email = normalize_email(email)?;

        if self.is_rate_limited(&email).await {
            return Err(AuthError::RateLimited);
        }

        let mut accounts = self.accounts.write().await;
        let Some(stored) = accounts.get_mut(&email) else {
            drop(accounts);
            self.record_failure(&email).await;
            return Err(AuthError::InvalidCredentials);
        };

        if stored.password_hash != hash_password(&stored.salt, password) {
            drop(accounts);
            self.record_failure(&email).await;
            return Err(AuthError::InvalidCredentials);
        }

        stored.account.last_login = chrono::Utc::now().to_rfc3339();
        let account = stored.account.clone();
        drop(accounts);

        self.failed_signins.write().await.remove(&email);
        let _ = self.auth_tx.send(Some(account.clone()));
        Ok(account)
    }

    /// Sign out. Only notifies subscribers; there is no server-side session.
    pub async fn sign_out(&self) {
        let _ = self.auth_tx.send(None);
    }

    async fn is_rate_limited(&self, email: &str) -> bool {
        self.failed_signins
            .read()
            .await
            .get(email)
            .is_some_and(|n| *n >= MAX_FAILED_SIGNINS)
    }

    async fn record_failure(&self, email: &str) {
        let mut failures = self.failed_signins.write().await;
        let count = failures.entry(email.to_string()).or_insert(0);
        *count += 1;
        if *count == MAX_FAILED_SIGNINS {
            tracing::warn!(email, "sign-in rate limit reached");
        }
    }
}

impl Default for AuthService {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AuthError::InvalidEmail),
    }
}

fn generate_salt() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
