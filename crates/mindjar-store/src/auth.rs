//! Credential service: bridges raw passwords to durable hashes.
//!
//! Passwords are hashed with PBKDF2-HMAC-SHA256 (ring) using 600,000
//! iterations per OWASP 2023 recommendations and a 32-byte random salt.
//! The stored string embeds everything needed for verification:
//!
//! ```text
//! pbkdf2-sha256$<iterations>$<base64 salt>$<base64 digest>
//! ```
//!
//! Verification honors the iteration count embedded in the string, so
//! the cost factor can be raised without invalidating existing hashes.
//! Raw passwords are never logged (tracing spans skip them) and never
//! persisted outside the hash.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, instrument};

use crate::account_store::{Account, AccountStore, NewAccount};
use crate::error::{StoreError, StoreResult};

// ═══════════════════════════════════════════════════════════════════════
//  Password hashing
// ═══════════════════════════════════════════════════════════════════════

/// Scheme tag embedded in stored hashes.
const SCHEME: &str = "pbkdf2-sha256";

/// PBKDF2-HMAC-SHA256 with 600,000 iterations (OWASP 2023).
const PBKDF2_ITERATIONS: u32 = 600_000;

/// Salt length in bytes.
const SALT_LEN: usize = 32;

/// Derived key length in bytes.
const KEY_LEN: usize = 32;

/// PBKDF2 algorithm.
static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// Hash a password into a self-describing storable string.
fn hash_password(password: &str) -> StoreResult<String> {
    let rng = SystemRandom::new();

    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| StoreError::InvalidInput("failed to generate random salt".into()))?;

    let mut digest = [0u8; KEY_LEN];
    let iterations =
        std::num::NonZeroU32::new(PBKDF2_ITERATIONS).expect("PBKDF2_ITERATIONS is non-zero");
    pbkdf2::derive(
        PBKDF2_ALG,
        iterations,
        &salt,
        password.as_bytes(),
        &mut digest,
    );

    Ok(format!(
        "{SCHEME}${PBKDF2_ITERATIONS}${}${}",
        BASE64.encode(salt),
        BASE64.encode(digest)
    ))
}

/// Verify a password against a stored hash string.
///
/// Delegates the comparison to `ring::pbkdf2::verify`, which is
/// constant-time. The iteration count comes from the stored string, not
/// from the compile-time constant.
fn verify_hash(password: &str, stored: &str) -> StoreResult<bool> {
    let parts: Vec<&str> = stored.split('$').collect();
    let [scheme, iters, salt, digest] = parts.as_slice() else {
        return Err(StoreError::InvalidInput("malformed password hash".into()));
    };

    if *scheme != SCHEME {
        return Err(StoreError::InvalidInput(format!(
            "unknown password hash scheme: {scheme}"
        )));
    }

    let iterations: u32 = iters
        .parse()
        .map_err(|_| StoreError::InvalidInput("invalid iteration count in hash".into()))?;
    let iterations = std::num::NonZeroU32::new(iterations)
        .ok_or_else(|| StoreError::InvalidInput("iteration count must be non-zero".into()))?;

    let salt = BASE64
        .decode(salt)
        .map_err(|e| StoreError::InvalidInput(format!("invalid salt encoding: {e}")))?;
    let expected = BASE64
        .decode(digest)
        .map_err(|e| StoreError::InvalidInput(format!("invalid digest encoding: {e}")))?;

    Ok(pbkdf2::verify(PBKDF2_ALG, iterations, &salt, password.as_bytes(), &expected).is_ok())
}

/// Canonicalize an email for storage and lookup: trim and lowercase.
///
/// The `users.email` column is additionally `COLLATE NOCASE`, so the
/// constraint holds even for values that bypass this normalization.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ═══════════════════════════════════════════════════════════════════════
//  CredentialService
// ═══════════════════════════════════════════════════════════════════════

/// Account creation and password verification over an [`AccountStore`].
#[derive(Clone)]
pub struct CredentialService {
    accounts: AccountStore,
}

impl CredentialService {
    /// Create a credential service over `accounts`.
    pub fn new(accounts: AccountStore) -> Self {
        Self { accounts }
    }

    /// Create a new account and return its store-assigned id.
    ///
    /// The existence probe here is an optimization; the probe and the
    /// insert are two separately queued operations, so a concurrent
    /// sign-up with the same email can slip between them. The storage
    /// uniqueness constraint is the final guard, and its violation is
    /// translated into [`StoreError::DuplicateEmail`] either way.
    #[instrument(skip(self, raw_password))]
    pub async fn create_account(
        &self,
        full_name: &str,
        email: &str,
        raw_password: &str,
    ) -> StoreResult<i64> {
        if full_name.trim().is_empty() {
            return Err(StoreError::InvalidInput("full name must not be empty".into()));
        }
        if email.trim().is_empty() {
            return Err(StoreError::InvalidInput("email must not be empty".into()));
        }
        if raw_password.is_empty() {
            return Err(StoreError::InvalidInput("password must not be empty".into()));
        }

        let email = normalize_email(email);

        if self.accounts.count_by_email(&email).await? > 0 {
            return Err(StoreError::DuplicateEmail { email });
        }

        // The hash is deliberately slow; keep it off the async runtime.
        let raw_password = raw_password.to_string();
        let password_hash =
            tokio::task::spawn_blocking(move || hash_password(&raw_password)).await??;

        let account = NewAccount {
            full_name: full_name.trim().to_string(),
            email: email.clone(),
            password_hash,
        };

        match self.accounts.insert(account).await {
            Ok(id) => {
                debug!(account_id = id, "account created");
                Ok(id)
            }
            Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                // Lost the probe/insert race: another sign-up landed first.
                Err(StoreError::DuplicateEmail { email })
            }
            Err(e) => Err(e),
        }
    }

    /// Verify a raw password against a stored hash.
    ///
    /// Returns `Ok(false)` for a wrong password; errors only for a
    /// malformed stored hash or a worker failure.
    #[instrument(skip(self, raw_password, stored_hash))]
    pub async fn verify_password(
        &self,
        raw_password: &str,
        stored_hash: &str,
    ) -> StoreResult<bool> {
        let raw_password = raw_password.to_string();
        let stored_hash = stored_hash.to_string();
        tokio::task::spawn_blocking(move || verify_hash(&raw_password, &stored_hash)).await?
    }

    /// Look up an account by email, normalized the same way as creation.
    ///
    /// The login flow reads the stored hash through this.
    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.accounts.find_by_email(&normalize_email(email)).await
    }
}

// ── tests ────────────────────────────────────────────────────────────
