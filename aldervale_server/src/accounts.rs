// Account and character persistence for the world server.
//
// Accounts are keyed by unique username. Passwords are never stored: each
// account keeps a random 16-byte salt and the SHA-256 digest of salt + password
// (both hex-encoded). Characters are five small integer appearance slots
// attached to an account once the player has created one; re-creating a
// character replaces the stored one.
//
// Two stores implement the same `AccountStore` trait:
// - `FileAccountStore`: a single JSON file mapping username to record, loaded
//   at startup and rewritten after every mutation. Account volume is one
//   record per registered player, so whole-file rewrites stay cheap.
// - `MemoryAccountStore`: ephemeral map, used when the server runs without a
//   store path and by tests.
//
// The `Display` strings of the auth error variants are sent to clients
// verbatim in LOGIN_FAIL / REGISTER_FAIL replies — change them and every
// existing client's failure messages change too.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};

use aldervale_prng::WorldRng;
use aldervale_protocol::types::Appearance;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Errors from account store operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Unknown username or wrong password. Deliberately does not say which.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Registration with an empty username or password.
    #[error("Missing info")]
    MissingInfo,
    /// Registration against a username that already exists.
    #[error("Username taken")]
    UsernameTaken,
    /// Character operation against a username with no account.
    #[error("no account named {0}")]
    UnknownAccount(String),
    #[error("account store I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("account store JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Credential and character storage, accessed only by the server's main loop.
pub trait AccountStore: Send {
    /// Verify a username/password pair against stored credentials.
    fn authenticate(&self, username: &str, password: &str) -> Result<(), AccountError>;

    /// Create a new account with a fresh salt. Fails on empty fields or a
    /// taken username.
    fn register(&mut self, username: &str, password: &str) -> Result<(), AccountError>;

    /// Look up the saved character for an account, if one has been created.
    fn get_character(&self, username: &str) -> Result<Option<Appearance>, AccountError>;

    /// Create or replace the character for an account.
    fn save_character(
        &mut self,
        username: &str,
        appearance: Appearance,
    ) -> Result<(), AccountError>;
}

/// One stored account. Serialized as the map value in the accounts file.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct AccountRecord {
    /// 16 random bytes, hex-encoded.
    salt: String,
    /// Hex SHA-256 of salt hex + password.
    digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    character: Option<Appearance>,
}

fn digest_password(salt_hex: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn fresh_salt() -> String {
    let mut rng = WorldRng::new(WorldRng::entropy_seed());
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    let mut hex = String::with_capacity(32);
    for byte in bytes {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

fn check_credentials(
    accounts: &BTreeMap<String, AccountRecord>,
    username: &str,
    password: &str,
) -> Result<(), AccountError> {
    let record = accounts
        .get(username)
        .ok_or(AccountError::InvalidCredentials)?;
    if digest_password(&record.salt, password) != record.digest {
        return Err(AccountError::InvalidCredentials);
    }
    Ok(())
}

fn insert_account(
    accounts: &mut BTreeMap<String, AccountRecord>,
    username: &str,
    password: &str,
) -> Result<(), AccountError> {
    if username.is_empty() || password.is_empty() {
        return Err(AccountError::MissingInfo);
    }
    if accounts.contains_key(username) {
        return Err(AccountError::UsernameTaken);
    }
    let salt = fresh_salt();
    let digest = digest_password(&salt, password);
    accounts.insert(
        username.to_string(),
        AccountRecord {
            salt,
            digest,
            character: None,
        },
    );
    Ok(())
}

fn lookup_character(
    accounts: &BTreeMap<String, AccountRecord>,
    username: &str,
) -> Result<Option<Appearance>, AccountError> {
    let record = accounts
        .get(username)
        .ok_or_else(|| AccountError::UnknownAccount(username.to_string()))?;
    Ok(record.character)
}

fn store_character(
    accounts: &mut BTreeMap<String, AccountRecord>,
    username: &str,
    appearance: Appearance,
) -> Result<(), AccountError> {
    let record = accounts
        .get_mut(username)
        .ok_or_else(|| AccountError::UnknownAccount(username.to_string()))?;
    record.character = Some(appearance);
    Ok(())
}

/// In-memory account store. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: BTreeMap<String, AccountRecord>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for MemoryAccountStore {
    fn authenticate(&self, username: &str, password: &str) -> Result<(), AccountError> {
        check_credentials(&self.accounts, username, password)
    }

    fn register(&mut self, username: &str, password: &str) -> Result<(), AccountError> {
        insert_account(&mut self.accounts, username, password)
    }

    fn get_character(&self, username: &str) -> Result<Option<Appearance>, AccountError> {
        lookup_character(&self.accounts, username)
    }

    fn save_character(
        &mut self,
        username: &str,
        appearance: Appearance,
    ) -> Result<(), AccountError> {
        store_character(&mut self.accounts, username, appearance)
    }
}

/// JSON-file-backed account store. The whole file is loaded on open and
/// rewritten after every successful mutation. A mutation whose rewrite fails
/// is rolled back, so the in-memory map never runs ahead of the file.
#[derive(Debug)]
pub struct FileAccountStore {
    path: PathBuf,
    accounts: BTreeMap<String, AccountRecord>,
}

impl FileAccountStore {
    /// Open the store at `path`, loading existing accounts if the file exists.
    /// A missing file is an empty store; the file is created on first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AccountError> {
        let path = path.as_ref().to_path_buf();
        let accounts = if path.exists() {
            serde_json::from_reader(File::open(&path)?)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, accounts })
    }

    /// Number of registered accounts.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    fn persist(&self) -> Result<(), AccountError> {
        serde_json::to_writer_pretty(File::create(&self.path)?, &self.accounts)?;
        Ok(())
    }
}

impl AccountStore for FileAccountStore {
    fn authenticate(&self, username: &str, password: &str) -> Result<(), AccountError> {
        check_credentials(&self.accounts, username, password)
    }

    fn register(&mut self, username: &str, password: &str) -> Result<(), AccountError> {
        insert_account(&mut self.accounts, username, password)?;
        if let Err(e) = self.persist() {
            // Drop the unpersisted record so a retry is not "Username taken".
            self.accounts.remove(username);
            return Err(e);
        }
        Ok(())
    }

    fn get_character(&self, username: &str) -> Result<Option<Appearance>, AccountError> {
        lookup_character(&self.accounts, username)
    }

    fn save_character(
        &mut self,
        username: &str,
        appearance: Appearance,
    ) -> Result<(), AccountError> {
        let prior = lookup_character(&self.accounts, username)?;
        store_character(&mut self.accounts, username, appearance)?;
        if let Err(e) = self.persist() {
            if let Some(record) = self.accounts.get_mut(username) {
                record.character = prior;
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appearance() -> Appearance {
        Appearance {
            body: 1,
            hair: 2,
            shirt: 3,
            pants: 0,
            eyes: 4,
        }
    }

    #[test]
    fn register_then_authenticate() {
        let mut store = MemoryAccountStore::new();
        store.register("mira", "hunter2").unwrap();
        store.authenticate("mira", "hunter2").unwrap();
    }

    #[test]
    fn authenticate_unknown_username_fails() {
        let store = MemoryAccountStore::new();
        let err = store.authenticate("ghost", "whatever").unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[test]
    fn authenticate_wrong_password_fails() {
        let mut store = MemoryAccountStore::new();
        store.register("mira", "hunter2").unwrap();
        let err = store.authenticate("mira", "hunter3").unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
    }

    #[test]
    fn register_duplicate_username_fails() {
        let mut store = MemoryAccountStore::new();
        store.register("mira", "hunter2").unwrap();
        let err = store.register("mira", "other").unwrap_err();
        assert!(matches!(err, AccountError::UsernameTaken));
        assert_eq!(err.to_string(), "Username taken");
        // Original credentials still work.
        store.authenticate("mira", "hunter2").unwrap();
    }

    #[test]
    fn register_empty_fields_fail() {
        let mut store = MemoryAccountStore::new();
        let err = store.register("", "hunter2").unwrap_err();
        assert!(matches!(err, AccountError::MissingInfo));
        assert_eq!(err.to_string(), "Missing info");
        let err = store.register("mira", "").unwrap_err();
        assert!(matches!(err, AccountError::MissingInfo));
    }

    #[test]
    fn same_password_gets_distinct_digests() {
        let mut store = MemoryAccountStore::new();
        store.register("mira", "hunter2").unwrap();
        store.register("rook", "hunter2").unwrap();
        let mira = &store.accounts["mira"];
        let rook = &store.accounts["rook"];
        assert_ne!(mira.salt, rook.salt);
        assert_ne!(mira.digest, rook.digest);
    }

    #[test]
    fn password_is_not_stored_in_clear() {
        let mut store = MemoryAccountStore::new();
        store.register("mira", "hunter2").unwrap();
        let record = &store.accounts["mira"];
        assert!(!record.digest.contains("hunter2"));
        assert_eq!(record.digest.len(), 64); // hex sha-256
    }

    #[test]
    fn character_lifecycle() {
        let mut store = MemoryAccountStore::new();
        store.register("mira", "hunter2").unwrap();
        assert_eq!(store.get_character("mira").unwrap(), None);

        store.save_character("mira", appearance()).unwrap();
        assert_eq!(store.get_character("mira").unwrap(), Some(appearance()));

        // Saving again replaces the stored character.
        let other = Appearance {
            body: 9,
            ..appearance()
        };
        store.save_character("mira", other).unwrap();
        assert_eq!(store.get_character("mira").unwrap(), Some(other));
    }

    #[test]
    fn character_ops_require_an_account() {
        let mut store = MemoryAccountStore::new();
        let err = store.get_character("ghost").unwrap_err();
        assert!(matches!(err, AccountError::UnknownAccount(_)));
        let err = store.save_character("ghost", appearance()).unwrap_err();
        assert!(matches!(err, AccountError::UnknownAccount(_)));
    }

    #[test]
    fn file_store_starts_empty_without_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileAccountStore::open(tmp.path().join("accounts.json")).unwrap();
        assert_eq!(store.account_count(), 0);
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("accounts.json");

        {
            let mut store = FileAccountStore::open(&path).unwrap();
            store.register("mira", "hunter2").unwrap();
            store.save_character("mira", appearance()).unwrap();
        }

        let store = FileAccountStore::open(&path).unwrap();
        assert_eq!(store.account_count(), 1);
        store.authenticate("mira", "hunter2").unwrap();
        assert_eq!(store.get_character("mira").unwrap(), Some(appearance()));
    }

    #[test]
    fn file_store_failed_registration_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("accounts.json");
        let mut store = FileAccountStore::open(&path).unwrap();
        let _ = store.register("", "nope").unwrap_err();
        assert!(!path.exists());
    }

    #[test]
    fn file_store_register_rolls_back_on_persist_failure() {
        let tmp = tempfile::tempdir().unwrap();
        // A path whose parent does not exist makes every rewrite fail.
        let path = tmp.path().join("missing").join("accounts.json");
        let mut store = FileAccountStore::open(&path).unwrap();

        let err = store.register("mira", "hunter2").unwrap_err();
        assert!(matches!(err, AccountError::Io(_)));

        // The record was dropped again: a retry is not "Username taken".
        let err = store.register("mira", "hunter2").unwrap_err();
        assert!(matches!(err, AccountError::Io(_)));
        assert_eq!(store.account_count(), 0);
    }

    #[test]
    fn file_store_save_character_rolls_back_on_persist_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("accounts.json");
        let mut store = FileAccountStore::open(&path).unwrap();
        store.register("mira", "hunter2").unwrap();
        store.save_character("mira", appearance()).unwrap();

        // Replace the file with a directory so the next rewrite fails.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let other = Appearance {
            body: 9,
            ..appearance()
        };
        let err = store.save_character("mira", other).unwrap_err();
        assert!(matches!(err, AccountError::Io(_)));
        assert_eq!(store.get_character("mira").unwrap(), Some(appearance()));
    }

    #[test]
    fn file_store_rejects_corrupt_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("accounts.json");
        std::fs::write(&path, b"not json at all").unwrap();
        let err = FileAccountStore::open(&path).unwrap_err();
        assert!(matches!(err, AccountError::Json(_)));
    }

    #[test]
    fn account_without_character_omits_field_in_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("accounts.json");
        let mut store = FileAccountStore::open(&path).unwrap();
        store.register("mira", "hunter2").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("character"));
    }
}
