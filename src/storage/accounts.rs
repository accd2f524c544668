use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::StorageError;

const ACCOUNTS_FILE: &str = "accounts.bin";
const ACCOUNTS_TMP: &str = "accounts.bin.tmp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAccount {
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub win_count: u64,
    pub loss_count: u64,
}

impl PlayerAccount {
    pub fn win_rate(&self) -> f64 {
        let total = self.win_count + self.loss_count;
        if total == 0 {
            0.0
        } else {
            self.win_count as f64 / total as f64
        }
    }

    fn verify(&self, password: &str) -> bool {
        hash_password(&self.salt, password) == self.password_hash
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Registered,
    Authenticated,
}

/// Username -> account, persisted as one bincode file per node.
///
/// The file bytes double as the snapshot a new replica downloads once.
pub struct AccountStore {
    path: Option<PathBuf>,
    accounts: Mutex<BTreeMap<String, PlayerAccount>>,
}

impl AccountStore {
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(ACCOUNTS_FILE);

        let accounts = if path.exists() {
            let mut buffer = Vec::new();
            File::open(&path)?.read_to_end(&mut buffer)?;
            decode(&buffer)?
        } else {
            BTreeMap::new()
        };

        log::info!(
            "Account store opened at {:?} with {} accounts",
            path,
            accounts.len()
        );

        Ok(Self {
            path: Some(path),
            accounts: Mutex::new(accounts),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            accounts: Mutex::new(BTreeMap::new()),
        }
    }

    /// Logs in, creating the account on first use.
    pub async fn login_or_register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, StorageError> {
        let mut accounts = self.accounts.lock().await;

        if let Some(account) = accounts.get(username) {
            return if account.verify(password) {
                Ok(LoginOutcome::Authenticated)
            } else {
                Err(StorageError::InvalidCredentials)
            };
        }

        let salt = format!("{:016x}", rand::random::<u64>());
        accounts.insert(
            username.to_string(),
            PlayerAccount {
                username: username.to_string(),
                password_hash: hash_password(&salt, password),
                salt,
                win_count: 0,
                loss_count: 0,
            },
        );
        self.save(&accounts).await?;
        Ok(LoginOutcome::Registered)
    }

    pub async fn delete_account(&self, username: &str, password: &str) -> Result<(), StorageError> {
        let mut accounts = self.accounts.lock().await;
        match accounts.get(username) {
            None => return Err(StorageError::UnknownAccount(username.to_string())),
            Some(account) if !account.verify(password) => {
                return Err(StorageError::InvalidCredentials)
            }
            Some(_) => {}
        }
        accounts.remove(username);
        self.save(&accounts).await
    }

    /// One win for `winner`, one loss for each of `losers`. Unknown usernames
    /// are skipped.
    pub async fn record_result(&self, winner: &str, losers: &[String]) -> Result<(), StorageError> {
        let mut accounts = self.accounts.lock().await;
        if let Some(account) = accounts.get_mut(winner) {
            account.win_count += 1;
        }
        for loser in losers {
            if let Some(account) = accounts.get_mut(loser) {
                account.loss_count += 1;
            }
        }
        self.save(&accounts).await
    }

    pub async fn win_rate(&self, username: &str) -> f64 {
        self.accounts
            .lock()
            .await
            .get(username)
            .map_or(0.0, PlayerAccount::win_rate)
    }

    pub async fn account(&self, username: &str) -> Option<PlayerAccount> {
        self.accounts.lock().await.get(username).cloned()
    }

    pub async fn len(&self) -> usize {
        self.accounts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.lock().await.is_empty()
    }

    pub async fn snapshot(&self) -> Result<Vec<u8>, StorageError> {
        encode(&*self.accounts.lock().await)
    }

    /// Overwrites every account with the contents of a [`snapshot`].
    ///
    /// [`snapshot`]: AccountStore::snapshot
    pub async fn restore(&self, bytes: &[u8]) -> Result<usize, StorageError> {
        let restored = decode(bytes)?;
        let count = restored.len();
        let mut accounts = self.accounts.lock().await;
        *accounts = restored;
        self.save(&accounts).await?;
        Ok(count)
    }

    /// Writes a sibling temp file and renames it over the store, so a crash
    /// leaves either the old file or the new one.
    async fn save(&self, accounts: &BTreeMap<String, PlayerAccount>) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let encoded = encode(accounts)?;
        let tmp = path.with_file_name(ACCOUNTS_TMP);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&encoded).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn encode(accounts: &BTreeMap<String, PlayerAccount>) -> Result<Vec<u8>, StorageError> {
    bincode::serde::encode_to_vec(accounts, bincode::config::standard())
        .map_err(|e| StorageError::SerializationError(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<BTreeMap<String, PlayerAccount>, StorageError> {
    if bytes.is_empty() {
        return Ok(BTreeMap::new());
    }
    let (accounts, _): (BTreeMap<String, PlayerAccount>, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
    Ok(accounts)
}
