//! User accounts with bcrypt-hashed passwords, stored in `users.json`.

use crate::error::{Result, StoreError};
use crate::persistence::json_file;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<Account>,
}

pub struct AccountStore {
    users_path: PathBuf,
    cost: u32,
    write_lock: Mutex<()>,
}

impl AccountStore {
    /// Open `users.json` under `data_dir`, creating an empty file if needed.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)?;

        let store = Self {
            users_path: dir.join("users.json"),
            cost: bcrypt::DEFAULT_COST,
            write_lock: Mutex::new(()),
        };
        if !store.users_path.exists() {
            json_file::save_pretty(&store.users_path, &UsersFile::default())?;
        }

        info!(dir = %dir.display(), "account store opened");
        Ok(store)
    }

    /// Override the bcrypt work factor used for new hashes.
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    fn load(&self) -> UsersFile {
        json_file::load_or_default(&self.users_path)
    }

    /// Create an account. Returns `Ok(false)` if the username is taken.
    pub fn register(&self, username: &str, password: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut data = self.load();
        if data.users.iter().any(|u| u.username == username) {
            return Ok(false);
        }

        let password_hash = bcrypt::hash(password, self.cost)
            .map_err(|e| StoreError::PasswordHash(e.to_string()))?;
        data.users.push(Account {
            username: username.to_string(),
            password_hash,
            created_at: Utc::now(),
        });
        json_file::save_pretty(&self.users_path, &data)?;

        info!(username, "registered user");
        Ok(true)
    }

    /// True if `username` exists and `password` matches its stored hash.
    pub fn login(&self, username: &str, password: &str) -> Result<bool> {
        let data = self.load();
        let Some(account) = data.users.iter().find(|u| u.username == username) else {
            return Ok(false);
        };

        let ok = bcrypt::verify(password, &account.password_hash)
            .map_err(|e| StoreError::PasswordHash(e.to_string()))?;
        if ok {
            info!(username, "user logged in");
        }
        Ok(ok)
    }

    /// Registered usernames, in registration order.
    pub fn usernames(&self) -> Vec<String> {
        self.load().users.into_iter().map(|u| u.username).collect()
    }
}
