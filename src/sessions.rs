//! Chat sessions and message history, stored as two JSON files.
//!
//! A session ties a user to one prescription. Messages reference sessions
//! by id and are kept in a separate file so history can grow without
//! rewriting session metadata.

use crate::error::{Result, StoreError};
use crate::persistence::json_file;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::info;
use uuid::Uuid;

/// Prescription id used for conversations not tied to a document.
pub const GLOBAL_PRESCRIPTION: &str = "GLOBAL";
/// Messages returned by [`SessionStore::history`] when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub prescription_id: String,
    #[serde(default)]
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otc_result: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Optional descriptive fields supplied when opening a session.
#[derive(Debug, Clone, Default)]
pub struct SessionFields {
    pub title: Option<String>,
    pub filename: Option<String>,
    pub details: Option<String>,
}

/// A prescription the user has talked about, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrescriptionSummary {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionsFile {
    #[serde(default)]
    sessions: Vec<Session>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MessagesFile {
    #[serde(default)]
    messages: Vec<Message>,
}

pub struct SessionStore {
    sessions_path: PathBuf,
    messages_path: PathBuf,
    write_lock: Mutex<()>,
}

/// Empty strings count as missing.
fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// Fill `slot` from `value` if the slot is missing and the value present.
fn fill_missing(slot: &mut Option<String>, value: &Option<String>) -> bool {
    if present(value) && !present(slot) {
        *slot = value.clone();
        true
    } else {
        false
    }
}

impl SessionStore {
    /// Open `sessions.json` and `messages.json` under `data_dir`, creating
    /// empty files if they do not exist.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)?;

        let store = Self {
            sessions_path: dir.join("sessions.json"),
            messages_path: dir.join("messages.json"),
            write_lock: Mutex::new(()),
        };
        if !store.sessions_path.exists() {
            json_file::save_pretty(&store.sessions_path, &SessionsFile::default())?;
        }
        if !store.messages_path.exists() {
            json_file::save_pretty(&store.messages_path, &MessagesFile::default())?;
        }

        info!(dir = %dir.display(), "session store opened");
        Ok(store)
    }

    fn load_sessions(&self) -> SessionsFile {
        json_file::load_or_default(&self.sessions_path)
    }

    fn load_messages(&self) -> MessagesFile {
        json_file::load_or_default(&self.messages_path)
    }

    fn find(&self, session_id: &str) -> Option<Session> {
        self.load_sessions()
            .sessions
            .into_iter()
            .find(|s| s.session_id == session_id)
    }

    /// Apply `f` to one session and save. Errors if the session is unknown.
    fn modify_session(&self, session_id: &str, f: impl FnOnce(&mut Session)) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut data = self.load_sessions();
        let session = data
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session_id)
            .ok_or_else(|| StoreError::SessionNotFound {
                id: session_id.to_string(),
            })?;
        f(session);
        json_file::save_pretty(&self.sessions_path, &data)
    }

    /// Session id for the (user, prescription) pair, creating it if needed.
    ///
    /// For an existing session, only fields that are still missing are
    /// filled in from `fields`.
    pub fn get_or_create_session(
        &self,
        user_id: &str,
        prescription_id: &str,
        fields: SessionFields,
    ) -> Result<String> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut data = self.load_sessions();

        if let Some(existing) = data
            .sessions
            .iter_mut()
            .find(|s| s.user_id == user_id && s.prescription_id == prescription_id)
        {
            let mut updated = fill_missing(&mut existing.title, &fields.title);
            updated |= fill_missing(&mut existing.filename, &fields.filename);
            updated |= fill_missing(&mut existing.details, &fields.details);

            let session_id = existing.session_id.clone();
            if updated {
                json_file::save_pretty(&self.sessions_path, &data)?;
            }
            return Ok(session_id);
        }

        let now = Utc::now();
        let keep = |v: Option<String>| v.filter(|s| !s.is_empty());
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            prescription_id: prescription_id.to_string(),
            summary: String::new(),
            created_at: now,
            last_active: now,
            title: keep(fields.title),
            filename: keep(fields.filename),
            details: keep(fields.details),
            otc_result: None,
        };
        let session_id = session.session_id.clone();
        data.sessions.push(session);
        json_file::save_pretty(&self.sessions_path, &data)?;

        info!(
            session_id = %session_id,
            user_id,
            prescription_id,
            "created new session"
        );
        Ok(session_id)
    }

    /// Medicine details recorded for a session, or "".
    pub fn session_details(&self, session_id: &str) -> String {
        self.find(session_id)
            .and_then(|s| s.details)
            .unwrap_or_default()
    }

    /// Prescription of an earlier upload with the same filename, if any.
    pub fn prescription_by_filename(&self, user_id: &str, filename: &str) -> Option<String> {
        self.load_sessions()
            .sessions
            .into_iter()
            .find(|s| s.user_id == user_id && s.filename.as_deref() == Some(filename))
            .map(|s| s.prescription_id)
    }

    /// Append a message to a session's history and mark it active.
    pub fn add_message(&self, session_id: &str, role: &str, content: &str) -> Result<()> {
        if self.find(session_id).is_none() {
            return Err(StoreError::SessionNotFound {
                id: session_id.to_string(),
            });
        }

        {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut data = self.load_messages();
            data.messages.push(Message {
                session_id: session_id.to_string(),
                role: role.to_string(),
                content: content.to_string(),
                timestamp: Utc::now(),
            });
            json_file::save_pretty(&self.messages_path, &data)?;
        }

        self.update_last_active(session_id)
    }

    /// The most recent `limit` messages of a session, oldest first.
    pub fn history(&self, session_id: &str, limit: usize) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .load_messages()
            .messages
            .into_iter()
            .filter(|m| m.session_id == session_id)
            .collect();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let skip = messages.len().saturating_sub(limit);
        messages.split_off(skip)
    }

    /// Running conversation summary, or "".
    pub fn summary(&self, session_id: &str) -> String {
        self.find(session_id).map(|s| s.summary).unwrap_or_default()
    }

    pub fn update_summary(&self, session_id: &str, summary: &str) -> Result<()> {
        self.modify_session(session_id, |s| {
            s.summary = summary.to_string();
            s.last_active = Utc::now();
        })
    }

    pub fn update_last_active(&self, session_id: &str) -> Result<()> {
        self.modify_session(session_id, |s| s.last_active = Utc::now())
    }

    /// Prescriptions the user has sessions for, most recently active first.
    ///
    /// The [`GLOBAL_PRESCRIPTION`] pseudo-prescription is left out.
    pub fn user_prescriptions(&self, user_id: &str) -> Vec<PrescriptionSummary> {
        let mut sessions: Vec<Session> = self
            .load_sessions()
            .sessions
            .into_iter()
            .filter(|s| s.user_id == user_id && s.prescription_id != GLOBAL_PRESCRIPTION)
            .collect();
        sessions.sort_by(|a, b| b.last_active.cmp(&a.last_active));

        let mut seen = std::collections::HashSet::new();
        sessions
            .into_iter()
            .filter(|s| seen.insert(s.prescription_id.clone()))
            .map(|s| {
                let title = s.title.filter(|t| !t.is_empty()).unwrap_or_else(|| {
                    let short: String = s.prescription_id.chars().take(8).collect();
                    format!("Prescription {}...", short)
                });
                PrescriptionSummary {
                    id: s.prescription_id,
                    title,
                }
            })
            .collect()
    }

    /// Every session, most recently active first.
    pub fn all_sessions(&self) -> Vec<Session> {
        let mut sessions = self.load_sessions().sessions;
        sessions.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        sessions
    }

    /// Store the over-the-counter analysis for a session.
    pub fn save_otc_result(&self, session_id: &str, result: Value) -> Result<()> {
        self.modify_session(session_id, |s| s.otc_result = Some(result))
    }

    pub fn otc_result(&self, session_id: &str) -> Option<Value> {
        self.find(session_id).and_then(|s| s.otc_result)
    }
}
