// SPDX-License-Identifier: MIT

//! Session and message bookkeeping

use rusqlite::params;
use std::sync::Arc;

use super::{new_id, now, Db};
use crate::claimflow::error::ClaimflowError;

pub struct SessionStore {
    db: Arc<Db>,
}

impl SessionStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Create a session, generating ids where the caller provided none.
    pub fn create_session(
        &self,
        user_id: Option<&str>,
        title: Option<&str>,
    ) -> Result<(String, String), ClaimflowError> {
        let user_id = user_id
            .map(|u| u.to_string())
            .unwrap_or_else(|| format!("u{}", &new_id()[..6]));
        let session_id = format!("s_{}", &new_id()[..8]);

        let conn = self.db.conn();
        conn.execute(
            "INSERT OR REPLACE INTO users (user_id) VALUES (?1)",
            params![user_id],
        )?;
        conn.execute(
            "INSERT INTO sessions (session_id, user_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, user_id, title.unwrap_or("New Chat"), now()],
        )?;
        Ok((session_id, user_id))
    }

    pub fn record_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        agent: &str,
    ) -> Result<(), ClaimflowError> {
        self.db.conn().execute(
            "INSERT INTO messages (message_id, session_id, role, content, agent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![new_id(), session_id, role, content, agent, now()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_session_generates_ids() {
        let store = SessionStore::new(Db::open_in_memory().unwrap());
        let (session_id, user_id) = store.create_session(None, None).unwrap();
        assert!(session_id.starts_with("s_"));
        assert!(user_id.starts_with('u'));

        let (other, explicit) = store.create_session(Some("u42"), Some("Claims")).unwrap();
        assert_ne!(session_id, other);
        assert_eq!(explicit, "u42");
    }

    #[test]
    fn test_record_message() {
        let store = SessionStore::new(Db::open_in_memory().unwrap());
        let (session_id, _user) = store.create_session(None, None).unwrap();
        store
            .record_message(&session_id, "user", "What is my copay?", "user")
            .unwrap();
        store
            .record_message(&session_id, "assistant", "Your copay is $20.", "summary")
            .unwrap();
    }
}
