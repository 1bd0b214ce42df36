//! redb-backed session store.
//!
//! Two tables:
//! - `sessions`: session id → encoded record
//! - `meta`: `next_id` → next session id to hand out
//!
//! Ids are allocated sequentially from 1 inside a write transaction, so two
//! handles on the same database never hand out the same id.

use super::codec;
use crate::error::Result;
use crate::scope::Scope;
use crate::session::{ChatSession, SessionId};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;

const SESSIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("sessions");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");
const NEXT_ID_KEY: &str = "next_id";

/// One line of a session listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session id.
    pub id: SessionId,
    /// Session title.
    pub title: String,
    /// Completed turns.
    pub turns: u32,
    /// Messages in the user-facing transcript.
    pub messages: usize,
    /// Name of the attached document, if any.
    pub document_name: Option<String>,
}

impl From<&ChatSession> for SessionSummary {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            turns: session.turns,
            messages: session.transcript.len(),
            document_name: session.document.as_ref().map(|d| d.name.clone()),
        }
    }
}

/// Persistent store of chat sessions.
pub struct SessionStore {
    db: Database,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish()
    }
}

impl SessionStore {
    /// Open the store at `path`, creating the file and tables if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;
        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(SESSIONS)?;
            let _ = txn.open_table(META)?;
        }
        txn.commit()?;
        Ok(Self { db })
    }

    /// Allocate a fresh session id.
    pub fn next_id(&self) -> Result<SessionId> {
        let txn = self.db.begin_write()?;
        let id = {
            let mut meta = txn.open_table(META)?;
            let current = meta.get(NEXT_ID_KEY)?.map(|g| g.value()).unwrap_or(1);
            meta.insert(NEXT_ID_KEY, current.saturating_add(1))?;
            current
        };
        txn.commit()?;
        Ok(SessionId(id))
    }

    /// Create, persist and return an empty session.
    pub fn create(&self, scope: Scope) -> Result<ChatSession> {
        let session = ChatSession::new(self.next_id()?, scope);
        self.save(&session)?;
        Ok(session)
    }

    /// Insert or overwrite a session.
    pub fn save(&self, session: &ChatSession) -> Result<()> {
        let record = codec::encode(session)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SESSIONS)?;
            table.insert(session.id.0, record.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Load a session by id.
    pub fn load(&self, id: SessionId) -> Result<Option<ChatSession>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SESSIONS)?;
        let record = table.get(id.0)?;
        let session = match record {
            Some(guard) => Some(codec::decode(guard.value())?),
            None => None,
        };
        Ok(session)
    }

    /// Delete a session. Returns true when it existed.
    pub fn delete(&self, id: SessionId) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let existed = {
            let mut table = txn.open_table(SESSIONS)?;
            table.remove(id.0)?.is_some()
        };
        txn.commit()?;
        Ok(existed)
    }

    /// Summaries of every stored session, ordered by id.
    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SESSIONS)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let session = codec::decode(value.value())?;
            out.push(SessionSummary::from(&session));
        }
        Ok(out)
    }
}

// =============================================================================
// TESTS
// =============================================================================
