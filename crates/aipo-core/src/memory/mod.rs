//! Persistent append-only conversation memory (spec.md §4.6). Writes are
//! serialized through a single-writer queue so the turn-index invariant
//! holds under concurrent orchestrators; reads may run concurrently.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// spec.md §3: `role ∈ {system, user, assistant, tool}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub turn_index: u32,
    pub role: Role,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub conversation_id: Uuid,
    pub turns: Vec<Turn>,
}

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("conversation {0} not found")]
    NotFound(Uuid),
    #[error("branch point {up_to_turn} exceeds conversation length")]
    BranchOutOfRange { up_to_turn: u32 },
}

/// Append-only conversation store backed by a single rusqlite connection
/// guarded by a mutex — all writes funnel through it, giving the single-
/// writer serialization spec.md §4.6 requires while rusqlite itself stays
/// synchronous.
pub struct ConversationMemory {
    conn: Mutex<Connection>,
}

impl ConversationMemory {
    pub fn open(path: &std::path::Path) -> Result<Self, MemoryError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, MemoryError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, MemoryError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS turns (
                conversation_id TEXT NOT NULL,
                turn_index INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (conversation_id, turn_index)
            );",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Appends a turn, assigning the next strictly-monotonic index (spec.md
    /// §4.6 invariant I1). Returns the assigned `turn_index`.
    pub fn append(
        &self,
        conversation_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<u32, MemoryError> {
        let conn = self.conn.lock().expect("memory mutex poisoned");
        let next_index: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(turn_index), -1) + 1 FROM turns WHERE conversation_id = ?1",
                params![conversation_id.to_string()],
                |r| r.get(0),
            )?;
        let now = chrono::Utc::now();
        conn.execute(
            "INSERT INTO turns (conversation_id, turn_index, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                conversation_id.to_string(),
                next_index,
                role_to_str(role),
                content,
                now.to_rfc3339()
            ],
        )?;
        Ok(next_index as u32)
    }

    pub fn list(&self, conversation_id: Uuid) -> Result<Vec<Turn>, MemoryError> {
        let conn = self.conn.lock().expect("memory mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT turn_index, role, content, created_at FROM turns
             WHERE conversation_id = ?1 ORDER BY turn_index ASC",
        )?;
        let rows = stmt
            .query_map(params![conversation_id.to_string()], row_to_turn)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_all(&self) -> Result<Vec<Conversation>, MemoryError> {
        let conn = self.conn.lock().expect("memory mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT DISTINCT conversation_id FROM turns ORDER BY conversation_id ASC",
        )?;
        let ids: Vec<String> = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut conversations = Vec::with_capacity(ids.len());
        for id_str in ids {
            let conversation_id: Uuid = id_str.parse().expect("stored conversation ids are valid UUIDs");
            let mut stmt = conn.prepare(
                "SELECT turn_index, role, content, created_at FROM turns
                 WHERE conversation_id = ?1 ORDER BY turn_index ASC",
            )?;
            let turns = stmt
                .query_map(params![id_str], row_to_turn)?
                .collect::<Result<Vec<_>, _>>()?;
            conversations.push(Conversation { conversation_id, turns });
        }
        Ok(conversations)
    }

    /// Deletes every turn belonging to `conversation_id`. Returns the number
    /// of turns removed.
    pub fn delete(&self, conversation_id: Uuid) -> Result<usize, MemoryError> {
        let conn = self.conn.lock().expect("memory mutex poisoned");
        let removed = conn.execute(
            "DELETE FROM turns WHERE conversation_id = ?1",
            params![conversation_id.to_string()],
        )?;
        Ok(removed)
    }

    /// Deletes every conversation whose most recent turn is older than
    /// `older_than`. Returns the ids removed.
    pub fn prune(&self, older_than: chrono::DateTime<chrono::Utc>) -> Result<Vec<Uuid>, MemoryError> {
        let conn = self.conn.lock().expect("memory mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT conversation_id FROM turns
             GROUP BY conversation_id
             HAVING MAX(created_at) < ?1",
        )?;
        let cutoff = older_than.to_rfc3339();
        let ids: Vec<String> = stmt
            .query_map(params![cutoff], |r| r.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut removed = Vec::with_capacity(ids.len());
        for id_str in ids {
            conn.execute("DELETE FROM turns WHERE conversation_id = ?1", params![id_str])?;
            removed.push(id_str.parse().expect("stored conversation ids are valid UUIDs"));
        }
        Ok(removed)
    }

    /// Forks a new conversation whose first `up_to_turn + 1` turns are a copy
    /// of `conversation_id`'s (spec.md §4.6 invariant I2). The source
    /// conversation is untouched and remains appendable (invariant I3).
    pub fn branch(&self, conversation_id: Uuid, up_to_turn: u32) -> Result<Uuid, MemoryError> {
        let source = self.list(conversation_id)?;
        if source.is_empty() {
            return Err(MemoryError::NotFound(conversation_id));
        }
        if up_to_turn as usize >= source.len() {
            return Err(MemoryError::BranchOutOfRange { up_to_turn });
        }

        let new_id = Uuid::new_v4();
        let conn = self.conn.lock().expect("memory mutex poisoned");
        for turn in &source[..=up_to_turn as usize] {
            conn.execute(
                "INSERT INTO turns (conversation_id, turn_index, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    new_id.to_string(),
                    turn.turn_index,
                    role_to_str(turn.role),
                    turn.content,
                    turn.created_at.to_rfc3339()
                ],
            )?;
        }
        Ok(new_id)
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn str_to_role(role_str: &str) -> Role {
    match role_str {
        "system" => Role::System,
        "user" => Role::User,
        "tool" => Role::Tool,
        _ => Role::Assistant,
    }
}

fn row_to_turn(row: &rusqlite::Row<'_>) -> rusqlite::Result<Turn> {
    let turn_index: i64 = row.get(0)?;
    let role_str: String = row.get(1)?;
    let content: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    Ok(Turn {
        turn_index: turn_index as u32,
        role: str_to_role(&role_str),
        content,
        created_at: created_at.parse().expect("stored timestamps are valid RFC3339"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_and_tool_roles_round_trip() -> Result<(), MemoryError> {
        let mem = ConversationMemory::in_memory()?;
        let id = Uuid::new_v4();
        mem.append(id, Role::System, "be concise")?;
        mem.append(id, Role::User, "hi")?;
        mem.append(id, Role::Tool, "{\"result\": 1}")?;

        let turns = mem.list(id)?;
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Tool]);
        Ok(())
    }

    #[test]
    fn append_assigns_strictly_monotonic_indices_from_zero() -> Result<(), MemoryError> {
        let mem = ConversationMemory::in_memory()?;
        let id = Uuid::new_v4();
        assert_eq!(mem.append(id, Role::User, "hi")?, 0);
        assert_eq!(mem.append(id, Role::Assistant, "hello")?, 1);
        assert_eq!(mem.append(id, Role::User, "again")?, 2);
        Ok(())
    }

    #[test]
    fn branch_copies_prefix_and_leaves_tail_empty() -> Result<(), MemoryError> {
        let mem = ConversationMemory::in_memory()?;
        let id = Uuid::new_v4();
        mem.append(id, Role::User, "t0")?;
        mem.append(id, Role::Assistant, "t1")?;
        mem.append(id, Role::User, "t2")?;
        mem.append(id, Role::Assistant, "t3")?;

        let branched = mem.branch(id, 1)?;
        let branched_turns = mem.list(branched)?;
        assert_eq!(branched_turns.len(), 2);
        assert_eq!(branched_turns[0].content, "t0");
        assert_eq!(branched_turns[1].content, "t1");
        Ok(())
    }

    #[test]
    fn append_to_branched_from_conversation_still_succeeds() -> Result<(), MemoryError> {
        let mem = ConversationMemory::in_memory()?;
        let id = Uuid::new_v4();
        mem.append(id, Role::User, "t0")?;
        mem.append(id, Role::Assistant, "t1")?;
        let _branched = mem.branch(id, 0)?;
        // Parent must still accept new turns after being branched from.
        assert_eq!(mem.append(id, Role::User, "t2")?, 2);
        Ok(())
    }

    #[test]
    fn branch_out_of_range_is_rejected() {
        let mem = ConversationMemory::in_memory().unwrap();
        let id = Uuid::new_v4();
        mem.append(id, Role::User, "t0").unwrap();
        assert!(matches!(
            mem.branch(id, 5),
            Err(MemoryError::BranchOutOfRange { .. })
        ));
    }

    #[test]
    fn list_all_returns_every_conversation() -> Result<(), MemoryError> {
        let mem = ConversationMemory::in_memory()?;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        mem.append(a, Role::User, "a0")?;
        mem.append(b, Role::User, "b0")?;
        assert_eq!(mem.list_all()?.len(), 2);
        Ok(())
    }

    #[test]
    fn delete_removes_all_turns_for_one_conversation() -> Result<(), MemoryError> {
        let mem = ConversationMemory::in_memory()?;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        mem.append(a, Role::User, "a0")?;
        mem.append(b, Role::User, "b0")?;
        assert_eq!(mem.delete(a)?, 1);
        assert!(mem.list(a)?.is_empty());
        assert_eq!(mem.list(b)?.len(), 1);
        Ok(())
    }

    #[test]
    fn prune_removes_only_conversations_older_than_cutoff() -> Result<(), MemoryError> {
        let mem = ConversationMemory::in_memory()?;
        let old = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        mem.append(old, Role::User, "old turn")?;
        mem.append(fresh, Role::User, "fresh turn")?;

        let cutoff = chrono::Utc::now() + chrono::Duration::seconds(1);
        let removed = mem.prune(cutoff)?;
        assert_eq!(removed.len(), 2);

        let future_cutoff = chrono::Utc::now() - chrono::Duration::days(365);
        mem.append(fresh, Role::User, "fresh turn again")?;
        assert!(mem.prune(future_cutoff)?.is_empty());
        Ok(())
    }
}
