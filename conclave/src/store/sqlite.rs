use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{Agent, AgentTemplate, Channel, Id, Message, Workflow};

use super::{Store, StoreError};

/// SQLite-backed implementation of a relational store. Opens a fresh
/// connection per call inside `spawn_blocking` rather than pooling. Each
/// entity is stored as a JSON blob in its own table; this trades normalized
/// columns for a persistence layer that doesn't need a migration per domain
/// field, which is noted as a simplification in DESIGN.md.
pub struct SqliteStore {
    db_path: PathBuf,
}

fn to_store_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Other(e.to_string())
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path).map_err(to_store_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS channels (id TEXT PRIMARY KEY, data TEXT NOT NULL);
             CREATE TABLE IF NOT EXISTS agents (id TEXT PRIMARY KEY, handle TEXT NOT NULL, data TEXT NOT NULL);
             CREATE INDEX IF NOT EXISTS idx_agents_handle ON agents(handle);
             CREATE TABLE IF NOT EXISTS templates (id TEXT PRIMARY KEY, data TEXT NOT NULL);
             CREATE TABLE IF NOT EXISTS messages (id TEXT PRIMARY KEY, channel_id TEXT NOT NULL, created_at TEXT NOT NULL, data TEXT NOT NULL);
             CREATE INDEX IF NOT EXISTS idx_messages_channel ON messages(channel_id, created_at);
             CREATE TABLE IF NOT EXISTS workflows (id TEXT PRIMARY KEY, channel_id TEXT NOT NULL, data TEXT NOT NULL);
             CREATE INDEX IF NOT EXISTS idx_workflows_channel ON workflows(channel_id);",
        )
        .map_err(to_store_err)?;
        Ok(Self { db_path })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path).map_err(to_store_err)?;
            f(&conn).map_err(to_store_err)
        })
        .await
        .map_err(to_store_err)?
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_channel(&self, channel: Channel) -> Result<(), StoreError> {
        let json = serde_json::to_string(&channel).map_err(to_store_err)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO channels (id, data) VALUES (?1, ?2)",
                params![channel.id.to_string(), json],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_channel(&self, id: Id) -> Result<Option<Channel>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row("SELECT data FROM channels WHERE id = ?1", params![id.to_string()], |row| {
                row.get::<_, String>(0)
            })
            .optional()?
            .map(|json| serde_json::from_str(&json).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e))))
            .transpose()
        })
        .await
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM channels")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                let json = row?;
                let channel: Channel = serde_json::from_str(&json)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                out.push(channel);
            }
            Ok(out)
        })
        .await
    }

    async fn update_channel(&self, channel: Channel) -> Result<(), StoreError> {
        self.create_channel(channel).await
    }

    async fn create_agent(&self, agent: Agent) -> Result<(), StoreError> {
        let json = serde_json::to_string(&agent).map_err(to_store_err)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO agents (id, handle, data) VALUES (?1, ?2, ?3)",
                params![agent.id.to_string(), agent.handle, json],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_agent(&self, id: Id) -> Result<Option<Agent>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row("SELECT data FROM agents WHERE id = ?1", params![id.to_string()], |row| {
                row.get::<_, String>(0)
            })
            .optional()?
            .map(|json| serde_json::from_str(&json).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e))))
            .transpose()
        })
        .await
    }

    async fn get_agent_by_handle(&self, handle: &str) -> Result<Option<Agent>, StoreError> {
        let handle = handle.to_string();
        self.with_conn(move |conn| {
            conn.query_row("SELECT data FROM agents WHERE handle = ?1", params![handle], |row| {
                row.get::<_, String>(0)
            })
            .optional()?
            .map(|json| serde_json::from_str(&json).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e))))
            .transpose()
        })
        .await
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM agents")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                let json = row?;
                out.push(
                    serde_json::from_str(&json)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                );
            }
            Ok(out)
        })
        .await
    }

    async fn update_agent(&self, agent: Agent) -> Result<(), StoreError> {
        self.create_agent(agent).await
    }

    async fn create_template(&self, template: AgentTemplate) -> Result<(), StoreError> {
        let json = serde_json::to_string(&template).map_err(to_store_err)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO templates (id, data) VALUES (?1, ?2)",
                params![template.id.to_string(), json],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_template(&self, id: Id) -> Result<Option<AgentTemplate>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row("SELECT data FROM templates WHERE id = ?1", params![id.to_string()], |row| {
                row.get::<_, String>(0)
            })
            .optional()?
            .map(|json| serde_json::from_str(&json).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e))))
            .transpose()
        })
        .await
    }

    async fn list_templates(&self) -> Result<Vec<AgentTemplate>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM templates")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                let json = row?;
                out.push(
                    serde_json::from_str(&json)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                );
            }
            Ok(out)
        })
        .await
    }

    async fn insert_message(&self, message: Message) -> Result<(), StoreError> {
        let json = serde_json::to_string(&message).map_err(to_store_err)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO messages (id, channel_id, created_at, data) VALUES (?1, ?2, ?3, ?4)",
                params![message.id.to_string(), message.channel_id.to_string(), message.created_at.to_rfc3339(), json],
            )?;
            Ok(())
        })
        .await
    }

    async fn replace_message(&self, message: Message) -> Result<(), StoreError> {
        self.insert_message(message).await
    }

    async fn get_message(&self, id: Id) -> Result<Option<Message>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row("SELECT data FROM messages WHERE id = ?1", params![id.to_string()], |row| {
                row.get::<_, String>(0)
            })
            .optional()?
            .map(|json| serde_json::from_str(&json).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e))))
            .transpose()
        })
        .await
    }

    async fn list_messages(&self, channel_id: Id, limit: usize) -> Result<Vec<Message>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT data FROM messages WHERE channel_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![channel_id.to_string(), limit as i64], |row| {
                row.get::<_, String>(0)
            })?;
            let mut out = Vec::new();
            for row in rows {
                let json = row?;
                out.push(
                    serde_json::from_str::<Message>(&json)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                );
            }
            out.reverse();
            Ok(out)
        })
        .await
    }

    async fn count_messages(&self, channel_id: Id) -> Result<usize, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE channel_id = ?1",
                params![channel_id.to_string()],
                |row| row.get::<_, i64>(0),
            )
        })
        .await
        .map(|count| count as usize)
    }

    async fn create_workflow(&self, workflow: Workflow) -> Result<(), StoreError> {
        let json = serde_json::to_string(&workflow).map_err(to_store_err)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO workflows (id, channel_id, data) VALUES (?1, ?2, ?3)",
                params![workflow.id.to_string(), workflow.channel_id.to_string(), json],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_workflow(&self, id: Id) -> Result<Option<Workflow>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row("SELECT data FROM workflows WHERE id = ?1", params![id.to_string()], |row| {
                row.get::<_, String>(0)
            })
            .optional()?
            .map(|json| serde_json::from_str(&json).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e))))
            .transpose()
        })
        .await
    }

    async fn update_workflow(&self, workflow: Workflow) -> Result<(), StoreError> {
        self.create_workflow(workflow).await
    }

    async fn list_workflows(&self, channel_id: Id) -> Result<Vec<Workflow>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT data FROM workflows WHERE channel_id = ?1")?;
            let rows = stmt.query_map(params![channel_id.to_string()], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                let json = row?;
                out.push(
                    serde_json::from_str(&json)
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                );
            }
            Ok(out)
        })
        .await
    }
}
