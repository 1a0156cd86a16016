// src/memory/mod.rs — Request history persistence

pub mod schema;
pub mod store;
pub mod store_server;

pub use store_server::StoreHandle;

use rusqlite::Connection;
use std::path::Path;

/// Owns the SQLite connection until it is handed to the store server.
pub struct MemoryManager {
    pub store: store::Store,
}

impl MemoryManager {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    /// In-memory database, used by tests and `--no-store` runs.
    pub fn in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            store: store::Store::new(conn),
        })
    }

    /// Move the store onto its own task.
    pub fn spawn_server(self) -> (store_server::StoreHandle, tokio::task::JoinHandle<()>) {
        store_server::spawn_store_server(self.store)
    }
}
