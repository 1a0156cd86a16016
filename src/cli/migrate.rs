// src/cli/migrate.rs — Database migration command
//
// Migrations run automatically whenever the store is opened. This command
// reports what has been applied and can undo the latest migration.

use std::path::Path;

use rusqlite::Connection;

use crate::memory::schema;

pub fn run_migrate(db_path: &Path, status_only: bool, rollback: bool) -> anyhow::Result<()> {
    if !db_path.exists() && (status_only || rollback) {
        println!("No database found at: {}", db_path.display());
        println!("It is created on the first stored run.");
        return Ok(());
    }

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;

    if rollback {
        match schema::rollback_last(&conn)? {
            Some(version) => println!("Rolled back migration v{version}."),
            None => println!("No migrations to roll back."),
        }
        return show_migration_status(&conn, db_path);
    }

    if !status_only {
        println!("Running database migrations...");
        schema::run_migrations(&conn)?;
        println!("Migrations complete.");
    }

    show_migration_status(&conn, db_path)
}

fn show_migration_status(conn: &Connection, db_path: &Path) -> anyhow::Result<()> {
    let current = schema::current_version(conn)?;
    println!("Database: {}", db_path.display());
    println!("Current schema version: {current}");

    let mut stmt =
        conn.prepare("SELECT version, name, applied_at FROM _migrations ORDER BY version")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, u32>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut any = false;
    for row in rows {
        let (version, name, applied_at) = row?;
        if !any {
            println!("Applied migrations:");
            any = true;
        }
        println!("  v{version}: {name} (applied {applied_at})");
    }
    if !any {
        println!("No migrations have been applied.");
    }
    Ok(())
}
