use crate::error::Error;
use anyhow::Result;
use log::info;
use sqlx::{Executor, PgPool};
use std::path::{Path, PathBuf};
use std::{cmp::Ordering, fs};

/// Sort key for a migration file name
fn get_order_value(name: &str) -> usize {
    if name.starts_with("add_indexes") {
        // Indexes go after every table
        return 2000;
    }
    // Numbered files use their numeric prefix
    name.split('_')
        .next()
        .and_then(|prefix| prefix.parse::<usize>().ok())
        .unwrap_or(usize::MAX)
}

/// `.sql` files of a directory in application order
pub fn migration_files(migrations_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(migrations_dir)
        .map_err(|e| {
            Error::Io(format!(
                "Failed to read migrations dir {}: {}",
                migrations_dir.display(),
                e
            ))
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "sql").unwrap_or(false))
        .collect::<Vec<_>>();

    entries.sort_by(|a, b| {
        let a_name = a.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let b_name = b.file_name().and_then(|n| n.to_str()).unwrap_or("");
        match get_order_value(a_name).cmp(&get_order_value(b_name)) {
            Ordering::Equal => a_name.cmp(b_name),
            other => other,
        }
    });

    Ok(entries)
}

pub async fn run_migrations(pool: &PgPool, migrations_dir: &Path) -> Result<()> {
    for path in migration_files(migrations_dir)? {
        execute_migration_file(pool, &path).await?;
        info!("Applied migration: {}", path.display());
    }

    Ok(())
}

async fn execute_migration_file(pool: &PgPool, path: &Path) -> Result<()> {
    let sql = fs::read_to_string(path)?;

    pool.execute(&*sql).await.map_err(|e| {
        Error::Database(format!("Migration {} failed: {}", path.display(), e))
    })?;

    Ok(())
}
