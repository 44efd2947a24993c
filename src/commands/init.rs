use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::store::TaskStore;

/// Creates the `.taproot` directory and an empty task database.
pub fn run(base_dir: &Path) -> Result<()> {
    let taproot_dir = base_dir.join(".taproot");

    if taproot_dir.exists() {
        println!("taproot already initialized at {}", taproot_dir.display());
        return Ok(());
    }

    fs::create_dir_all(&taproot_dir)
        .with_context(|| format!("Failed to create {}", taproot_dir.display()))?;

    let db_path = taproot_dir.join("tasks.db");
    TaskStore::open(&db_path).context("Failed to initialize task database")?;

    println!("Initialized taproot in {}", taproot_dir.display());
    println!("Create your first task with 'tap create \"<title>\"'.");

    Ok(())
}
