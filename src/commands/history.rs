use anyhow::Result;

use crate::store::TaskStore;

pub fn run(store: &TaskStore, user: i64, id: i64, limit: i64, offset: i64) -> Result<()> {
    let entries = store.task_history(user, id, limit, offset)?;

    if entries.is_empty() {
        println!("No history for task #{} in this range.", id);
        return Ok(());
    }

    for entry in &entries {
        println!(
            "[{}] {} (entry #{})",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action.as_str(),
            entry.id
        );
        for (field, change) in entry.changes.iter() {
            println!("    {}: {} -> {}", field, change.old, change.new);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, TaskPatch};
    use tempfile::tempdir;

    fn setup_test_db() -> (TaskStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(&dir.path().join("test.db")).unwrap();
        (store, dir)
    }

    #[test]
    fn test_history_prints_without_error() {
        let (mut store, _dir) = setup_test_db();
        let task = store
            .create_task(1, NewTask { title: "Tracked".to_string(), ..Default::default() })
            .unwrap();
        store
            .edit_task(
                1,
                task.id,
                TaskPatch { title: Some("Renamed".to_string()), ..Default::default() },
            )
            .unwrap();

        run(&store, 1, task.id, 20, 0).unwrap();
    }

    #[test]
    fn test_history_missing_task_fails() {
        let (store, _dir) = setup_test_db();
        assert!(run(&store, 1, 7, 20, 0).is_err());
    }
}
