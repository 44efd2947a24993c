use anyhow::{bail, Result};

use crate::models::{Priority, Status, TaskPatch};
use crate::store::TaskStore;

#[allow(clippy::too_many_arguments)]
pub fn run(
    store: &mut TaskStore,
    user: i64,
    id: i64,
    title: Option<String>,
    description: Option<String>,
    priority: Option<&str>,
    status: Option<&str>,
    color: Option<String>,
    estimate: Option<i64>,
) -> Result<()> {
    let patch = TaskPatch {
        title,
        description,
        priority: priority.map(Priority::parse).transpose()?,
        status: status.map(Status::parse).transpose()?,
        color_code: color,
        estimated_duration: estimate,
    };

    if patch.is_empty() {
        bail!("Nothing to update. Pass at least one of --title/--description/--priority/--status/--color/--estimate.");
    }

    let task = store.edit_task(user, id, patch)?;
    println!("Updated task #{}: {}", task.id, task.title);
    if task.status == Status::Completed {
        println!("Marked completed.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;
    use tempfile::tempdir;

    fn setup_test_db() -> (TaskStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(&dir.path().join("test.db")).unwrap();
        (store, dir)
    }

    #[test]
    fn test_update_title_and_status() {
        let (mut store, _dir) = setup_test_db();
        let task = store
            .create_task(1, NewTask { title: "Draft".to_string(), ..Default::default() })
            .unwrap();
        run(
            &mut store,
            1,
            task.id,
            Some("Final".to_string()),
            None,
            None,
            Some("completed"),
            None,
            None,
        )
        .unwrap();
        let task = store.get_task(1, task.id).unwrap();
        assert_eq!(task.title, "Final");
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_update_nothing_fails() {
        let (mut store, _dir) = setup_test_db();
        let task = store
            .create_task(1, NewTask { title: "Lonely".to_string(), ..Default::default() })
            .unwrap();
        let err = run(&mut store, 1, task.id, None, None, None, None, None, None).unwrap_err();
        assert!(err.to_string().contains("Nothing to update"));
    }
}
