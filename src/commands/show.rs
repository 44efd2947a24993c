use anyhow::Result;

use crate::store::TaskStore;

pub fn run(store: &TaskStore, user: i64, id: i64) -> Result<()> {
    let task = store.get_task(user, id)?;
    let crumbs = store.breadcrumb(user, id)?;

    let trail = crumbs
        .iter()
        .map(|c| c.title.as_str())
        .collect::<Vec<_>>()
        .join(" > ");
    println!("{}", trail);
    println!();

    println!("#{} {}", task.id, task.title);
    println!("Status:   {}", task.status.as_str());
    if let Some(priority) = task.priority {
        println!("Priority: {}", priority.as_str());
    }
    if let Some(description) = &task.description {
        println!("\n{}", description);
    }
    if let Some(estimate) = task.estimated_duration {
        println!("Estimate: {}m", estimate / 60);
    }
    if let Some(color) = &task.color_code {
        println!("Color:    {}", color);
    }
    println!("Created:  {}", task.created_at.format("%Y-%m-%d %H:%M"));
    if let Some(completed_at) = task.completed_at {
        println!("Completed: {}", completed_at.format("%Y-%m-%d %H:%M"));
    }

    let sessions = store.sessions_for_task(user, id)?;
    if !sessions.is_empty() {
        println!("\nSessions: {}", sessions.len());
        for session in sessions {
            let state = if session.completed { "done" } else { "open" };
            println!(
                "  #{} {} {} ({})",
                session.id,
                session.session_type.as_str(),
                session.start_time.format("%Y-%m-%d %H:%M"),
                state
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewSession, NewTask};
    use tempfile::tempdir;

    fn setup_test_db() -> (TaskStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(&dir.path().join("test.db")).unwrap();
        (store, dir)
    }

    #[test]
    fn test_show_missing_task_fails() {
        let (store, _dir) = setup_test_db();
        assert!(run(&store, 1, 42).is_err());
    }

    #[test]
    fn test_show_task_with_sessions() {
        let (mut store, _dir) = setup_test_db();
        let task = store
            .create_task(1, NewTask { title: "Visible".to_string(), ..Default::default() })
            .unwrap();
        let session = store
            .create_session(1, NewSession { duration: 1500, ..Default::default() })
            .unwrap();
        store.attach_task(1, session.id, task.id, None, None).unwrap();
        assert!(run(&store, 1, task.id).is_ok());
    }
}
