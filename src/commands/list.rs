use anyhow::Result;

use crate::models::Status;
use crate::store::TaskStore;

fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Pending => " ",
        Status::InProgress => ">",
        Status::Completed => "x",
        Status::Blocked => "!",
    }
}

pub fn run(store: &TaskStore, user: i64, parent: Option<i64>, status: Option<&str>) -> Result<()> {
    let status = status.map(Status::parse).transpose()?;
    let tasks = store.list_tasks(user, parent, status, 100, 0)?;

    if tasks.is_empty() {
        match parent {
            Some(pid) => println!("No subtasks under #{}.", pid),
            None => println!("No tasks found."),
        }
        return Ok(());
    }

    for task in tasks {
        let priority = task.priority.map(|p| p.as_str()).unwrap_or("-");
        println!(
            "[{}] #{:<4} {:8} {}",
            status_icon(task.status),
            task.id,
            priority,
            task.title
        );
    }
    println!();
    println!("Legend: [ ] pending, [>] in progress, [x] completed, [!] blocked");

    Ok(())
}
