use anyhow::Result;

use crate::models::{NewTask, Priority};
use crate::store::TaskStore;

#[allow(clippy::too_many_arguments)]
pub fn run(
    store: &mut TaskStore,
    user: i64,
    title: &str,
    description: Option<String>,
    priority: Option<&str>,
    parent: Option<i64>,
    color: Option<String>,
    estimate: Option<i64>,
) -> Result<()> {
    let priority = priority.map(Priority::parse).transpose()?;
    let task = store.create_task(
        user,
        NewTask {
            title: title.to_string(),
            description,
            priority,
            parent_id: parent,
            color_code: color,
            estimated_duration: estimate,
            ..Default::default()
        },
    )?;

    match parent {
        Some(pid) => println!("Created task #{} under #{}: {}", task.id, pid, task.title),
        None => println!("Created task #{}: {}", task.id, task.title),
    }

    Ok(())
}
