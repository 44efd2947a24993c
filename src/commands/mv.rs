use anyhow::Result;

use crate::store::TaskStore;

pub fn run(store: &mut TaskStore, user: i64, id: i64, parent: Option<i64>) -> Result<()> {
    let task = store.move_task(user, id, parent)?;
    match task.parent_id {
        Some(pid) => println!("Moved task #{} under #{} (path {})", task.id, pid, task.path),
        None => println!("Moved task #{} to top level (path {})", task.id, task.path),
    }
    Ok(())
}
