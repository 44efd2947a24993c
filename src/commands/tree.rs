use anyhow::Result;

use crate::store::TaskStore;

pub fn run(store: &TaskStore, user: i64, id: i64) -> Result<()> {
    let rows = store.subtree(user, id)?;
    let root = store.get_task(user, id)?;

    println!("#{} {}", root.id, root.title);
    for row in &rows {
        let indent = "  ".repeat(row.level as usize);
        println!("{}#{} {}", indent, row.id, row.title);
    }

    if rows.is_empty() {
        println!("  (no subtasks)");
    }

    Ok(())
}
