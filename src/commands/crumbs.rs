use anyhow::Result;

use crate::store::TaskStore;

pub fn run(store: &TaskStore, user: i64, id: i64) -> Result<()> {
    let crumbs = store.breadcrumb(user, id)?;
    for row in &crumbs {
        let indent = "  ".repeat(row.level as usize);
        println!("{}#{} {}", indent, row.id, row.title);
    }
    Ok(())
}
