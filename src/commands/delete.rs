use anyhow::Result;
use std::io::{self, Write};

use crate::store::TaskStore;

pub fn run(store: &mut TaskStore, user: i64, id: i64, force: bool) -> Result<()> {
    if !force {
        // Look the task up first so the prompt can show its title.
        let task = store.get_task(user, id)?;
        print!("Delete task #{} \"{}\" and its subtree? [y/N] ", id, task.title);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.delete_task(user, id)?;
    println!("Deleted task #{} and its subtree", id);

    Ok(())
}

pub fn restore(store: &mut TaskStore, user: i64, id: i64) -> Result<()> {
    let task = store.restore_task(user, id)?;
    println!("Restored task #{}: {}", task.id, task.title);
    Ok(())
}

/// Internal function for testing without stdin interaction
#[cfg(test)]
pub fn run_force(store: &mut TaskStore, user: i64, id: i64) -> Result<()> {
    run(store, user, id, true)
}
