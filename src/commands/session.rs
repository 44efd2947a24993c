use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::models::{NewSession, SessionFilter, SessionKind};
use crate::store::TaskStore;

/// Accepts either a full RFC 3339 timestamp or a bare date (midnight UTC).
fn parse_when(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }
    bail!("Unrecognized time {:?}; use RFC 3339 or YYYY-MM-DD", s);
}

pub fn start(store: &mut TaskStore, user: i64, duration: i64, kind: &str) -> Result<()> {
    let kind = SessionKind::parse(kind)?;
    let session = store.create_session(
        user,
        NewSession { duration, session_type: Some(kind), ..Default::default() },
    )?;
    println!(
        "Started {} session #{} ({} min planned)",
        session.session_type.as_str(),
        session.id,
        session.duration / 60
    );
    Ok(())
}

pub fn complete(
    store: &mut TaskStore,
    user: i64,
    id: i64,
    actual: Option<i64>,
    reason: Option<String>,
) -> Result<()> {
    let session = store.complete_session(user, id, None, actual, reason)?;
    match (&session.interruption_reason, session.actual_duration) {
        (Some(reason), _) => println!("Session #{} interrupted: {}", session.id, reason),
        (None, Some(actual)) => {
            println!("Completed session #{} ({} min actual)", session.id, actual / 60)
        }
        (None, None) => println!("Completed session #{}", session.id),
    }
    Ok(())
}

pub fn list(
    store: &TaskStore,
    user: i64,
    completed: Option<bool>,
    kind: Option<&str>,
    after: Option<&str>,
    before: Option<&str>,
) -> Result<()> {
    let filter = SessionFilter {
        completed,
        session_type: kind.map(SessionKind::parse).transpose()?,
        started_after: after.map(parse_when).transpose()?,
        started_before: before.map(parse_when).transpose()?,
    };
    let sessions = store.list_sessions(user, &filter, 50, 0)?;

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    for session in &sessions {
        let state = if session.completed { "done" } else { "open" };
        println!(
            "#{:<4} {:<12} [{}] started {} ({} min planned)",
            session.id,
            session.session_type.as_str(),
            state,
            session.start_time.format("%Y-%m-%d %H:%M"),
            session.duration / 60
        );
    }
    println!("\n{} session(s)", sessions.len());
    Ok(())
}

pub fn attach(
    store: &mut TaskStore,
    user: i64,
    session: i64,
    task: i64,
    spent: Option<i64>,
    notes: Option<String>,
) -> Result<()> {
    let link = store.attach_task(user, session, task, spent, notes)?;
    println!("Attached task #{} to session #{} (link #{})", task, session, link.id);
    Ok(())
}

pub fn detach(store: &mut TaskStore, user: i64, session: i64, task: i64) -> Result<()> {
    store.detach_task(user, session, task)?;
    println!("Detached task #{} from session #{}", task, session);
    Ok(())
}

pub fn delete(store: &mut TaskStore, user: i64, id: i64) -> Result<()> {
    store.delete_session(user, id)?;
    println!("Deleted session #{}", id);
    Ok(())
}

pub fn restore(store: &mut TaskStore, user: i64, id: i64) -> Result<()> {
    let session = store.restore_session(user, id)?;
    println!("Restored session #{}", session.id);
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
    fn test_start_and_complete() {
        let (mut store, _dir) = setup_test_db();
        start(&mut store, 1, 1500, "work").unwrap();

        let sessions = store.list_sessions(1, &SessionFilter::default(), 10, 0).unwrap();
        assert_eq!(sessions.len(), 1);
        let id = sessions[0].id;

        complete(&mut store, 1, id, Some(1200), None).unwrap();
        let session = store.get_session(1, id).unwrap();
        assert!(session.completed);
        assert_eq!(session.actual_duration, Some(1200));
    }

    #[test]
    fn test_start_rejects_unknown_kind() {
        let (mut store, _dir) = setup_test_db();
        assert!(start(&mut store, 1, 1500, "nap").is_err());
    }

    #[test]
    fn test_attach_and_detach() {
        let (mut store, _dir) = setup_test_db();
        let task = store
            .create_task(1, NewTask { title: "Focus".to_string(), ..Default::default() })
            .unwrap();
        let session = store
            .create_session(1, NewSession { duration: 1500, ..Default::default() })
            .unwrap();

        attach(&mut store, 1, session.id, task.id, Some(600), None).unwrap();
        assert_eq!(store.tasks_for_session(1, session.id).unwrap().len(), 1);

        detach(&mut store, 1, session.id, task.id).unwrap();
        assert!(store.tasks_for_session(1, session.id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_then_restore() {
        let (mut store, _dir) = setup_test_db();
        let session = store
            .create_session(1, NewSession { duration: 1500, ..Default::default() })
            .unwrap();

        delete(&mut store, 1, session.id).unwrap();
        assert!(store.get_session(1, session.id).is_err());

        restore(&mut store, 1, session.id).unwrap();
        assert!(store.get_session(1, session.id).is_ok());
    }

    #[test]
    fn test_list_filters_by_kind() {
        let (mut store, _dir) = setup_test_db();
        start(&mut store, 1, 1500, "work").unwrap();
        start(&mut store, 1, 300, "short_break").unwrap();

        // Both filtered and unfiltered listings print cleanly.
        list(&store, 1, None, Some("work"), None, None).unwrap();
        list(&store, 1, Some(false), None, None, None).unwrap();
    }

    #[test]
    fn test_list_accepts_date_range() {
        let (mut store, _dir) = setup_test_db();
        start(&mut store, 1, 1500, "work").unwrap();

        list(&store, 1, None, None, Some("2026-01-01"), None).unwrap();
        list(&store, 1, None, None, None, Some("2030-01-01T00:00:00+00:00")).unwrap();
        assert!(list(&store, 1, None, None, Some("yesterday"), None).is_err());
    }

    #[test]
    fn test_parse_when_forms() {
        let midnight = parse_when("2026-03-05").unwrap();
        assert_eq!(midnight.to_rfc3339(), "2026-03-05T00:00:00+00:00");

        let precise = parse_when("2026-03-05T14:30:00+02:00").unwrap();
        assert_eq!(precise.to_rfc3339(), "2026-03-05T12:30:00+00:00");

        assert!(parse_when("last tuesday").is_err());
    }
}
