// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chime list` and `chime delete` command implementations.
//!
//! Both operate on the alarm database directly. A running scheduler only
//! notices a deleted row after its next restart.

use chime_core::{ActorKey, ChimeError, Timestamp};
use chime_storage::{Database, StoredAlarm, queries};
use serde::Serialize;

/// One persisted alarm in `--json` output.
#[derive(Debug, Serialize)]
pub struct AlarmRow {
    pub namespace: String,
    pub actor_id: String,
    pub scheduled_time: Timestamp,
}

impl From<StoredAlarm> for AlarmRow {
    fn from(alarm: StoredAlarm) -> Self {
        Self {
            namespace: alarm.actor.unique_key,
            actor_id: alarm.actor.actor_id,
            scheduled_time: alarm.scheduled_time,
        }
    }
}

/// Run `chime list`.
pub async fn run_list(db: &Database, json: bool) -> Result<(), ChimeError> {
    let rows: Vec<AlarmRow> = queries::alarms::list_alarms(db)
        .await?
        .into_iter()
        .map(AlarmRow::from)
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&rows)
            .map_err(|e| ChimeError::Internal(format!("failed to encode alarms: {e}")))?;
        println!("{out}");
    } else {
        print!("{}", format_table(&rows));
    }
    Ok(())
}

/// Run `chime delete`. Returns whether a row was removed.
pub async fn run_delete(
    db: &Database,
    namespace: &str,
    actor_id: &str,
) -> Result<bool, ChimeError> {
    let actor = ActorKey::new(namespace, actor_id);
    let removed = queries::alarms::delete_alarm(db, &actor).await?;
    if removed {
        println!("deleted alarm for {actor}");
    } else {
        println!("no alarm for {actor}");
    }
    Ok(removed)
}

fn format_table(rows: &[AlarmRow]) -> String {
    if rows.is_empty() {
        return "no alarms\n".to_string();
    }

    let ns_width = rows
        .iter()
        .map(|r| r.namespace.len())
        .max()
        .unwrap_or(0)
        .max("NAMESPACE".len());
    let id_width = rows
        .iter()
        .map(|r| r.actor_id.len())
        .max()
        .unwrap_or(0)
        .max("ACTOR".len());

    let mut out = format!(
        "{:<ns_width$}  {:<id_width$}  SCHEDULED\n",
        "NAMESPACE", "ACTOR"
    );
    for row in rows {
        out.push_str(&format!(
            "{:<ns_width$}  {:<id_width$}  {}\n",
            row.namespace,
            row.actor_id,
            row.scheduled_time.to_rfc3339()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::timestamp_from_nanos;

    #[test]
    fn empty_table() {
        assert_eq!(format_table(&[]), "no alarms\n");
    }

    #[test]
    fn table_columns_align() {
        let rows = vec![
            AlarmRow {
                namespace: "tenant-a".into(),
                actor_id: "1".into(),
                scheduled_time: timestamp_from_nanos(0),
            },
            AlarmRow {
                namespace: "b".into(),
                actor_id: "long-actor".into(),
                scheduled_time: timestamp_from_nanos(1_000_000_000),
            },
        ];
        let table = format_table(&rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "NAMESPACE  ACTOR       SCHEDULED");
        assert_eq!(lines[1], "tenant-a   1           1970-01-01T00:00:00+00:00");
        assert_eq!(lines[2], "b          long-actor  1970-01-01T00:00:01+00:00");
    }

    #[tokio::test]
    async fn delete_reports_missing_row() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("alarms.sqlite")).await.unwrap();
        let actor = ActorKey::new("ns", "a");
        queries::alarms::upsert_alarm(&db, &actor, timestamp_from_nanos(5))
            .await
            .unwrap();

        assert!(run_delete(&db, "ns", "a").await.unwrap());
        assert!(!run_delete(&db, "ns", "a").await.unwrap());
        assert!(queries::alarms::list_alarms(&db).await.unwrap().is_empty());
    }
}
