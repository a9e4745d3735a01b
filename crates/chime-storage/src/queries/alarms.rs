// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alarm table operations, keyed by (namespace unique key, actor id).

use chime_core::{ActorKey, ChimeError, Timestamp, timestamp_from_nanos, timestamp_to_nanos};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::StoredAlarm;

const UPSERT_ALARM: &str = "INSERT INTO _chime_alarm (actor_unique_key, actor_id, scheduled_time)
     VALUES (?1, ?2, ?3)
     ON CONFLICT (actor_unique_key, actor_id) DO UPDATE SET scheduled_time = excluded.scheduled_time";

const DELETE_ALARM: &str =
    "DELETE FROM _chime_alarm WHERE actor_unique_key = ?1 AND actor_id = ?2";

/// Insert or replace the alarm for `actor`. Returns whether a row changed.
pub async fn upsert_alarm(
    db: &Database,
    actor: &ActorKey,
    scheduled_time: Timestamp,
) -> Result<bool, ChimeError> {
    let nanos = timestamp_to_nanos(scheduled_time)?;
    let unique_key = actor.unique_key.clone();
    let actor_id = actor.actor_id.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let mut stmt = conn.prepare_cached(UPSERT_ALARM)?;
            let changed = stmt.execute(params![unique_key, actor_id, nanos])?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete the alarm for `actor`. Returns whether a row existed.
pub async fn delete_alarm(db: &Database, actor: &ActorKey) -> Result<bool, ChimeError> {
    let unique_key = actor.unique_key.clone();
    let actor_id = actor.actor_id.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let mut stmt = conn.prepare_cached(DELETE_ALARM)?;
            let changed = stmt.execute(params![unique_key, actor_id])?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Look up the persisted alarm for one actor.
pub async fn get_alarm(db: &Database, actor: &ActorKey) -> Result<Option<Timestamp>, ChimeError> {
    let unique_key = actor.unique_key.clone();
    let actor_id = actor.actor_id.clone();
    let nanos = db
        .connection()
        .call(move |conn| -> Result<Option<i64>, rusqlite::Error> {
            conn.query_row(
                "SELECT scheduled_time FROM _chime_alarm
                 WHERE actor_unique_key = ?1 AND actor_id = ?2",
                params![unique_key, actor_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;
    Ok(nanos.map(timestamp_from_nanos))
}

/// Every persisted alarm, ordered by scheduled time.
pub async fn list_alarms(db: &Database) -> Result<Vec<StoredAlarm>, ChimeError> {
    db.connection()
        .call(|conn| -> Result<Vec<StoredAlarm>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT actor_unique_key, actor_id, scheduled_time FROM _chime_alarm
                 ORDER BY scheduled_time ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(StoredAlarm {
                    actor: ActorKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                    scheduled_time: timestamp_from_nanos(row.get(2)?),
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
