use chrono::{DateTime, Local, NaiveDate, NaiveTime, SubsecRound, TimeZone, Utc};
use rusqlite::params;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use super::{Database, duplicate_id};
use crate::error::{LedgerError, Result};
use crate::models::{
    DayTotals, Entry, EntryKind, EntryPayload, MealPayload, NewEntry, UnsyncedCount,
    format_timestamp, parse_timestamp, validate_uuid,
};

/// Columns as stored, before the payload is decoded.
struct RawEntry {
    id: String,
    ts: String,
    synced: bool,
    payload: String,
}

impl RawEntry {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            ts: row.get(1)?,
            synced: row.get(2)?,
            payload: row.get(3)?,
        })
    }

    fn decode<P: DeserializeOwned>(self) -> Result<Entry<P>> {
        Ok(Entry {
            ts: parse_timestamp(&self.ts)?,
            payload: serde_json::from_str(&self.payload)?,
            id: self.id,
            synced: self.synced,
        })
    }
}

impl Database {
    fn query_entries<P: DeserializeOwned>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Entry<P>>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raw = stmt
            .query_map(params, RawEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.into_iter().map(RawEntry::decode).collect()
    }

    /// Validates and persists a new entry with `synced = false`.
    ///
    /// Missing `id` is assigned a fresh UUID and missing `ts` the current
    /// instant. The insert is a single statement, so it either lands whole or
    /// not at all; a reused id is rejected by the primary key.
    pub fn create_entry<P: EntryPayload>(&self, draft: NewEntry<P>) -> Result<Entry<P>> {
        let NewEntry {
            id,
            ts,
            mut payload,
        } = draft;
        payload.prepare()?;

        let id = match id {
            Some(id) => {
                validate_uuid(&id, "entry id")?;
                id
            }
            None => Uuid::new_v4().to_string(),
        };
        let ts = match ts {
            Some(raw) => parse_timestamp(&raw)?,
            None => Utc::now(),
        }
        .trunc_subsecs(3);
        let body = serde_json::to_string(&payload)?;

        let table = P::KIND.table();
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {table} (id, ts, synced, payload, created_at)
                     VALUES (?1, ?2, 0, ?3, ?4)"
                ),
                params![id, format_timestamp(&ts), body, Local::now().to_rfc3339()],
            )
            .map_err(|e| duplicate_id(e, "Entry", &id))?;

        debug!(kind = %P::KIND, id = %id, "entry created");
        Ok(Entry {
            id,
            ts,
            payload,
            synced: false,
        })
    }

    pub fn get_entry<P: EntryPayload>(&self, id: &str) -> Result<Option<Entry<P>>> {
        let table = P::KIND.table();
        let mut entries = self.query_entries(
            &format!("SELECT id, ts, synced, payload FROM {table} WHERE id = ?1"),
            params![id],
        )?;
        Ok(entries.pop())
    }

    /// Every entry of kind `P` not yet confirmed by a remote push, oldest first.
    pub fn list_unsynced<P: EntryPayload>(&self) -> Result<Vec<Entry<P>>> {
        let table = P::KIND.table();
        self.query_entries(
            &format!(
                "SELECT id, ts, synced, payload FROM {table} WHERE synced = 0 ORDER BY ts, id"
            ),
            [],
        )
    }

    /// Entries of kind `P` with `since <= ts < until`, oldest first.
    pub fn list_entries_between<P: EntryPayload>(
        &self,
        since: &DateTime<Utc>,
        until: &DateTime<Utc>,
    ) -> Result<Vec<Entry<P>>> {
        let table = P::KIND.table();
        self.query_entries(
            &format!(
                "SELECT id, ts, synced, payload FROM {table}
                 WHERE ts >= ?1 AND ts < ?2 ORDER BY ts, id"
            ),
            params![format_timestamp(since), format_timestamp(until)],
        )
    }

    /// Flips `synced` to true for exactly `ids` within `kind`.
    ///
    /// Unknown or already-synced ids are ignored, so repeating a call after a
    /// retry is harmless. Returns how many entries changed state.
    pub fn mark_synced(&self, kind: EntryKind, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let table = kind.table();
        let tx = self.conn.unchecked_transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "UPDATE {table} SET synced = 1 WHERE id = ?1 AND synced = 0"
            ))?;
            for id in ids {
                changed += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        debug!(kind = %kind, requested = ids.len(), changed, "entries marked synced");
        Ok(changed)
    }

    pub fn count_unsynced(&self, kind: EntryKind) -> Result<i64> {
        let table = kind.table();
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE synced = 0"),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn unsynced_counts(&self) -> Result<Vec<UnsyncedCount>> {
        EntryKind::ALL
            .into_iter()
            .map(|kind| {
                Ok(UnsyncedCount {
                    kind,
                    count: self.count_unsynced(kind)?,
                })
            })
            .collect()
    }

    /// Sums the frozen `computedTotals` of meals logged on a local calendar date.
    pub fn day_totals(&self, date: NaiveDate) -> Result<DayTotals> {
        let since = local_midnight(date)?;
        let next = date
            .succ_opt()
            .ok_or_else(|| LedgerError::validation(format!("Date out of range: {date}")))?;
        let until = local_midnight(next)?;

        let meals = self.list_entries_between::<MealPayload>(&since, &until)?;
        Ok(DayTotals {
            date: date.format("%Y-%m-%d").to_string(),
            meal_count: meals.len(),
            totals: meals.iter().map(|m| m.payload.computed_totals).sum(),
        })
    }
}

fn local_midnight(date: NaiveDate) -> Result<DateTime<Utc>> {
    Local
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| LedgerError::validation(format!("No local midnight on {date}")))
}
