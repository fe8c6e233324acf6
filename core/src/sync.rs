//! Push-only reconciliation of the local ledger with a remote store.
//!
//! One cycle walks `Idle -> Collecting -> Pushing -> Reconciling -> Idle`, or
//! drops to `Failed -> Idle` on any error. Entries are only marked synced after
//! the remote has accepted the batch that contained them; a failed cycle leaves
//! every flag untouched and the next cycle re-sends the same entries, so the
//! remote must treat pushes as idempotent by entry id.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{LedgerError, Result};
use crate::models::{
    BeveragePayload, Entry, EntryKind, ExercisePayload, FastingPayload, MealPayload,
    MetricPayload,
};

/// Path appended to the configured endpoint for batch pushes.
pub const SYNC_PATH: &str = "/api/sync";

#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Base URL of the remote backend, e.g. `https://api.example.com`.
    pub endpoint: Option<String>,
}

impl SyncConfig {
    pub fn new(endpoint: Option<String>) -> Self {
        Self { endpoint }
    }

    pub fn sync_url(&self) -> Result<String> {
        let base = self
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| LedgerError::configuration("sync endpoint is not configured"))?;
        Ok(format!("{}{SYNC_PATH}", base.trim_end_matches('/')))
    }
}

/// Request body for one push: every unsynced entry, grouped by collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncBatch {
    pub meals: Vec<Entry<MealPayload>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exercises: Vec<Entry<ExercisePayload>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Entry<MetricPayload>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fasting: Vec<Entry<FastingPayload>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub beverages: Vec<Entry<BeveragePayload>>,
}

/// Ids of one collection that went out in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindIds {
    pub kind: EntryKind,
    pub ids: Vec<String>,
}

fn ids_of<P>(entries: &[Entry<P>]) -> Vec<String> {
    entries.iter().map(|e| e.id.clone()).collect()
}

impl SyncBatch {
    /// Point-in-time snapshot of every unsynced entry.
    pub fn collect(db: &Database) -> Result<Self> {
        Ok(Self {
            meals: db.list_unsynced()?,
            exercises: db.list_unsynced()?,
            metrics: db.list_unsynced()?,
            fasting: db.list_unsynced()?,
            beverages: db.list_unsynced()?,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.meals.len()
            + self.exercises.len()
            + self.metrics.len()
            + self.fasting.len()
            + self.beverages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-empty collections with the ids they carry.
    #[must_use]
    pub fn ids(&self) -> Vec<KindIds> {
        [
            (EntryKind::Meal, ids_of(&self.meals)),
            (EntryKind::Exercise, ids_of(&self.exercises)),
            (EntryKind::Metric, ids_of(&self.metrics)),
            (EntryKind::Fasting, ids_of(&self.fasting)),
            (EntryKind::Beverage, ids_of(&self.beverages)),
        ]
        .into_iter()
        .filter(|(_, ids)| !ids.is_empty())
        .map(|(kind, ids)| KindIds { kind, ids })
        .collect()
    }
}

/// One outgoing push, already serialized.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub url: String,
    /// Opaque credential sent as `Authorization: Bearer <bearer>`.
    pub bearer: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PushResponse {
    pub status: u16,
    pub body: String,
}

impl PushResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Carries a push to the remote. Connection failures and timeouts are
/// reported as `LedgerError::Transport`; any HTTP status comes back as a
/// `PushResponse` and is judged by the engine.
pub trait SyncTransport {
    fn push(&self, request: PushRequest) -> impl Future<Output = Result<PushResponse>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    Idle,
    Collecting,
    Pushing,
    Reconciling,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub pushed: Vec<KindIds>,
    /// Whatever the remote answered with; `Null` when the body was not JSON.
    pub acknowledgement: serde_json::Value,
}

impl SyncReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.pushed.iter().map(|k| k.ids.len()).sum()
    }

    #[must_use]
    pub fn ids_for(&self, kind: EntryKind) -> &[String] {
        self.pushed
            .iter()
            .find(|k| k.kind == kind)
            .map_or(&[], |k| k.ids.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SyncOutcome {
    NothingToSync,
    /// Another cycle held the guard; nothing was collected or sent.
    AlreadyRunning,
    Pushed(SyncReport),
}

/// Holds the in-flight slot for one cycle and returns it to `Idle` on drop.
struct Cycle<'a> {
    state: &'a Mutex<SyncState>,
}

impl Cycle<'_> {
    fn enter(&self, next: SyncState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(from = ?*state, to = ?next, "sync state transition");
        *state = next;
    }
}

impl Drop for Cycle<'_> {
    fn drop(&mut self) {
        self.enter(SyncState::Idle);
    }
}

pub struct SyncEngine<T> {
    transport: T,
    config: SyncConfig,
    state: Mutex<SyncState>,
}

impl<T: SyncTransport> SyncEngine<T> {
    pub fn new(transport: T, config: SyncConfig) -> Self {
        Self {
            transport,
            config,
            state: Mutex::new(SyncState::Idle),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Check-and-set of the in-flight slot.
    fn begin(&self) -> Option<Cycle<'_>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != SyncState::Idle {
            return None;
        }
        *state = SyncState::Collecting;
        Some(Cycle { state: &self.state })
    }

    /// Runs one sync cycle against `db`.
    ///
    /// Fails with `Configuration` before touching the store or network when
    /// the endpoint or credential is missing. Returns `AlreadyRunning` without
    /// doing anything if another cycle on this engine is in flight.
    pub async fn run_cycle(&self, db: &Database, credential: Option<&str>) -> Result<SyncOutcome> {
        let url = self.config.sync_url()?;
        let bearer = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| LedgerError::configuration("no credential available; sign in first"))?;

        let Some(cycle) = self.begin() else {
            info!("sync cycle already in flight, skipping");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        let result = self.drive(&cycle, db, url, bearer).await;
        if let Err(e) = &result {
            cycle.enter(SyncState::Failed);
            warn!(error = %e, "sync cycle failed; entries stay unsynced");
        }
        result
    }

    async fn drive(
        &self,
        cycle: &Cycle<'_>,
        db: &Database,
        url: String,
        bearer: &str,
    ) -> Result<SyncOutcome> {
        let batch = SyncBatch::collect(db)?;
        if batch.is_empty() {
            debug!("nothing to sync");
            return Ok(SyncOutcome::NothingToSync);
        }

        cycle.enter(SyncState::Pushing);
        let body = serde_json::to_vec(&batch)?;
        let response = self
            .transport
            .push(PushRequest {
                url,
                bearer: bearer.to_string(),
                body,
            })
            .await?;
        if !response.is_success() {
            return Err(LedgerError::rejected(response.status, &response.body));
        }

        cycle.enter(SyncState::Reconciling);
        let pushed = batch.ids();
        for kind_ids in &pushed {
            db.mark_synced(kind_ids.kind, &kind_ids.ids)?;
        }

        let acknowledgement = serde_json::from_str(&response.body).unwrap_or_default();
        info!(entries = batch.len(), "sync cycle complete");
        Ok(SyncOutcome::Pushed(SyncReport {
            pushed,
            acknowledgement,
        }))
    }
}
