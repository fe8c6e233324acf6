//! Ketovital core library
//!
//! Component catalog, macro aggregation, the append-only local ledger, and
//! the push-only sync engine shared by every ketovital front end.

pub mod aggregate;
pub mod chat;
pub mod db;
pub mod error;
pub mod models;
pub mod seed;
pub mod service;
pub mod sync;

pub use aggregate::{MacroItem, aggregate};
pub use chat::{ChatComponent, ChatLog, ChatMessage, ChatReply, ChatRequest, ChatRole};
pub use db::Database;
pub use error::{LedgerError, Result};
pub use models::{
    BeveragePayload, BeverageType, CardioType, Category, Component, ComponentUsage, DayTotals,
    Entry, EntryKind, EntryPayload, ExerciseMode, ExercisePayload, ExerciseSet, FastingPayload,
    Macros, MealPayload, MetricPayload, NewComponent, NewEntry, UnsyncedCount,
};
pub use service::{MealItem, VitalService};
pub use sync::{
    PushRequest, PushResponse, SyncBatch, SyncConfig, SyncEngine, SyncOutcome, SyncReport,
    SyncState, SyncTransport,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
