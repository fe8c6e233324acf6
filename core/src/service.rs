use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{MacroItem, aggregate};
use crate::chat::{CHAT_NOTES, CHAT_TAG, ChatLog};
use crate::db::Database;
use crate::error::{LedgerError, Result};
use crate::models::{
    Category, Component, ComponentUsage, DayTotals, Entry, EntryPayload, Macros, MealPayload,
    NewComponent, NewEntry, UnsyncedCount,
};
use crate::seed::default_components;
use crate::sync::{SyncEngine, SyncOutcome, SyncTransport};

/// One line of a meal being built: which component and how much of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealItem {
    pub component_id: String,
    #[serde(default = "one")]
    pub multiplier: f64,
    /// Macros for the eaten quantity; replaces `default_macros * multiplier`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macro_override: Option<Macros>,
}

fn one() -> f64 {
    1.0
}

impl MealItem {
    pub fn new(component_id: impl Into<String>, multiplier: f64) -> Self {
        Self {
            component_id: component_id.into(),
            multiplier,
            macro_override: None,
        }
    }
}

/// Facade over the local store used by the CLI and any other front end.
pub struct VitalService {
    db: Database,
}

impl VitalService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    // --- Catalog ---

    /// Installs the built-in catalog on first launch. Safe to call on every start.
    pub fn seed_defaults(&self) -> Result<usize> {
        self.db.seed_if_empty(&default_components())
    }

    pub fn add_component(&self, def: &NewComponent) -> Result<Component> {
        self.db.add_component(def)
    }

    pub fn get_component(&self, id: &str) -> Result<Option<Component>> {
        self.db.get_component(id)
    }

    pub fn list_by_category(&self, category: Category) -> Result<Vec<Component>> {
        self.db.list_by_category(category)
    }

    pub fn search_components(
        &self,
        category: Option<Category>,
        query: &str,
    ) -> Result<Vec<Component>> {
        self.db.search_components(category, query)
    }

    // --- Meal builder ---

    fn resolve(&self, items: &[MealItem]) -> Result<Vec<Component>> {
        items
            .iter()
            .map(|item| {
                let m = item.multiplier;
                if !m.is_finite() || m <= 0.0 {
                    return Err(LedgerError::validation(format!(
                        "Portion multiplier must be positive (got {m})"
                    )));
                }
                self.db.get_component(&item.component_id)?.ok_or_else(|| {
                    LedgerError::validation(format!("Unknown component '{}'", item.component_id))
                })
            })
            .collect()
    }

    fn totals(items: &[MealItem], components: &[Component]) -> Macros {
        let lines: Vec<MacroItem<'_>> = items
            .iter()
            .zip(components)
            .map(|(item, component)| match item.macro_override {
                Some(over) => MacroItem::with_override(component, over),
                None => MacroItem::new(component, item.multiplier),
            })
            .collect();
        aggregate(&lines)
    }

    /// Live totals for a meal under construction. Writes nothing.
    pub fn preview_meal(&self, items: &[MealItem]) -> Result<Macros> {
        let components = self.resolve(items)?;
        Ok(Self::totals(items, &components))
    }

    /// Aggregates `items` against the current catalog and stores the result as
    /// a frozen snapshot. Later catalog edits never touch the stored totals.
    pub fn log_meal(
        &self,
        items: &[MealItem],
        notes: Option<String>,
    ) -> Result<Entry<MealPayload>> {
        if items.is_empty() {
            return Err(LedgerError::validation("A meal needs at least one component"));
        }
        let components = self.resolve(items)?;
        let computed_totals = Self::totals(items, &components);
        let payload = MealPayload {
            components: items
                .iter()
                .map(|item| ComponentUsage {
                    component_id: item.component_id.clone(),
                    portion_multiplier: item.multiplier,
                    macro_override: item.macro_override,
                })
                .collect(),
            computed_totals,
            notes: notes.filter(|n| !n.trim().is_empty()),
        };
        self.db.create_entry(NewEntry::new(payload))
    }

    /// Registers every component of a confirmed chat meal and logs the meal,
    /// all in one transaction.
    ///
    /// The assistant's macros already describe the eaten quantity, so each
    /// line is stored as an override with multiplier 1.
    pub fn record_chat_log(&self, log: &ChatLog) -> Result<Entry<MealPayload>> {
        log.validate()?;

        let entry = self.db.transaction(|db| {
            let mut items = Vec::with_capacity(log.components.len());
            for c in &log.components {
                let component = db.add_component(&NewComponent {
                    id: None,
                    name: c.name.trim().to_string(),
                    category: Category::Meal,
                    default_macros: c.macros,
                    default_portion: c.portion.clone(),
                    tags: vec![CHAT_TAG.to_string()],
                    is_user_defined: true,
                })?;
                items.push(MealItem {
                    component_id: component.id,
                    multiplier: 1.0,
                    macro_override: Some(c.macros),
                });
            }
            self.log_meal(&items, Some(CHAT_NOTES.to_string()))
        })?;

        let computed = entry.payload.computed_totals;
        if log.totals.is_some_and(|claimed| claimed != computed) {
            debug!(claimed = ?log.totals, ?computed, "chat totals differ from component sum");
        }
        info!(
            id = %entry.id,
            components = entry.payload.components.len(),
            "meal logged from chat"
        );
        Ok(entry)
    }

    // --- Ledger ---

    pub fn log_entry<P: EntryPayload>(&self, draft: NewEntry<P>) -> Result<Entry<P>> {
        self.db.create_entry(draft)
    }

    pub fn unsynced_counts(&self) -> Result<Vec<UnsyncedCount>> {
        self.db.unsynced_counts()
    }

    pub fn day_totals(&self, date: NaiveDate) -> Result<DayTotals> {
        self.db.day_totals(date)
    }

    // --- Sync ---

    pub async fn sync<T: SyncTransport>(
        &self,
        engine: &SyncEngine<T>,
        credential: Option<&str>,
    ) -> Result<SyncOutcome> {
        engine.run_cycle(&self.db, credential).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::chat::ChatComponent;
    use crate::models::{BeveragePayload, BeverageType, EntryKind};
    use crate::sync::{PushRequest, PushResponse, SyncConfig};

    fn close(a: Macros, b: Macros) -> bool {
        (a.protein - b.protein).abs() < 1e-9
            && (a.net_carbs - b.net_carbs).abs() < 1e-9
            && (a.fat - b.fat).abs() < 1e-9
            && (a.calories - b.calories).abs() < 1e-9
    }

    fn add(svc: &VitalService, name: &str, macros: Macros) -> Component {
        svc.add_component(&NewComponent::new(name, Category::ProteinBase, macros))
            .unwrap()
    }

    #[derive(Default)]
    struct RecordingRemote {
        bodies: Mutex<Vec<serde_json::Value>>,
    }

    impl SyncTransport for RecordingRemote {
        async fn push(&self, request: PushRequest) -> Result<PushResponse> {
            let body = serde_json::from_slice(&request.body)?;
            self.bodies.lock().unwrap().push(body);
            Ok(PushResponse {
                status: 200,
                body: r#"{"status":"synced"}"#.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_build_log_and_sync_meal() {
        let svc = VitalService::new_in_memory().unwrap();
        let a = add(&svc, "A", Macros::new(20.0, 2.0, 5.0, 150.0));
        let b = add(&svc, "B", Macros::new(5.0, 20.0, 2.0, 130.0));
        let items = [MealItem::new(&a.id, 1.0), MealItem::new(&b.id, 0.5)];

        let expected = Macros::new(22.5, 12.0, 6.0, 215.0);
        assert!(close(svc.preview_meal(&items).unwrap(), expected));

        let meal = svc.log_meal(&items, None).unwrap();
        assert!(close(meal.payload.computed_totals, expected));
        assert!(!meal.synced);
        assert_eq!(meal.payload.components[1].portion_multiplier, 0.5);

        let engine = SyncEngine::new(
            RecordingRemote::default(),
            SyncConfig::new(Some("https://remote.example".to_string())),
        );
        let outcome = svc.sync(&engine, Some("secret")).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Pushed(_)));

        let bodies = engine.transport().bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        let meals = bodies[0]["meals"].as_array().unwrap();
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0]["id"], meal.id.as_str());
        assert_eq!(meals[0]["computedTotals"]["calories"], 215.0);

        let stored: Entry<MealPayload> = svc.db().get_entry(&meal.id).unwrap().unwrap();
        assert!(stored.synced);
    }

    #[test]
    fn test_preview_writes_nothing() {
        let svc = VitalService::new_in_memory().unwrap();
        let a = add(&svc, "A", Macros::new(25.0, 2.0, 2.0, 120.0));

        let totals = svc.preview_meal(&[MealItem::new(&a.id, 2.0)]).unwrap();
        assert!(close(totals, Macros::new(50.0, 4.0, 4.0, 240.0)));
        assert_eq!(svc.db().count_unsynced(EntryKind::Meal).unwrap(), 0);
    }

    #[test]
    fn test_log_meal_rejects_bad_items() {
        let svc = VitalService::new_in_memory().unwrap();
        let a = add(&svc, "A", Macros::new(25.0, 2.0, 2.0, 120.0));

        let unknown = MealItem::new("0b7a1c52-9d0e-4e7b-8f5a-3c2d1e0f9a8b", 1.0);
        assert!(matches!(
            svc.log_meal(&[unknown], None).unwrap_err(),
            LedgerError::Validation(_)
        ));
        assert!(svc.log_meal(&[MealItem::new(&a.id, -1.0)], None).is_err());
        assert!(svc.log_meal(&[MealItem::new(&a.id, 0.0)], None).is_err());
        assert!(svc.log_meal(&[], None).is_err());
        assert_eq!(svc.db().count_unsynced(EntryKind::Meal).unwrap(), 0);
    }

    #[test]
    fn test_override_wins_over_multiplier() {
        let svc = VitalService::new_in_memory().unwrap();
        let a = add(&svc, "A", Macros::new(25.0, 2.0, 2.0, 120.0));
        let item = MealItem {
            component_id: a.id.clone(),
            multiplier: 3.0,
            macro_override: Some(Macros::new(10.0, 1.0, 1.0, 60.0)),
        };
        let meal = svc.log_meal(&[item], Some("  ".to_string())).unwrap();
        assert_eq!(meal.payload.computed_totals, Macros::new(10.0, 1.0, 1.0, 60.0));
        assert_eq!(meal.payload.notes, None);
    }

    #[test]
    fn test_record_chat_log() {
        let svc = VitalService::new_in_memory().unwrap();
        let log = ChatLog {
            components: vec![
                ChatComponent {
                    name: "Fried Egg".to_string(),
                    portion: Some("2 large".to_string()),
                    macros: Macros::new(12.0, 1.0, 14.0, 180.0),
                },
                ChatComponent {
                    name: "Keto Toast".to_string(),
                    portion: None,
                    macros: Macros::new(6.0, 3.0, 4.0, 90.0),
                },
            ],
            totals: Some(Macros::new(18.0, 4.0, 18.0, 270.0)),
        };

        let meal = svc.record_chat_log(&log).unwrap();
        assert_eq!(meal.payload.notes.as_deref(), Some(CHAT_NOTES));
        assert_eq!(meal.payload.computed_totals, Macros::new(18.0, 4.0, 18.0, 270.0));
        assert_eq!(meal.payload.components.len(), 2);

        for usage in &meal.payload.components {
            assert_eq!(usage.portion_multiplier, 1.0);
            assert!(usage.macro_override.is_some());
            let component = svc.get_component(&usage.component_id).unwrap().unwrap();
            assert_eq!(component.category, Category::Meal);
            assert!(component.is_user_defined);
            assert_eq!(component.tags, vec![CHAT_TAG.to_string()]);
        }
        let egg = svc.get_component(&meal.payload.components[0].component_id).unwrap().unwrap();
        assert_eq!(egg.default_portion.as_deref(), Some("2 large"));
    }

    #[test]
    fn test_record_chat_log_rejects_empty() {
        let svc = VitalService::new_in_memory().unwrap();
        let log = ChatLog {
            components: vec![],
            totals: None,
        };
        assert!(svc.record_chat_log(&log).is_err());
        assert_eq!(svc.db().count_unsynced(EntryKind::Meal).unwrap(), 0);
    }

    #[test]
    fn test_record_chat_log_is_all_or_nothing() {
        let svc = VitalService::new_in_memory().unwrap();
        let huge = |name: &str| ChatComponent {
            name: name.to_string(),
            portion: None,
            macros: Macros::new(1.0, 1.0, 1.0, f64::MAX),
        };
        // Each line is valid on its own, but the summed calories overflow.
        let log = ChatLog {
            components: vec![huge("Feast"), huge("Second Feast")],
            totals: None,
        };

        assert!(matches!(
            svc.record_chat_log(&log).unwrap_err(),
            LedgerError::Validation(_)
        ));
        assert_eq!(svc.db().count_components().unwrap(), 0);
        assert_eq!(svc.db().count_unsynced(EntryKind::Meal).unwrap(), 0);
    }

    #[test]
    fn test_seed_defaults_once() {
        let svc = VitalService::new_in_memory().unwrap();
        assert_eq!(svc.seed_defaults().unwrap(), 24);
        assert_eq!(svc.seed_defaults().unwrap(), 0);
        assert_eq!(svc.db().count_components().unwrap(), 24);
        assert!(!svc.list_by_category(Category::Dessert).unwrap().is_empty());
    }

    #[test]
    fn test_log_entry_and_status() {
        let svc = VitalService::new_in_memory().unwrap();
        svc.log_entry(NewEntry::new(BeveragePayload {
            beverage_type: BeverageType::Water,
            volume_ml: Some(500.0),
        }))
        .unwrap();

        let counts = svc.unsynced_counts().unwrap();
        let beverages = counts.iter().find(|c| c.kind == EntryKind::Beverage).unwrap();
        assert_eq!(beverages.count, 1);
        assert!(
            counts
                .iter()
                .filter(|c| c.kind != EntryKind::Beverage)
                .all(|c| c.count == 0)
        );
    }
}
