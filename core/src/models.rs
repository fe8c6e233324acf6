use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerError, Result};

// --- Macro totals ---

/// The protein / net-carbs / fat / calories quadruple.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Macros {
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub net_carbs: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default)]
    pub calories: f64,
}

impl Macros {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(protein: f64, net_carbs: f64, fat: f64, calories: f64) -> Self {
        Self {
            protein,
            net_carbs,
            fat,
            calories,
        }
    }

    /// Element-wise scalar multiply.
    #[must_use]
    pub fn scale(self, factor: f64) -> Self {
        Self {
            protein: self.protein * factor,
            net_carbs: self.net_carbs * factor,
            fat: self.fat * factor,
            calories: self.calories * factor,
        }
    }

    pub fn validate(&self, what: &str) -> Result<()> {
        for (field, value) in [
            ("protein", self.protein),
            ("netCarbs", self.net_carbs),
            ("fat", self.fat),
            ("calories", self.calories),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(LedgerError::validation(format!(
                    "{what}: {field} must be a non-negative number (got {value})"
                )));
            }
        }
        Ok(())
    }
}

impl Add for Macros {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            protein: self.protein + rhs.protein,
            net_carbs: self.net_carbs + rhs.net_carbs,
            fat: self.fat + rhs.fat,
            calories: self.calories + rhs.calories,
        }
    }
}

impl AddAssign for Macros {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for Macros {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

// --- Components ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    ProteinBase,
    VegBase,
    Wrap,
    Soup,
    Dessert,
    Beverage,
    AddOn,
    Meal,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::ProteinBase,
        Category::VegBase,
        Category::Wrap,
        Category::Soup,
        Category::Dessert,
        Category::Beverage,
        Category::AddOn,
        Category::Meal,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::ProteinBase => "ProteinBase",
            Category::VegBase => "VegBase",
            Category::Wrap => "Wrap",
            Category::Soup => "Soup",
            Category::Dessert => "Dessert",
            Category::Beverage => "Beverage",
            Category::AddOn => "AddOn",
            Category::Meal => "Meal",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = LedgerError;

    /// Accepts the canonical name in any case, with or without `-`/`_`
    /// separators ("ProteinBase", "protein-base", "protein_base").
    fn from_str(s: &str) -> Result<Self> {
        parse_variant(s, &Category::ALL, Category::as_str, "category")
    }
}

/// Case- and separator-insensitive lookup of `s` among `all` by canonical name.
fn parse_variant<T: Copy>(
    s: &str,
    all: &[T],
    name: fn(T) -> &'static str,
    what: &str,
) -> Result<T> {
    let squash = |v: &str| -> String {
        v.chars()
            .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
            .collect::<String>()
            .to_lowercase()
    };
    let wanted = squash(s);
    all.iter()
        .copied()
        .find(|v| squash(name(*v)) == wanted)
        .ok_or_else(|| {
            let valid: Vec<&str> = all.iter().map(|v| name(*v)).collect();
            LedgerError::validation(format!(
                "Invalid {what} '{s}'. Must be one of: {}",
                valid.join(", ")
            ))
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub default_macros: Macros,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub default_portion: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_user_defined: bool,
}

/// A component definition as supplied by a caller; `id` is assigned when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComponent {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub default_macros: Macros,
    #[serde(default)]
    pub default_portion: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_user_defined: bool,
}

impl NewComponent {
    pub fn new(name: impl Into<String>, category: Category, default_macros: Macros) -> Self {
        Self {
            id: None,
            name: name.into(),
            category,
            default_macros,
            default_portion: None,
            tags: Vec::new(),
            is_user_defined: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LedgerError::validation("Component name must not be empty"));
        }
        if let Some(id) = &self.id {
            validate_uuid(id, "component id")?;
        }
        self.default_macros
            .validate(&format!("component '{}'", self.name))
    }
}

// --- Entry kinds ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Meal,
    Exercise,
    Metric,
    Fasting,
    Beverage,
}

impl EntryKind {
    pub const ALL: [EntryKind; 5] = [
        EntryKind::Meal,
        EntryKind::Exercise,
        EntryKind::Metric,
        EntryKind::Fasting,
        EntryKind::Beverage,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EntryKind::Meal => "meal",
            EntryKind::Exercise => "exercise",
            EntryKind::Metric => "metric",
            EntryKind::Fasting => "fasting",
            EntryKind::Beverage => "beverage",
        }
    }

    /// Backing table, also the collection name used in the sync body.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            EntryKind::Meal => "meals",
            EntryKind::Exercise => "exercises",
            EntryKind::Metric => "metrics",
            EntryKind::Fasting => "fasting",
            EntryKind::Beverage => "beverages",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        EntryKind::ALL
            .into_iter()
            .find(|k| k.as_str() == lower || k.table() == lower)
            .ok_or_else(|| LedgerError::validation(format!("Unknown entry kind '{s}'")))
    }
}

/// Kind-specific body of a ledger entry.
pub trait EntryPayload: Serialize + DeserializeOwned {
    const KIND: EntryKind;

    /// Validates the payload and fills derived fields before it is persisted.
    fn prepare(&mut self) -> Result<()>;
}

/// A persisted ledger record. Everything except `synced` is frozen at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<P> {
    pub id: String,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: P,
    pub synced: bool,
}

/// Input to `Database::create_entry`. Missing `id`/`ts` are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewEntry<P> {
    pub id: Option<String>,
    pub ts: Option<String>,
    pub payload: P,
}

impl<P> NewEntry<P> {
    pub fn new(payload: P) -> Self {
        Self {
            id: None,
            ts: None,
            payload,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn at(mut self, ts: impl Into<String>) -> Self {
        self.ts = Some(ts.into());
        self
    }
}

// --- Meals ---

fn default_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentUsage {
    pub component_id: String,
    #[serde(default = "default_multiplier")]
    pub portion_multiplier: f64,
    /// Macros already scaled upstream; the multiplier is not applied again.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub macro_override: Option<Macros>,
}

impl ComponentUsage {
    pub fn new(component_id: impl Into<String>, portion_multiplier: f64) -> Self {
        Self {
            component_id: component_id.into(),
            portion_multiplier,
            macro_override: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPayload {
    pub components: Vec<ComponentUsage>,
    pub computed_totals: Macros,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<String>,
}

impl EntryPayload for MealPayload {
    const KIND: EntryKind = EntryKind::Meal;

    fn prepare(&mut self) -> Result<()> {
        for usage in &self.components {
            validate_uuid(&usage.component_id, "component reference")?;
            let m = usage.portion_multiplier;
            if !m.is_finite() || m <= 0.0 {
                return Err(LedgerError::validation(format!(
                    "Portion multiplier must be positive (got {m} for component {})",
                    usage.component_id
                )));
            }
            if let Some(over) = &usage.macro_override {
                over.validate(&format!("macro override for {}", usage.component_id))?;
            }
        }
        self.computed_totals.validate("computed totals")
    }
}

// --- Exercise ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExerciseMode {
    Strength,
    Cardio,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardioType {
    Walk,
    Pickleball,
    Golf,
    Jogging,
    BeepTest,
    Cycling,
    Swimming,
    Other,
}

impl ExerciseMode {
    pub const ALL: [ExerciseMode; 3] = [
        ExerciseMode::Strength,
        ExerciseMode::Cardio,
        ExerciseMode::Mixed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ExerciseMode::Strength => "Strength",
            ExerciseMode::Cardio => "Cardio",
            ExerciseMode::Mixed => "Mixed",
        }
    }
}

impl FromStr for ExerciseMode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        parse_variant(s, &ExerciseMode::ALL, ExerciseMode::as_str, "exercise mode")
    }
}

impl CardioType {
    pub const ALL: [CardioType; 8] = [
        CardioType::Walk,
        CardioType::Pickleball,
        CardioType::Golf,
        CardioType::Jogging,
        CardioType::BeepTest,
        CardioType::Cycling,
        CardioType::Swimming,
        CardioType::Other,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CardioType::Walk => "Walk",
            CardioType::Pickleball => "Pickleball",
            CardioType::Golf => "Golf",
            CardioType::Jogging => "Jogging",
            CardioType::BeepTest => "BeepTest",
            CardioType::Cycling => "Cycling",
            CardioType::Swimming => "Swimming",
            CardioType::Other => "Other",
        }
    }
}

impl FromStr for CardioType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        parse_variant(s, &CardioType::ALL, CardioType::as_str, "cardio type")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSet {
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExercisePayload {
    pub mode: ExerciseMode,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub routine_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub exercises: Vec<ExerciseSet>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cardio_type: Option<CardioType>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub beep_test_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<String>,
}

impl ExercisePayload {
    #[must_use]
    pub fn new(mode: ExerciseMode) -> Self {
        Self {
            mode,
            routine_id: None,
            exercises: Vec::new(),
            cardio_type: None,
            minutes: None,
            distance_km: None,
            beep_test_level: None,
            steps: None,
            notes: None,
        }
    }
}

impl EntryPayload for ExercisePayload {
    const KIND: EntryKind = EntryKind::Exercise;

    fn prepare(&mut self) -> Result<()> {
        for set in &self.exercises {
            if set.name.trim().is_empty() {
                return Err(LedgerError::validation("Exercise name must not be empty"));
            }
            non_negative(set.weight_kg, "weightKg")?;
        }
        non_negative(self.minutes, "minutes")?;
        non_negative(self.distance_km, "distanceKm")
    }
}

// --- Metrics ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPayload {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub waist_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sleep_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stress_level: Option<u8>,
}

impl EntryPayload for MetricPayload {
    const KIND: EntryKind = EntryKind::Metric;

    fn prepare(&mut self) -> Result<()> {
        if self.weight_kg.is_none()
            && self.waist_cm.is_none()
            && self.sleep_hours.is_none()
            && self.stress_level.is_none()
        {
            return Err(LedgerError::validation(
                "Metric entry needs at least one measurement",
            ));
        }
        non_negative(self.weight_kg, "weightKg")?;
        non_negative(self.waist_cm, "waistCm")?;
        non_negative(self.sleep_hours, "sleepHours")?;
        if let Some(sleep) = self.sleep_hours {
            if sleep > 24.0 {
                return Err(LedgerError::validation(format!(
                    "sleepHours must be between 0 and 24 (got {sleep})"
                )));
            }
        }
        if let Some(stress) = self.stress_level {
            if !(1..=10).contains(&stress) {
                return Err(LedgerError::validation(format!(
                    "stressLevel must be between 1 and 10 (got {stress})"
                )));
            }
        }
        Ok(())
    }
}

// --- Fasting ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastingPayload {
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_hours: Option<f64>,
}

impl EntryPayload for FastingPayload {
    const KIND: EntryKind = EntryKind::Fasting;

    #[allow(clippy::cast_precision_loss)]
    fn prepare(&mut self) -> Result<()> {
        non_negative(self.duration_hours, "durationHours")?;
        if let Some(end) = self.end_time {
            if end < self.start_time {
                return Err(LedgerError::validation(
                    "Fast endTime must not precede startTime",
                ));
            }
            if self.duration_hours.is_none() {
                let secs = (end - self.start_time).num_seconds();
                self.duration_hours = Some(secs as f64 / 3600.0);
            }
        }
        Ok(())
    }
}

// --- Beverages ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeverageType {
    BlackCoffee,
    DietCoke,
    SaltedLimeSoda,
    Water,
    Other,
}

impl BeverageType {
    pub const ALL: [BeverageType; 5] = [
        BeverageType::BlackCoffee,
        BeverageType::DietCoke,
        BeverageType::SaltedLimeSoda,
        BeverageType::Water,
        BeverageType::Other,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            BeverageType::BlackCoffee => "BlackCoffee",
            BeverageType::DietCoke => "DietCoke",
            BeverageType::SaltedLimeSoda => "SaltedLimeSoda",
            BeverageType::Water => "Water",
            BeverageType::Other => "Other",
        }
    }
}

impl FromStr for BeverageType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        parse_variant(s, &BeverageType::ALL, BeverageType::as_str, "beverage type")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeveragePayload {
    #[serde(rename = "type")]
    pub beverage_type: BeverageType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub volume_ml: Option<f64>,
}

impl EntryPayload for BeveragePayload {
    const KIND: EntryKind = EntryKind::Beverage;

    fn prepare(&mut self) -> Result<()> {
        non_negative(self.volume_ml, "volumeMl")
    }
}

// --- Query results ---

/// Sum of the frozen meal snapshots logged on one local calendar date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayTotals {
    pub date: String,
    pub meal_count: usize,
    pub totals: Macros,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnsyncedCount {
    pub kind: EntryKind,
    pub count: i64,
}

// --- Validation helpers ---

pub fn validate_uuid(value: &str, what: &str) -> Result<()> {
    Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| LedgerError::validation(format!("Malformed {what} '{value}'")))
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::validation(format!("Malformed timestamp '{value}': {e}")))
}

/// ISO-8601 instant with millisecond precision, e.g. `2024-06-15T12:30:00.000Z`.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn non_negative(value: Option<f64>, field: &str) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(LedgerError::validation(format!(
            "{field} must be a non-negative number (got {v})"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPONENT_ID: &str = "7d3c6f1e-2a0b-4c55-9f4e-1b2a3c4d5e6f";

    #[test]
    fn test_macros_scale_and_sum() {
        let a = Macros::new(20.0, 2.0, 5.0, 150.0);
        let b = Macros::new(5.0, 20.0, 2.0, 130.0).scale(0.5);
        let total: Macros = [a, b].into_iter().sum();
        assert_eq!(total, Macros::new(22.5, 12.0, 6.0, 215.0));
    }

    #[test]
    fn test_macros_missing_fields_default_to_zero() {
        let m: Macros = serde_json::from_str(r#"{"protein": 12}"#).unwrap();
        assert_eq!(m, Macros::new(12.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_macros_validate_rejects_negative() {
        let err = Macros::new(1.0, -1.0, 0.0, 0.0).validate("x").unwrap_err();
        assert!(err.to_string().contains("netCarbs"));
        assert!(Macros::new(f64::NAN, 0.0, 0.0, 0.0).validate("x").is_err());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("ProteinBase".parse::<Category>().unwrap(), Category::ProteinBase);
        assert_eq!("protein-base".parse::<Category>().unwrap(), Category::ProteinBase);
        assert_eq!("add_on".parse::<Category>().unwrap(), Category::AddOn);
        assert_eq!("SOUP".parse::<Category>().unwrap(), Category::Soup);
        let err = "Snack".parse::<Category>().unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_activity_enums_parse() {
        assert_eq!("cardio".parse::<ExerciseMode>().unwrap(), ExerciseMode::Cardio);
        assert_eq!("beep-test".parse::<CardioType>().unwrap(), CardioType::BeepTest);
        assert_eq!(
            "salted_lime_soda".parse::<BeverageType>().unwrap(),
            BeverageType::SaltedLimeSoda
        );
        let err = "Tea".parse::<BeverageType>().unwrap_err();
        assert!(err.to_string().contains("beverage type"));
    }

    #[test]
    fn test_category_rejected_on_deserialize() {
        let json = r#"{"name": "Cake", "category": "Snack"}"#;
        assert!(serde_json::from_str::<NewComponent>(json).is_err());
    }

    #[test]
    fn test_new_component_validate() {
        let ok = NewComponent::new("Tofu", Category::ProteinBase, Macros::new(24.0, 6.0, 14.0, 260.0));
        assert!(ok.validate().is_ok());

        let blank = NewComponent::new("  ", Category::Soup, Macros::ZERO);
        assert!(blank.validate().is_err());

        let mut bad_id = ok.clone();
        bad_id.id = Some("not-a-uuid".to_string());
        assert!(bad_id.validate().is_err());
    }

    #[test]
    fn test_entry_kind_parse() {
        assert_eq!("meal".parse::<EntryKind>().unwrap(), EntryKind::Meal);
        assert_eq!("beverages".parse::<EntryKind>().unwrap(), EntryKind::Beverage);
        assert!("sleep".parse::<EntryKind>().is_err());
    }

    #[test]
    fn test_meal_payload_rejects_bad_multiplier() {
        let mut payload = MealPayload {
            components: vec![ComponentUsage::new(COMPONENT_ID, -1.0)],
            computed_totals: Macros::ZERO,
            notes: None,
        };
        let err = payload.prepare().unwrap_err();
        assert!(err.to_string().contains("Portion multiplier"));

        payload.components[0].portion_multiplier = 0.0;
        assert!(payload.prepare().is_err());

        payload.components[0].portion_multiplier = 0.5;
        assert!(payload.prepare().is_ok());
    }

    #[test]
    fn test_meal_payload_rejects_malformed_reference() {
        let mut payload = MealPayload {
            components: vec![ComponentUsage::new("shake", 1.0)],
            computed_totals: Macros::ZERO,
            notes: None,
        };
        let err = payload.prepare().unwrap_err();
        assert!(err.to_string().contains("component reference"));
    }

    #[test]
    fn test_usage_multiplier_defaults_to_one() {
        let json = format!(r#"{{"componentId": "{COMPONENT_ID}"}}"#);
        let usage: ComponentUsage = serde_json::from_str(&json).unwrap();
        assert_eq!(usage.portion_multiplier, 1.0);
        assert!(usage.macro_override.is_none());
    }

    #[test]
    fn test_meal_entry_wire_format() {
        let entry = Entry {
            id: "e1".to_string(),
            ts: parse_timestamp("2024-06-15T12:30:00Z").unwrap(),
            payload: MealPayload {
                components: vec![ComponentUsage::new(COMPONENT_ID, 2.0)],
                computed_totals: Macros::new(50.0, 4.0, 4.0, 240.0),
                notes: None,
            },
            synced: false,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["id"], "e1");
        assert_eq!(json["synced"], false);
        assert_eq!(json["components"][0]["componentId"], COMPONENT_ID);
        assert_eq!(json["components"][0]["portionMultiplier"], 2.0);
        assert_eq!(json["computedTotals"]["netCarbs"], 4.0);
        assert!(json.get("notes").is_none());
        assert!(json.get("payload").is_none());

        let back: Entry<MealPayload> = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_beverage_type_field_name() {
        let payload = BeveragePayload {
            beverage_type: BeverageType::DietCoke,
            volume_ml: Some(330.0),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "DietCoke");
        assert_eq!(json["volumeMl"], 330.0);
    }

    #[test]
    fn test_metric_requires_measurement_and_ranges() {
        assert!(MetricPayload::default().prepare().is_err());

        let mut stressed = MetricPayload {
            stress_level: Some(11),
            ..MetricPayload::default()
        };
        assert!(stressed.prepare().is_err());
        stressed.stress_level = Some(4);
        assert!(stressed.prepare().is_ok());

        let mut sleepy = MetricPayload {
            sleep_hours: Some(25.0),
            ..MetricPayload::default()
        };
        assert!(sleepy.prepare().is_err());
    }

    #[test]
    fn test_fasting_duration_derived_from_window() {
        let mut fast = FastingPayload {
            start_time: parse_timestamp("2024-06-14T20:00:00Z").unwrap(),
            end_time: Some(parse_timestamp("2024-06-15T12:30:00Z").unwrap()),
            duration_hours: None,
        };
        fast.prepare().unwrap();
        assert_eq!(fast.duration_hours, Some(16.5));
    }

    #[test]
    fn test_fasting_end_before_start_rejected() {
        let mut fast = FastingPayload {
            start_time: parse_timestamp("2024-06-15T12:00:00Z").unwrap(),
            end_time: Some(parse_timestamp("2024-06-15T08:00:00Z").unwrap()),
            duration_hours: None,
        };
        assert!(fast.prepare().is_err());
    }

    #[test]
    fn test_ongoing_fast_has_no_duration() {
        let mut fast = FastingPayload {
            start_time: parse_timestamp("2024-06-15T12:00:00Z").unwrap(),
            end_time: None,
            duration_hours: None,
        };
        fast.prepare().unwrap();
        assert!(fast.duration_hours.is_none());
    }

    #[test]
    fn test_exercise_validation() {
        let mut workout = ExercisePayload::new(ExerciseMode::Strength);
        workout.exercises.push(ExerciseSet {
            name: "Squat".to_string(),
            sets: 3,
            reps: 5,
            weight_kg: Some(-20.0),
            notes: None,
        });
        assert!(workout.prepare().is_err());
        workout.exercises[0].weight_kg = Some(80.0);
        assert!(workout.prepare().is_ok());

        let mut cardio = ExercisePayload::new(ExerciseMode::Cardio);
        cardio.cardio_type = Some(CardioType::Walk);
        cardio.minutes = Some(-5.0);
        assert!(cardio.prepare().is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("2024-06-15T14:30:00+02:00").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-06-15T12:30:00.000Z");
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
