use chrono::Local;
use rusqlite::{Connection, params};
use tracing::{debug, info};
use uuid::Uuid;

use super::{Database, conversion_error, duplicate_id};
use crate::error::Result;
use crate::models::{Category, Component, Macros, NewComponent};
use crate::seed::stable_component_id;

const COMPONENT_COLUMNS: &str = "id, name, category, protein, net_carbs, fat, calories, default_portion, tags, is_user_defined";

impl Database {
    // Expects columns in COMPONENT_COLUMNS order.
    fn component_from_row(row: &rusqlite::Row) -> rusqlite::Result<Component> {
        let category: String = row.get(2)?;
        let category = category
            .parse::<Category>()
            .map_err(|e| conversion_error(2, e))?;
        let tags: String = row.get(8)?;
        let tags: Vec<String> = serde_json::from_str(&tags).map_err(|e| conversion_error(8, e))?;
        Ok(Component {
            id: row.get(0)?,
            name: row.get(1)?,
            category,
            default_macros: Macros::new(row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?),
            default_portion: row.get(7)?,
            tags,
            is_user_defined: row.get(9)?,
        })
    }

    fn insert_component(
        conn: &Connection,
        id: &str,
        def: &NewComponent,
        or_ignore: bool,
    ) -> Result<usize> {
        let verb = if or_ignore { "INSERT OR IGNORE" } else { "INSERT" };
        let tags = serde_json::to_string(&def.tags)?;
        let rows = conn
            .execute(
                &format!(
                    "{verb} INTO components ({COMPONENT_COLUMNS}, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    id,
                    def.name.trim(),
                    def.category.as_str(),
                    def.default_macros.protein,
                    def.default_macros.net_carbs,
                    def.default_macros.fat,
                    def.default_macros.calories,
                    def.default_portion,
                    tags,
                    def.is_user_defined,
                    Local::now().to_rfc3339(),
                ],
            )
            .map_err(|e| duplicate_id(e, "Component", id))?;
        Ok(rows)
    }

    /// Validates and persists a component, assigning a fresh id when none is given.
    pub fn add_component(&self, def: &NewComponent) -> Result<Component> {
        def.validate()?;
        let id = def
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self::insert_component(&self.conn, &id, def, false)?;
        debug!(id = %id, name = %def.name, category = %def.category, "component added");
        Ok(Component {
            id,
            name: def.name.trim().to_string(),
            category: def.category,
            default_macros: def.default_macros,
            default_portion: def.default_portion.clone(),
            tags: def.tags.clone(),
            is_user_defined: def.is_user_defined,
        })
    }

    pub fn get_component(&self, id: &str) -> Result<Option<Component>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COMPONENT_COLUMNS} FROM components WHERE id = ?1"))?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::component_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// All components in a category. Callers must not rely on the order.
    pub fn list_by_category(&self, category: Category) -> Result<Vec<Component>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPONENT_COLUMNS} FROM components WHERE category = ?1 ORDER BY name"
        ))?;
        let components = stmt
            .query_map(params![category.as_str()], Self::component_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(components)
    }

    pub fn list_components(&self) -> Result<Vec<Component>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPONENT_COLUMNS} FROM components ORDER BY category, name"
        ))?;
        let components = stmt
            .query_map([], Self::component_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(components)
    }

    pub fn list_user_defined(&self) -> Result<Vec<Component>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPONENT_COLUMNS} FROM components WHERE is_user_defined = 1 ORDER BY name"
        ))?;
        let components = stmt
            .query_map([], Self::component_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(components)
    }

    /// Case-insensitive substring match on name, optionally within one category.
    pub fn search_components(
        &self,
        category: Option<Category>,
        query: &str,
    ) -> Result<Vec<Component>> {
        let escaped = query
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPONENT_COLUMNS} FROM components
             WHERE name LIKE ?1 ESCAPE '\\' AND (?2 IS NULL OR category = ?2)
             ORDER BY name LIMIT 50"
        ))?;
        let components = stmt
            .query_map(
                params![pattern, category.map(Category::as_str)],
                Self::component_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(components)
    }

    pub fn count_components(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM components", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Installs `defaults` when the catalog is empty; a no-op otherwise.
    ///
    /// Runs in one transaction and keys each default by its name-derived id with
    /// insert-or-ignore, so two first launches racing each other still end with
    /// a single copy. Returns how many components were inserted.
    pub fn seed_if_empty(&self, defaults: &[NewComponent]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let count: i64 = tx.query_row("SELECT COUNT(*) FROM components", [], |row| row.get(0))?;
        if count > 0 {
            debug!(count, "catalog already populated, skipping seed");
            return Ok(0);
        }

        let mut inserted = 0;
        for def in defaults {
            def.validate()?;
            let id = def
                .id
                .clone()
                .unwrap_or_else(|| stable_component_id(&def.name));
            inserted += Self::insert_component(&tx, &id, def, true)?;
        }
        tx.commit()?;

        info!(inserted, "seeded default component catalog");
        Ok(inserted)
    }
}
