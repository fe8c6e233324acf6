use anyhow::Result;
use std::process;

use ketovital_core::db::Database;

use crate::config::{KNOWN_SETTINGS, normalize_setting};

pub(crate) fn cmd_config_set(db: &Database, key: &str, value: &str, json: bool) -> Result<()> {
    let value = normalize_setting(key, value)?;
    db.set_setting(key, &value)?;

    if json {
        println!("{}", serde_json::json!({ "key": key, "value": value }));
    } else {
        println!("{key} = {value}");
    }
    Ok(())
}

pub(crate) fn cmd_config_get(db: &Database, key: &str, json: bool) -> Result<()> {
    let value = db.get_setting(key)?;

    if json {
        println!("{}", serde_json::json!({ "key": key, "value": value }));
        return Ok(());
    }

    if let Some(v) = value {
        println!("{v}");
    } else {
        eprintln!("{key} is not set");
        process::exit(2);
    }
    Ok(())
}

pub(crate) fn cmd_config_unset(db: &Database, key: &str, json: bool) -> Result<()> {
    let removed = db.delete_setting(key)?;

    if json {
        println!("{}", serde_json::json!({ "key": key, "removed": removed }));
    } else if removed {
        println!("Unset {key}");
    } else {
        println!("{key} was not set");
    }
    Ok(())
}

pub(crate) fn cmd_config_show(db: &Database, json: bool) -> Result<()> {
    let settings = db.list_settings()?;

    if json {
        let map: serde_json::Map<String, serde_json::Value> = settings
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    for key in KNOWN_SETTINGS {
        let value = settings
            .iter()
            .find(|(k, _)| k == key)
            .map_or("(unset)", |(_, v)| v.as_str());
        println!("{key} = {value}");
    }
    Ok(())
}
