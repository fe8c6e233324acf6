use anyhow::{Result, bail};

use ketovital_core::service::VitalService;

use crate::config::RemoteSettings;

use super::helpers::{build_items, format_macros};
use super::sync::try_auto_sync;

pub(crate) fn cmd_meal_preview(svc: &VitalService, items: &[String], json: bool) -> Result<()> {
    let items = build_items(svc, items)?;
    let totals = svc.preview_meal(&items)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&totals)?);
    } else {
        println!("Preview: {}", format_macros(&totals));
    }
    Ok(())
}

pub(crate) async fn cmd_meal_log(
    svc: &VitalService,
    settings: &RemoteSettings,
    items: &[String],
    notes: Option<String>,
    json: bool,
) -> Result<()> {
    if items.is_empty() {
        bail!("Give at least one component, e.g. `ketovital meal log \"Black Coffee\" \"Tofu (200g)=0.5\"`");
    }
    let items = build_items(svc, items)?;
    let entry = svc.log_meal(&items, notes)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!(
            "Logged meal ({} components): {}",
            entry.payload.components.len(),
            format_macros(&entry.payload.computed_totals)
        );
        println!("  id: {}", entry.id);
    }

    try_auto_sync(svc, settings, json).await;
    Ok(())
}
