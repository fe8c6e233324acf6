use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use ketovital_core::service::VitalService;

use super::helpers::{format_macros, parse_date};

pub(crate) fn cmd_summary(svc: &VitalService, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let summary = svc.day_totals(date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.meal_count == 0 {
        let date = &summary.date;
        eprintln!("No meals logged for {date}");
        process::exit(2);
    }

    let date = &summary.date;
    let count = summary.meal_count;
    println!("=== {date} ===\n");
    println!("  Meals: {count}");
    println!("  TOTAL: {}", format_macros(&summary.totals));
    Ok(())
}

pub(crate) fn cmd_status(svc: &VitalService, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct StatusRow {
        #[tabled(rename = "Collection")]
        kind: String,
        #[tabled(rename = "Unsynced")]
        count: i64,
    }

    let counts = svc.unsynced_counts()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }

    let total: i64 = counts.iter().map(|c| c.count).sum();
    let rows: Vec<StatusRow> = counts
        .iter()
        .map(|c| StatusRow {
            kind: c.kind.table().to_string(),
            count: c.count,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    if total == 0 {
        println!("Everything is synced.");
    } else {
        println!("{total} entries waiting for the next sync.");
    }
    Ok(())
}
