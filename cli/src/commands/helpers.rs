use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use ketovital_core::models::{Component, Macros};
use ketovital_core::service::{MealItem, VitalService};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Splits `"Tofu (200g)=0.5"` into the component reference and its multiplier.
/// Without `=`, the multiplier is 1.
pub(crate) fn parse_portion(spec: &str) -> Result<(&str, f64)> {
    let spec = spec.trim();
    let Some((reference, multiplier)) = spec.rsplit_once('=') else {
        return Ok((spec, 1.0));
    };
    let multiplier: f64 = multiplier
        .trim()
        .parse()
        .with_context(|| format!("Invalid multiplier in '{spec}'. Use NAME=1.5"))?;
    if !multiplier.is_finite() || multiplier <= 0.0 {
        bail!("Multiplier must be greater than 0 in '{spec}'");
    }
    let reference = reference.trim();
    if reference.is_empty() {
        bail!("Missing component in '{spec}'");
    }
    Ok((reference, multiplier))
}

/// Finds a component by id, exact name, or a unique partial name match.
pub(crate) fn resolve_component(svc: &VitalService, reference: &str) -> Result<Component> {
    if let Some(c) = svc.get_component(reference)? {
        return Ok(c);
    }

    let matches = svc.search_components(None, reference)?;
    if let Some(exact) = matches
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(reference))
    {
        return Ok(exact.clone());
    }
    match matches.len() {
        0 => bail!("No component found for '{reference}'"),
        1 => Ok(matches.into_iter().next().context("No component found")?),
        n => {
            let names: Vec<&str> = matches.iter().map(|c| c.name.as_str()).collect();
            bail!(
                "'{reference}' matches {n} components: {}. Be more specific or use the id",
                names.join(", ")
            )
        }
    }
}

pub(crate) fn build_items(svc: &VitalService, specs: &[String]) -> Result<Vec<MealItem>> {
    specs
        .iter()
        .map(|spec| {
            let (reference, multiplier) = parse_portion(spec)?;
            let component = resolve_component(svc, reference)?;
            Ok(MealItem::new(component.id, multiplier))
        })
        .collect()
}

pub(crate) fn format_macros(m: &Macros) -> String {
    format!(
        "{:.0} kcal | P:{:.1}g NC:{:.1}g F:{:.1}g",
        no_neg_zero(m.calories),
        no_neg_zero(m.protein),
        no_neg_zero(m.net_carbs),
        no_neg_zero(m.fat)
    )
}

pub(crate) fn print_component_table(components: &[Component]) {
    #[derive(Tabled)]
    struct ComponentRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Kcal")]
        calories: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "NC")]
        net_carbs: String,
        #[tabled(rename = "F")]
        fat: String,
        #[tabled(rename = "Tags")]
        tags: String,
        #[tabled(rename = "ID")]
        id: String,
    }

    let rows: Vec<ComponentRow> = components
        .iter()
        .enumerate()
        .map(|(i, c)| ComponentRow {
            idx: i + 1,
            name: truncate(&c.name, 32),
            category: c.category.to_string(),
            calories: format!("{:.0}", c.default_macros.calories),
            protein: format!("{:.1}", c.default_macros.protein),
            net_carbs: format!("{:.1}", c.default_macros.net_carbs),
            fat: format!("{:.1}", c.default_macros.fat),
            tags: c.tags.join(","),
            id: c.id.clone(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..7)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
