use anyhow::Result;

use ketovital_core::models::{Category, Macros, NewComponent};
use ketovital_core::service::VitalService;

use super::helpers::{format_macros, print_component_table};

pub(crate) struct ComponentArgs {
    pub name: String,
    pub category: String,
    pub protein: f64,
    pub net_carbs: f64,
    pub fat: f64,
    pub calories: f64,
    pub portion: Option<String>,
    pub tags: Vec<String>,
}

pub(crate) fn cmd_component_add(svc: &VitalService, args: ComponentArgs, json: bool) -> Result<()> {
    let category: Category = args.category.parse()?;
    let mut def = NewComponent::new(
        args.name,
        category,
        Macros::new(args.protein, args.net_carbs, args.fat, args.calories),
    );
    def.default_portion = args.portion;
    def.tags = args.tags;
    def.is_user_defined = true;

    let component = svc.add_component(&def)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&component)?);
    } else {
        println!(
            "Added {} ({}): {}",
            component.name,
            component.category,
            format_macros(&component.default_macros)
        );
        println!("  id: {}", component.id);
    }
    Ok(())
}

pub(crate) fn cmd_component_list(
    svc: &VitalService,
    category: Option<&str>,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    let category = category.map(str::parse::<Category>).transpose()?;
    let components = match (category, search) {
        (_, Some(query)) => svc.search_components(category, query)?,
        (Some(c), None) => svc.list_by_category(c)?,
        (None, None) => svc.db().list_components()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&components)?);
        return Ok(());
    }

    if components.is_empty() {
        eprintln!("No components found. Run `ketovital seed` to install the default catalog.");
        return Ok(());
    }
    print_component_table(&components);
    Ok(())
}

pub(crate) fn cmd_seed(svc: &VitalService, json: bool) -> Result<()> {
    let inserted = svc.seed_defaults()?;

    if json {
        println!("{}", serde_json::json!({ "inserted": inserted }));
    } else if inserted == 0 {
        println!("Catalog already populated; nothing to seed.");
    } else {
        println!("Installed {inserted} default components.");
    }
    Ok(())
}
