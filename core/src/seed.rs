//! The default component catalog installed on first launch.

use uuid::Uuid;

use crate::models::{Category, Macros, NewComponent};

/// Namespace for name-derived component ids.
const COMPONENT_NAMESPACE: Uuid = Uuid::from_u128(0x6b65_746f_7669_7461_6c2d_636f_6d70_6f6e);

/// Deterministic id for a named component, identical on every device and run.
#[must_use]
pub fn stable_component_id(name: &str) -> String {
    Uuid::new_v5(&COMPONENT_NAMESPACE, name.trim().as_bytes()).to_string()
}

struct Seed {
    name: &'static str,
    category: Category,
    macros: [f64; 4],
    tags: &'static [&'static str],
}

#[rustfmt::skip]
const SEEDS: &[Seed] = &[
    Seed { name: "SuperYou Protein Shake", category: Category::ProteinBase, macros: [25.0, 2.0, 2.0, 120.0], tags: &["anchor"] },
    Seed { name: "Whey Isolate Shake", category: Category::ProteinBase, macros: [25.0, 2.0, 1.0, 110.0], tags: &[] },
    Seed { name: "Soy/Pea Isolate Shake", category: Category::ProteinBase, macros: [25.0, 2.0, 2.0, 120.0], tags: &[] },
    Seed { name: "Hung Curd Bowl (250g)", category: Category::ProteinBase, macros: [20.0, 10.0, 6.0, 200.0], tags: &["probiotic"] },
    Seed { name: "Protein Yogurt Bowl", category: Category::ProteinBase, macros: [35.0, 11.0, 7.0, 310.0], tags: &["sweet"] },
    Seed { name: "Savory Yogurt Bowl", category: Category::ProteinBase, macros: [22.0, 10.0, 6.0, 220.0], tags: &["savory"] },
    Seed { name: "Omelette (3 eggs)", category: Category::ProteinBase, macros: [18.0, 2.0, 15.0, 220.0], tags: &[] },
    Seed { name: "Turkish Eggs (3 eggs)", category: Category::ProteinBase, macros: [25.0, 6.0, 18.0, 320.0], tags: &[] },
    Seed { name: "Paneer (150g)", category: Category::ProteinBase, macros: [28.0, 4.0, 22.0, 330.0], tags: &[] },
    Seed { name: "Tofu (200g)", category: Category::ProteinBase, macros: [24.0, 6.0, 14.0, 260.0], tags: &[] },
    Seed { name: "Paneer Sabzi Plate", category: Category::Meal, macros: [30.0, 12.0, 18.0, 380.0], tags: &[] },
    Seed { name: "Tofu Stir-fry", category: Category::Meal, macros: [28.0, 14.0, 16.0, 360.0], tags: &[] },
    Seed { name: "Soup + Protein Add-in", category: Category::Meal, macros: [25.0, 14.0, 15.0, 320.0], tags: &[] },
    Seed { name: "Wrap: Egg Bhurji", category: Category::Meal, macros: [20.0, 6.0, 14.0, 260.0], tags: &[] },
    Seed { name: "Wrap: Paneer", category: Category::Meal, macros: [22.0, 7.0, 16.0, 290.0], tags: &[] },
    Seed { name: "Controlled Comfort: Papad/Curd", category: Category::Meal, macros: [10.0, 12.0, 12.0, 220.0], tags: &["limit"] },
    Seed { name: "Low-carb Tortilla Wrap", category: Category::Wrap, macros: [5.0, 5.0, 4.0, 80.0], tags: &[] },
    Seed { name: "Soup Base (Veg)", category: Category::Soup, macros: [5.0, 10.0, 5.0, 100.0], tags: &[] },
    Seed { name: "Get-A-Whey Ice Cream", category: Category::Dessert, macros: [15.0, 10.0, 8.0, 180.0], tags: &["sweetHit"] },
    Seed { name: "Yogurt Shrikhand", category: Category::Dessert, macros: [20.0, 12.0, 8.0, 210.0], tags: &["sweetHit"] },
    Seed { name: "Black Coffee", category: Category::Beverage, macros: [0.0, 0.0, 0.0, 0.0], tags: &[] },
    Seed { name: "Diet Coke", category: Category::Beverage, macros: [0.0, 0.0, 0.0, 0.0], tags: &["caffeine"] },
    Seed { name: "Salted Lime Soda", category: Category::Beverage, macros: [0.0, 1.0, 0.0, 5.0], tags: &["electrolytes"] },
    Seed { name: "Nuts (20g)", category: Category::AddOn, macros: [4.0, 3.0, 10.0, 120.0], tags: &["limit"] },
];

/// The built-in catalog, each item keyed by its name-derived id.
#[must_use]
pub fn default_components() -> Vec<NewComponent> {
    SEEDS
        .iter()
        .map(|s| {
            let [protein, net_carbs, fat, calories] = s.macros;
            NewComponent {
                id: Some(stable_component_id(s.name)),
                name: s.name.to_string(),
                category: s.category,
                default_macros: Macros::new(protein, net_carbs, fat, calories),
                default_portion: None,
                tags: s.tags.iter().map(ToString::to_string).collect(),
                is_user_defined: false,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_stable_id_is_deterministic() {
        assert_eq!(
            stable_component_id("Black Coffee"),
            stable_component_id(" Black Coffee ")
        );
        assert_ne!(
            stable_component_id("Black Coffee"),
            stable_component_id("Diet Coke")
        );
        assert!(Uuid::parse_str(&stable_component_id("Tofu (200g)")).is_ok());
    }

    #[test]
    fn test_default_components_are_valid_and_unique() {
        let defaults = default_components();
        assert_eq!(defaults.len(), 24);
        let ids: HashSet<_> = defaults.iter().filter_map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), defaults.len());
        for c in &defaults {
            c.validate().unwrap();
            assert!(!c.is_user_defined);
        }
    }

    #[test]
    fn test_default_components_cover_categories() {
        let defaults = default_components();
        for category in [
            Category::ProteinBase,
            Category::Meal,
            Category::Wrap,
            Category::Soup,
            Category::Dessert,
            Category::Beverage,
            Category::AddOn,
        ] {
            assert!(
                defaults.iter().any(|c| c.category == category),
                "no default for {category}"
            );
        }
    }
}
