//! Macro aggregation: turns components + portions into a total.
//!
//! Used both for the live preview while a meal is being built and for the
//! snapshot frozen into `computedTotals` when the meal is saved. No rounding
//! happens here; that is a display concern.

use crate::models::{Component, Macros};

/// One line of a meal being aggregated.
#[derive(Debug, Clone, Copy)]
pub struct MacroItem<'a> {
    pub component: &'a Component,
    pub multiplier: f64,
    /// Already reflects the consumed quantity, so `multiplier` is ignored.
    pub override_macros: Option<Macros>,
}

impl<'a> MacroItem<'a> {
    #[must_use]
    pub fn new(component: &'a Component, multiplier: f64) -> Self {
        Self {
            component,
            multiplier,
            override_macros: None,
        }
    }

    #[must_use]
    pub fn with_override(component: &'a Component, override_macros: Macros) -> Self {
        Self {
            component,
            multiplier: 1.0,
            override_macros: Some(override_macros),
        }
    }

    #[must_use]
    pub fn contribution(&self) -> Macros {
        self.override_macros
            .unwrap_or_else(|| self.component.default_macros.scale(self.multiplier))
    }
}

/// Element-wise sum of every item's contribution. Empty input is all zeros.
#[must_use]
pub fn aggregate(items: &[MacroItem<'_>]) -> Macros {
    items.iter().map(MacroItem::contribution).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn component(macros: Macros) -> Component {
        Component {
            id: "00000000-0000-4000-8000-000000000001".to_string(),
            name: "Protein Shake".to_string(),
            category: Category::ProteinBase,
            default_macros: macros,
            default_portion: None,
            tags: Vec::new(),
            is_user_defined: false,
        }
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(aggregate(&[]), Macros::ZERO);
    }

    #[test]
    fn test_multiplier_scales_defaults() {
        let shake = component(Macros::new(25.0, 2.0, 2.0, 120.0));
        let totals = aggregate(&[MacroItem::new(&shake, 2.0)]);
        assert_eq!(totals, Macros::new(50.0, 4.0, 4.0, 240.0));
    }

    #[test]
    fn test_override_takes_precedence_over_multiplier() {
        let shake = component(Macros::new(25.0, 2.0, 2.0, 120.0));
        let item = MacroItem {
            component: &shake,
            multiplier: 3.0,
            override_macros: Some(Macros::new(10.0, 1.0, 1.0, 50.0)),
        };
        assert_eq!(aggregate(&[item]), Macros::new(10.0, 1.0, 1.0, 50.0));
    }

    #[test]
    fn test_mixed_items_sum() {
        let a = component(Macros::new(20.0, 2.0, 5.0, 150.0));
        let b = component(Macros::new(5.0, 20.0, 2.0, 130.0));
        let totals = aggregate(&[
            MacroItem::new(&a, 1.0),
            MacroItem::new(&b, 0.5),
            MacroItem::with_override(&b, Macros::new(1.0, 1.0, 1.0, 10.0)),
        ]);
        assert_eq!(totals, Macros::new(23.5, 13.0, 7.0, 225.0));
    }

    #[test]
    fn test_deterministic() {
        let a = component(Macros::new(18.0, 2.0, 15.0, 220.0));
        let items = [MacroItem::new(&a, 1.5)];
        assert_eq!(aggregate(&items), aggregate(&items));
    }
}
