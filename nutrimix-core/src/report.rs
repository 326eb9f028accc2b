//! Priced, unit-labelled recipe summaries.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::UnitError;
use crate::model::{DoseUnit, NutrientVector, Product, ProductForm, round_to};
use crate::units::{Dimension, Unit, convert_units};

/// Solvent volume every recipe is computed against, in litres.
pub const BASE_VOLUME_L: f64 = 1.0;

/// One product line of a recipe.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecipeEntry {
    pub product: String,
    pub dose: f64,
    pub unit: DoseUnit,
    /// Rounded to cents.
    pub cost: f64,
}

/// Output of the forward allocator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecipeResult {
    /// In the order products were first chosen.
    pub ingredients: Vec<RecipeEntry>,
    pub total_cost: f64,
    /// Base solvent plus added liquid product, in litres.
    pub total_volume: f64,
}

impl RecipeResult {
    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }

    pub fn entry(&self, product: &str) -> Option<&RecipeEntry> {
        self.ingredients.iter().find(|e| e.product == product)
    }
}

/// Running dose total per product, keyed by name, in first-chosen order.
#[derive(Debug, Default)]
pub struct DoseLedger<'a> {
    lines: Vec<(&'a Product, f64)>,
    liquid_ml: f64,
}

impl<'a> DoseLedger<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `dose` (in the product's own unit) to the product's running total.
    pub fn add(&mut self, product: &'a Product, dose: f64) {
        if product.form == ProductForm::Liquid {
            self.liquid_ml += dose;
        }
        match self.lines.iter_mut().find(|(p, _)| p.name == product.name) {
            Some((_, total)) => *total = round_to(*total + dose, 4),
            None => self.lines.push((product, dose)),
        }
    }

    /// Price the ledger. Costs are rounded to cents here and nowhere earlier.
    pub fn into_recipe(self, base_volume_l: f64) -> RecipeResult {
        let mut total_cost = 0.0;
        let ingredients = self
            .lines
            .into_iter()
            .filter(|(_, dose)| *dose > 0.0)
            .map(|(product, dose)| {
                let cost = dose * product.price_per_unit;
                total_cost += cost;
                RecipeEntry {
                    product: product.name.clone(),
                    dose,
                    unit: product.dose_unit(),
                    cost: round_to(cost, 2),
                }
            })
            .collect();

        RecipeResult {
            ingredients,
            total_cost: round_to(total_cost, 2),
            total_volume: round_to(base_volume_l + self.liquid_ml / 1000.0, 3),
        }
    }
}

/// mg of each element a recipe delivers, looked up against `products`.
pub fn delivered(recipe: &RecipeResult, products: &[Product]) -> NutrientVector {
    let mut out = NutrientVector::new();
    for entry in &recipe.ingredients {
        let Some(product) = products.iter().find(|p| p.name == entry.product) else {
            warn!(product = %entry.product, "recipe product missing from catalog");
            continue;
        };
        for element in product.analysis.keys() {
            *out.entry(element.clone()).or_default() += entry.dose * product.mg_per_unit(element);
        }
    }
    out
}

/// Scale a per-litre recipe to `batch_liters` of solution.
pub fn scale_recipe(recipe: &RecipeResult, products: &[Product], batch_liters: f64) -> RecipeResult {
    let mut ledger = DoseLedger::new();
    for entry in &recipe.ingredients {
        match products.iter().find(|p| p.name == entry.product) {
            Some(product) => ledger.add(product, round_to(entry.dose * batch_liters, 4)),
            None => warn!(product = %entry.product, "recipe product missing from catalog"),
        }
    }
    ledger.into_recipe(BASE_VOLUME_L * batch_liters)
}

/// Package price normalized to the base unit (per kg or per L).
pub fn price_per_base_unit(price: f64, quantity: f64, unit: &str) -> Result<f64, UnitError> {
    let unit: Unit = unit.parse()?;
    let base = quantity * unit.to_base();
    if base <= 0.0 {
        return Err(UnitError::NonPositive("package size"));
    }
    Ok(price / base)
}

/// Package price normalized to a product's dose unit: per g for solids,
/// per mL for liquids. The package unit must match the form's dimension.
pub fn price_per_dose_unit(
    price: f64,
    quantity: f64,
    unit: &str,
    form: ProductForm,
) -> Result<f64, UnitError> {
    let unit: Unit = unit.parse()?;
    let (dim, target) = match form {
        ProductForm::Solid => (Dimension::Mass, Unit::Gram),
        ProductForm::Liquid => (Dimension::Volume, Unit::Milliliter),
    };
    if unit.dimension() != dim {
        return Err(UnitError::IncompatibleUnits {
            from: unit.to_string(),
            to: target.to_string(),
        });
    }
    let size = convert_units(quantity, unit, target)?;
    if size <= 0.0 {
        return Err(UnitError::NonPositive("package size"));
    }
    Ok(price / size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn catalog() -> Vec<Product> {
        vec![
            Product::solid("CalNitrate", &[("N", 15.5), ("Ca", 19.0)], 0.01),
            Product::liquid("CalMag", &[("Ca", 3.0), ("Mg", 1.0)], 0.02, Some(1.25)),
        ]
    }

    #[test]
    fn test_ledger_merges_same_product() {
        let products = catalog();
        let mut ledger = DoseLedger::new();
        ledger.add(&products[0], 0.5);
        ledger.add(&products[1], 10.0);
        ledger.add(&products[0], 0.5);

        let recipe = ledger.into_recipe(BASE_VOLUME_L);
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].product, "CalNitrate");
        assert_relative_eq!(recipe.ingredients[0].dose, 1.0);
        assert_eq!(recipe.ingredients[1].unit, DoseUnit::Milliliters);
        assert_relative_eq!(recipe.total_volume, 1.01);
        assert_relative_eq!(recipe.total_cost, 0.21, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_ledger() {
        let recipe = DoseLedger::new().into_recipe(BASE_VOLUME_L);
        assert!(recipe.is_empty());
        assert_eq!(recipe.total_cost, 0.0);
        assert_eq!(recipe.total_volume, 1.0);
    }

    #[test]
    fn test_delivered_uses_density() {
        let products = catalog();
        let mut ledger = DoseLedger::new();
        ledger.add(&products[1], 10.0);
        let recipe = ledger.into_recipe(BASE_VOLUME_L);

        let mg = delivered(&recipe, &products);
        // 10 mL × 1.25 g/mL × 3% × 10
        assert_relative_eq!(mg["Ca"], 375.0, epsilon = 1e-9);
        assert_relative_eq!(mg["Mg"], 125.0, epsilon = 1e-9);
    }

    #[test]
    fn test_scale_recipe() {
        let products = catalog();
        let mut ledger = DoseLedger::new();
        ledger.add(&products[0], 0.9678);
        ledger.add(&products[1], 2.0);
        let recipe = ledger.into_recipe(BASE_VOLUME_L);

        let batch = scale_recipe(&recipe, &products, 20.0);
        assert_relative_eq!(batch.entry("CalNitrate").unwrap().dose, 19.356, epsilon = 1e-9);
        assert_relative_eq!(batch.entry("CalMag").unwrap().dose, 40.0);
        assert_relative_eq!(batch.total_volume, 20.04, epsilon = 1e-9);
        assert_relative_eq!(batch.total_cost, 0.99, epsilon = 1e-9);
    }

    #[test]
    fn test_package_prices() {
        assert_relative_eq!(price_per_base_unit(20.0, 2.0, "kg").unwrap(), 10.0);
        assert_relative_eq!(price_per_base_unit(5.0, 500.0, "mL").unwrap(), 10.0);
        assert_relative_eq!(
            price_per_dose_unit(25.0, 25.0, "kg", ProductForm::Solid).unwrap(),
            0.001
        );
        assert_relative_eq!(
            price_per_dose_unit(30.0, 1.0, "gal", ProductForm::Liquid).unwrap(),
            30.0 / 3785.41,
            epsilon = 1e-12
        );
        assert!(price_per_dose_unit(1.0, 1.0, "L", ProductForm::Solid).is_err());
        assert!(price_per_base_unit(1.0, 0.0, "kg").is_err());
        assert!(price_per_base_unit(1.0, 1.0, "bag").is_err());
    }
}
