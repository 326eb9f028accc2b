use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Nutrient element code such as `"N"`, `"K"` or `"Fe"`. Matched exactly (case-sensitive).
pub type ElementSymbol = String;

/// Element → quantity. Targets and contributions are mg per litre;
/// product analyses are percent by weight.
pub type NutrientVector = BTreeMap<ElementSymbol, f64>;

/// Shortfall tolerated when checking that a target is met, in mg.
pub const TOLERANCE_MG: f64 = 1e-3;

/// 1% of 1 g is 10 mg.
pub const MG_PER_GRAM_PERCENT: f64 = 10.0;

/// Physical form of a product; decides the dose unit.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProductForm {
    Solid,
    Liquid,
}

/// Unit a dose is measured in.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum DoseUnit {
    #[serde(rename = "g")]
    Grams,
    #[serde(rename = "mL")]
    Milliliters,
}

impl DoseUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            DoseUnit::Grams => "g",
            DoseUnit::Milliliters => "mL",
        }
    }
}

impl fmt::Display for DoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fertilizer product as supplied by a catalog.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// Unique within a catalog.
    pub name: String,
    pub form: ProductForm,
    /// Percent by weight, 0..=100.
    pub analysis: NutrientVector,
    /// Currency per gram (solid) or per millilitre (liquid).
    pub price_per_unit: f64,
    /// Liquids only; 1.0 g/mL when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density_g_per_ml: Option<f64>,
}

impl Product {
    pub fn solid(name: impl Into<String>, analysis: &[(&str, f64)], price_per_gram: f64) -> Self {
        Product {
            name: name.into(),
            form: ProductForm::Solid,
            analysis: vector(analysis),
            price_per_unit: price_per_gram,
            density_g_per_ml: None,
        }
    }

    pub fn liquid(
        name: impl Into<String>,
        analysis: &[(&str, f64)],
        price_per_ml: f64,
        density_g_per_ml: Option<f64>,
    ) -> Self {
        Product {
            name: name.into(),
            form: ProductForm::Liquid,
            analysis: vector(analysis),
            price_per_unit: price_per_ml,
            density_g_per_ml,
        }
    }

    pub fn dose_unit(&self) -> DoseUnit {
        match self.form {
            ProductForm::Solid => DoseUnit::Grams,
            ProductForm::Liquid => DoseUnit::Milliliters,
        }
    }

    /// Grams of product in one dose unit.
    pub fn grams_per_unit(&self) -> f64 {
        match self.form {
            ProductForm::Solid => 1.0,
            ProductForm::Liquid => self.density_g_per_ml.unwrap_or(1.0),
        }
    }

    /// Percent by weight of `element`, 0 when absent.
    pub fn percent(&self, element: &str) -> f64 {
        self.analysis.get(element).copied().unwrap_or(0.0)
    }

    pub fn supplies(&self, element: &str) -> bool {
        self.percent(element) > 0.0
    }

    /// mg of `element` delivered by one dose unit (g or mL).
    pub fn mg_per_unit(&self, element: &str) -> f64 {
        self.percent(element) * MG_PER_GRAM_PERCENT * self.grams_per_unit()
    }

    /// Price of one mg of `element`; `None` when the product does not supply it.
    pub fn cost_per_mg(&self, element: &str) -> Option<f64> {
        let mg = self.mg_per_unit(element);
        (mg > 0.0).then(|| self.price_per_unit / mg)
    }
}

/// Build a vector from `(element, value)` pairs.
pub fn vector(pairs: &[(&str, f64)]) -> NutrientVector {
    pairs.iter().map(|(el, v)| (el.to_string(), *v)).collect()
}

#[inline]
pub(crate) fn round_to(v: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (v * f).round() / f
}

/// Round to 4 places, never below `v`, so a dose rounded for display
/// still closes the need it was computed for.
#[inline]
pub(crate) fn round_dose_up(v: f64) -> f64 {
    let r = round_to(v, 4);
    if r < v { round_to(r + 1e-4, 4) } else { r }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_liquid_density_defaults_to_water() {
        let p = Product::liquid("FishEmulsion", &[("N", 5.0)], 0.02, None);
        assert_eq!(p.dose_unit(), DoseUnit::Milliliters);
        assert_relative_eq!(p.mg_per_unit("N"), 50.0);

        let dense = Product::liquid("Dense", &[("N", 5.0)], 0.02, Some(1.2));
        assert_relative_eq!(dense.mg_per_unit("N"), 60.0, epsilon = 1e-9);
    }

    #[test]
    fn test_solid_ignores_density() {
        let mut p = Product::solid("Urea", &[("N", 46.0)], 0.004);
        p.density_g_per_ml = Some(2.0);
        assert_relative_eq!(p.mg_per_unit("N"), 460.0);
    }

    #[test]
    fn test_cost_per_mg() {
        let p = Product::solid("CalNitrate", &[("N", 15.5), ("Ca", 19.0)], 0.01);
        assert_relative_eq!(p.cost_per_mg("N").unwrap(), 0.01 / 155.0);
        assert!(p.cost_per_mg("K").is_none());
    }

    #[test]
    fn test_element_lookup_is_case_sensitive() {
        let p = Product::solid("Moly", &[("Mo", 39.6)], 0.2);
        assert!(p.supplies("Mo"));
        assert!(!p.supplies("MO"));
    }

    #[test]
    fn test_round_dose_up_never_shrinks() {
        assert_relative_eq!(round_dose_up(150.0 / 155.0), 0.9678);
        assert_relative_eq!(round_dose_up(0.25), 0.25);
        assert!(round_dose_up(2.0 / 60.0) >= 2.0 / 60.0);
    }

    #[test]
    fn test_dose_unit_serializes_short() {
        assert_eq!(DoseUnit::Milliliters.to_string(), "mL");
        assert_eq!(DoseUnit::Grams.as_str(), "g");
    }
}
