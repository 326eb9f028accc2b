//! Product catalog files.

use std::collections::HashSet;
use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use nutrimix_core::{NutrientVector, Product, ProductForm, price_per_dose_unit, vector};
use serde::Deserialize;

/// A catalog row as written on disk. Price is either given per dose unit
/// or as a package price that gets normalized.
#[derive(Debug, Deserialize)]
pub struct CatalogEntry {
    name: String,
    form: ProductForm,
    analysis: NutrientVector,
    #[serde(default)]
    price_per_unit: Option<f64>,
    #[serde(default)]
    package_price: Option<f64>,
    #[serde(default)]
    package_size: Option<f64>,
    #[serde(default)]
    package_unit: Option<String>,
    #[serde(default)]
    density_g_per_ml: Option<f64>,
}

impl CatalogEntry {
    pub fn into_product(self) -> Result<Product> {
        let price = match (self.price_per_unit, self.package_price, self.package_size, &self.package_unit) {
            (Some(p), None, None, None) => p,
            (None, Some(price), Some(size), Some(unit)) => {
                price_per_dose_unit(price, size, unit, self.form)
                    .with_context(|| format!("product '{}': bad package price", self.name))?
            }
            _ => bail!(
                "product '{}': give either price_per_unit or package_price/package_size/package_unit",
                self.name
            ),
        };

        if !(price.is_finite() && price >= 0.0) {
            bail!("product '{}': price must be a non-negative number", self.name);
        }
        for (el, pct) in &self.analysis {
            if !(0.0..=100.0).contains(pct) {
                bail!("product '{}': {el} must be between 0 and 100 %", self.name);
            }
        }
        if let Some(d) = self.density_g_per_ml {
            if !(d.is_finite() && d > 0.0) {
                bail!("product '{}': density must be > 0", self.name);
            }
        }

        Ok(Product {
            name: self.name,
            form: self.form,
            analysis: self.analysis,
            price_per_unit: price,
            density_g_per_ml: self.density_g_per_ml,
        })
    }
}

pub fn parse_catalog(json: &str) -> Result<Vec<Product>> {
    let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
    let mut seen = HashSet::new();
    let mut products = Vec::with_capacity(entries.len());
    for entry in entries {
        let product = entry.into_product()?;
        if !seen.insert(product.name.clone()) {
            bail!("duplicate product name '{}'", product.name);
        }
        products.push(product);
    }
    Ok(products)
}

pub fn load_catalog(path: &Path) -> Result<Vec<Product>> {
    let txt = fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
    parse_catalog(&txt).with_context(|| format!("Invalid catalog: {}", path.display()))
}

/// Five common salts, used when no catalog file is given.
pub fn demo_catalog() -> Vec<Product> {
    vec![
        Product::solid("CalNitrate", &[("N", 15.5), ("Ca", 19.0)], 0.01),
        Product::solid("SuperPhosphate", &[("P", 20.0), ("Ca", 15.0)], 0.015),
        Product::solid("PotassiumNitrate", &[("K", 13.0), ("N", 13.0)], 0.012),
        Product::solid("MagnesiumSulfate", &[("Mg", 9.6), ("S", 13.0)], 0.008),
        Product::solid("IronChelate", &[("Fe", 6.0)], 0.05),
    ]
}

/// Vegetative-stage default targets in mg/L.
pub fn demo_targets() -> NutrientVector {
    vector(&[("N", 150.0), ("P", 50.0), ("K", 150.0), ("Fe", 2.0), ("Mg", 20.0)])
}
