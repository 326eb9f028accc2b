//! Inverse allocation: estimate how much of each "derived from" ingredient
//! a blended product contains, given its guaranteed analysis.
//!
//! Candidates are visited in the caller's order, which expresses priority.
//! Each one is included up to the ratio allowed by its limiting element,
//! and its contribution is then removed from every element it carries
//! (clamped at zero). This is an attribution heuristic: fractions are not
//! forced to sum to 1 and a single fraction may exceed 1.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{NutrientVector, round_to, vector};

/// A raw ingredient with known composition (percent by weight).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IngredientReference {
    pub name: String,
    pub analysis: NutrientVector,
}

impl IngredientReference {
    pub fn new(name: impl Into<String>, analysis: &[(&str, f64)]) -> Self {
        IngredientReference {
            name: name.into(),
            analysis: vector(analysis),
        }
    }
}

/// Estimated inclusion of one ingredient, as a decimal fraction of the product.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IngredientEstimate {
    pub ingredient: String,
    pub fraction: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Decomposition {
    pub estimates: Vec<IngredientEstimate>,
    /// Guaranteed analysis left unexplained, mass fraction per element.
    pub remaining: NutrientVector,
}

/// Common fertilizer salts, percent by weight.
static KNOWN_COMPOUNDS: &[(&str, &[(&str, f64)])] = &[
    ("Ammonium Nitrate", &[("N", 34.0)]),
    ("Ammonium Phosphate", &[("N", 11.0), ("P", 8.8)]),
    ("Potassium Nitrate", &[("K", 38.0), ("N", 13.0)]),
    ("Monopotassium Phosphate", &[("P", 22.7), ("K", 28.7)]),
    ("Magnesium Sulfate Heptahydrate", &[("Mg", 9.8), ("S", 12.9)]),
    ("Calcium Nitrate", &[("Ca", 19.0), ("N", 15.5)]),
    ("Sodium Molybdate", &[("Mo", 39.6)]),
    ("Zinc EDTA", &[("Zn", 14.0)]),
    ("Iron EDTA", &[("Fe", 12.0)]),
    ("Manganese EDTA", &[("Mn", 13.0)]),
    ("Copper EDTA", &[("Cu", 15.0)]),
    ("Boric Acid", &[("B", 17.5)]),
    ("Sodium Borate", &[("B", 11.3)]),
    ("Magnesium Nitrate", &[("Mg", 9.5), ("N", 10.9)]),
    ("Potassium Sulfate", &[("K", 44.9), ("S", 18.4)]),
];

/// The built-in reference table, in table order.
pub fn known_compounds() -> Vec<IngredientReference> {
    KNOWN_COMPOUNDS
        .iter()
        .map(|(name, analysis)| IngredientReference::new(*name, analysis))
        .collect()
}

/// Look up a compound by exact name.
pub fn known_compound(name: &str) -> Option<IngredientReference> {
    KNOWN_COMPOUNDS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(n, analysis)| IngredientReference::new(*n, analysis))
}

/// Decompose `analysis` (mass fraction per element, 0..=1) over `candidates`.
pub fn decompose(analysis: &NutrientVector, candidates: &[IngredientReference]) -> Decomposition {
    let mut remaining = analysis.clone();
    let mut estimates = Vec::new();

    for ingredient in candidates {
        let Some(ratio) = limiting_ratio(&remaining, ingredient) else {
            debug!(ingredient = %ingredient.name, "no shared element, skipped");
            continue;
        };

        for (element, pct) in &ingredient.analysis {
            if let Some(r) = remaining.get_mut(element) {
                *r = (*r - pct / 100.0 * ratio).max(0.0);
            }
        }

        debug!(ingredient = %ingredient.name, ratio, "ingredient attributed");
        estimates.push(IngredientEstimate {
            ingredient: ingredient.name.clone(),
            fraction: round_to(ratio, 4),
        });
    }

    Decomposition {
        estimates,
        remaining,
    }
}

/// Resolve `names` against `table` and decompose. Unknown names are skipped.
pub fn decompose_named<S: AsRef<str>>(
    analysis: &NutrientVector,
    names: &[S],
    table: &[IngredientReference],
) -> Decomposition {
    let candidates: Vec<IngredientReference> = names
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let found = table.iter().find(|r| r.name == name).cloned();
            if found.is_none() {
                debug!(ingredient = name, "not in reference table, skipped");
            }
            found
        })
        .collect();
    decompose(analysis, &candidates)
}

/// Smallest `remaining / fraction` over shared elements; the first element
/// examined wins an exact tie.
fn limiting_ratio(remaining: &NutrientVector, ingredient: &IngredientReference) -> Option<f64> {
    let mut best: Option<f64> = None;
    for (element, pct) in &ingredient.analysis {
        let Some(left) = remaining.get(element) else {
            continue;
        };
        if *pct <= 0.0 {
            continue;
        }
        let ratio = left / (pct / 100.0);
        if best.is_none_or(|b| ratio < b) {
            best = Some(ratio);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ammonium_nitrate_alone() {
        let d = decompose_named(&vector(&[("N", 0.33)]), &["Ammonium Nitrate"], &known_compounds());
        assert_eq!(d.estimates.len(), 1);
        assert_eq!(d.estimates[0].ingredient, "Ammonium Nitrate");
        assert_relative_eq!(d.estimates[0].fraction, 0.9706);
        assert_relative_eq!(d.remaining["N"], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_and_disjoint_candidates_skipped() {
        let d = decompose_named(
            &vector(&[("N", 0.2)]),
            &["Unobtainium", "Zinc EDTA", "Calcium Nitrate"],
            &known_compounds(),
        );
        assert_eq!(d.estimates.len(), 1);
        assert_eq!(d.estimates[0].ingredient, "Calcium Nitrate");
    }

    #[test]
    fn test_empty_inputs() {
        let d = decompose(&NutrientVector::new(), &known_compounds());
        assert!(d.estimates.is_empty());
        let d = decompose(&vector(&[("K", 0.1)]), &[]);
        assert!(d.estimates.is_empty());
        assert_eq!(d.remaining, vector(&[("K", 0.1)]));
    }

    #[test]
    fn test_order_sets_priority() {
        let analysis = vector(&[("N", 0.20), ("P", 0.10), ("K", 0.10)]);
        let table = known_compounds();

        let a = decompose_named(&analysis, &["Ammonium Nitrate", "Monopotassium Phosphate"], &table);
        let b = decompose_named(&analysis, &["Monopotassium Phosphate", "Ammonium Nitrate"], &table);
        // ammonium nitrate first soaks up all N
        assert_relative_eq!(a.estimates[0].fraction, 0.5882);
        // MKP first is limited by K: 0.10 / 0.287
        assert_relative_eq!(b.estimates[0].fraction, 0.3484);
        assert_relative_eq!(b.estimates[1].fraction, 0.5882);
        assert!(a.remaining["P"] > 0.0);
    }

    #[test]
    fn test_limiting_element_and_clamp() {
        // Potassium nitrate is limited by N; K is left over.
        let d = decompose(
            &vector(&[("K", 0.38), ("N", 0.065)]),
            &[known_compound("Potassium Nitrate").unwrap()],
        );
        assert_relative_eq!(d.estimates[0].fraction, 0.5);
        assert_relative_eq!(d.remaining["N"], 0.0, epsilon = 1e-12);
        assert_relative_eq!(d.remaining["K"], 0.19, epsilon = 1e-12);
    }

    #[test]
    fn test_fractions_and_remaining_never_negative() {
        let analysis = vector(&[("N", 0.12), ("K", 0.05), ("S", 0.02), ("Mg", 0.01)]);
        let names = [
            "Potassium Sulfate",
            "Magnesium Nitrate",
            "Calcium Nitrate",
            "Ammonium Nitrate",
            "Magnesium Sulfate Heptahydrate",
        ];
        let d = decompose_named(&analysis, &names, &known_compounds());
        assert!(d.estimates.iter().all(|e| e.fraction >= 0.0));
        assert!(d.remaining.values().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_fraction_may_exceed_one() {
        let d = decompose(
            &vector(&[("Fe", 0.5)]),
            &[IngredientReference::new("Iron EDTA", &[("Fe", 12.0)])],
        );
        assert!(d.estimates[0].fraction > 1.0);
    }

    #[test]
    fn test_zero_percent_element_is_not_limiting() {
        let edta = IngredientReference::new("EDTA", &[("N", 0.0)]);
        let d = decompose(&vector(&[("N", 0.1)]), &[edta]);
        assert!(d.estimates.is_empty());
    }

    #[test]
    fn test_known_compound_lookup_is_exact() {
        assert!(known_compound("Boric Acid").is_some());
        assert!(known_compound("boric acid").is_none());
        assert_eq!(known_compounds().len(), KNOWN_COMPOUNDS.len());
    }
}
