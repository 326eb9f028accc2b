//! Forward allocation: pick product doses that meet a nutrient target vector.
//!
//! Greedy, not optimal. Elements are visited once, in order of their
//! original target (largest first, ties: lowest symbol). Each element still
//! short of its target is closed with the product that delivers it cheapest
//! per mg (ties: earliest in the catalog), and that dose is credited against
//! every element the product carries. Changing either tie-break changes the
//! recipe, so both are part of the contract.

use serde::Serialize;
use tracing::debug;

use crate::error::AllocationError;
use crate::model::{
    DoseUnit, ElementSymbol, NutrientVector, Product, TOLERANCE_MG, round_dose_up,
};
use crate::report::{BASE_VOLUME_L, DoseLedger, RecipeResult};

/// One greedy step, kept for explaining a recipe.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AllocationStep {
    pub element: ElementSymbol,
    /// Unmet need when the step started, mg.
    pub need_mg: f64,
    pub product: String,
    pub dose: f64,
    pub unit: DoseUnit,
    pub cost_per_mg: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Allocation {
    pub recipe: RecipeResult,
    pub steps: Vec<AllocationStep>,
}

/// Minimum-cost greedy recipe for `targets` (mg/L) from `products`.
pub fn allocate(targets: &NutrientVector, products: &[Product]) -> Result<RecipeResult, AllocationError> {
    allocate_traced(targets, products).map(|a| a.recipe)
}

/// Same as [`allocate`], also returning the step-by-step choices.
pub fn allocate_traced(
    targets: &NutrientVector,
    products: &[Product],
) -> Result<Allocation, AllocationError> {
    let mut remaining: NutrientVector = targets
        .iter()
        .filter(|(_, mg)| **mg > 0.0)
        .map(|(el, mg)| (el.clone(), *mg))
        .collect();

    check_sources(&remaining, products)?;

    let mut ledger = DoseLedger::new();
    let mut steps = Vec::with_capacity(remaining.len());

    for element in visit_order(&remaining) {
        let need = remaining[&element];
        if need <= TOLERANCE_MG {
            debug!(%element, need, "already covered");
            continue;
        }
        let (product, cost_per_mg) = cheapest_source(&element, products).ok_or_else(|| {
            AllocationError::MissingSource {
                elements: vec![element.clone()],
            }
        })?;

        let dose = round_dose_up(need / product.mg_per_unit(&element));
        debug!(%element, need, product = %product.name, dose, "allocation step");
        ledger.add(product, dose);

        for el in product.analysis.keys() {
            if let Some(r) = remaining.get_mut(el) {
                *r = (*r - dose * product.mg_per_unit(el)).max(0.0);
            }
        }

        steps.push(AllocationStep {
            element,
            need_mg: need,
            product: product.name.clone(),
            dose,
            unit: product.dose_unit(),
            cost_per_mg,
        });
    }

    check_residual(remaining)?;

    Ok(Allocation {
        recipe: ledger.into_recipe(BASE_VOLUME_L),
        steps,
    })
}

/// Every targeted element must have at least one product carrying it.
fn check_sources(targets: &NutrientVector, products: &[Product]) -> Result<(), AllocationError> {
    let missing: Vec<ElementSymbol> = targets
        .keys()
        .filter(|el| !products.iter().any(|p| p.supplies(el)))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AllocationError::MissingSource { elements: missing })
    }
}

fn check_residual(remaining: NutrientVector) -> Result<(), AllocationError> {
    let residual: NutrientVector = remaining
        .into_iter()
        .filter(|(_, mg)| *mg > TOLERANCE_MG)
        .collect();
    if residual.is_empty() {
        Ok(())
    } else {
        Err(AllocationError::UnsatisfiableTarget { residual })
    }
}

/// Elements by target, largest first; equal targets by symbol.
fn visit_order(targets: &NutrientVector) -> Vec<ElementSymbol> {
    let mut order: Vec<(&ElementSymbol, f64)> = targets.iter().map(|(el, mg)| (el, *mg)).collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    order.into_iter().map(|(el, _)| el.clone()).collect()
}

/// Product delivering `element` at the lowest price per mg; first wins on ties.
pub fn cheapest_source<'a>(element: &str, products: &'a [Product]) -> Option<(&'a Product, f64)> {
    let mut best: Option<(&Product, f64)> = None;
    for product in products {
        let Some(cost) = product.cost_per_mg(element) else {
            continue;
        };
        if best.is_none_or(|(_, c)| cost < c) {
            best = Some((product, cost));
        }
    }
    best
}
