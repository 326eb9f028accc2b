use thiserror::Error;

use crate::model::{ElementSymbol, NutrientVector};

/// Failure of a forward allocation. No partial recipe is ever returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    /// At least one targeted element has no catalog product supplying it.
    #[error("no product in the catalog supplies {}", .elements.join(", "))]
    MissingSource { elements: Vec<ElementSymbol> },

    /// Allocation finished but some targets are still short by more than the tolerance.
    #[error("could not meet all targets, remaining: {}", fmt_residual(.residual))]
    UnsatisfiableTarget { residual: NutrientVector },
}

/// Failure of a single unit or dose conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("unsupported unit: {0}")]
    InvalidUnit(String),

    #[error("cannot convert {from} to {to}")]
    IncompatibleUnits { from: String, to: String },

    #[error("{0} must be greater than 0")]
    NonPositive(&'static str),

    #[error("stock concentration ({stock}) must exceed desired concentration ({desired})")]
    StockNotStronger { stock: f64, desired: f64 },

    #[error("no solutions provided")]
    Empty,
}

fn fmt_residual(residual: &NutrientVector) -> String {
    residual
        .iter()
        .map(|(el, mg)| format!("{el}={mg:.4} mg"))
        .collect::<Vec<_>>()
        .join(", ")
}
