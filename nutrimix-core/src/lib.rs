//! Nutrient vector allocation for fertigation.
//!
//! Two greedy allocators share one pattern: find the constraining element,
//! pick a contributor, subtract what it supplies (clamped at zero), repeat.
//!
//! - [`allocate`] turns per-litre element targets and a product catalog
//!   into a priced recipe.
//! - [`decompose`] attributes a guaranteed analysis to a prioritized list
//!   of candidate ingredients.
//!
//! Everything is synchronous and pure; inputs are only read.

pub mod allocate;
pub mod decompose;
pub mod error;
pub mod model;
pub mod report;
pub mod units;

pub use allocate::{Allocation, AllocationStep, allocate, allocate_traced, cheapest_source};
pub use decompose::{
    Decomposition, IngredientEstimate, IngredientReference, decompose, decompose_named,
    known_compound, known_compounds,
};
pub use error::{AllocationError, UnitError};
pub use model::{
    DoseUnit, ElementSymbol, NutrientVector, Product, ProductForm, TOLERANCE_MG, vector,
};
pub use report::{
    BASE_VOLUME_L, RecipeEntry, RecipeResult, delivered, price_per_base_unit, price_per_dose_unit,
    scale_recipe,
};
pub use units::{ConcentrationUnit, Unit};
