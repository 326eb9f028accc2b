//! Mass/volume unit conversion and dose/concentration helpers.
//!
//! Everything here is stateless. Unknown unit strings are rejected with
//! [`UnitError::InvalidUnit`]; nothing is guessed or normalized beyond the
//! `ppm` ≡ `mg/L` alias.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnitError;
use crate::model::round_to;

const GRAMS_PER_OUNCE: f64 = 28.3495;
const LITERS_PER_GALLON: f64 = 3.78541;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dimension {
    /// Base unit kg.
    Mass,
    /// Base unit L.
    Volume,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "g")]
    Gram,
    #[serde(rename = "kg")]
    Kilogram,
    #[serde(rename = "oz")]
    Ounce,
    #[serde(rename = "lb")]
    Pound,
    #[serde(rename = "mL")]
    Milliliter,
    #[serde(rename = "L")]
    Liter,
    #[serde(rename = "gal")]
    Gallon,
    #[serde(rename = "fl_oz")]
    FluidOunce,
}

impl Unit {
    pub const ALL: [Unit; 8] = [
        Unit::Gram,
        Unit::Kilogram,
        Unit::Ounce,
        Unit::Pound,
        Unit::Milliliter,
        Unit::Liter,
        Unit::Gallon,
        Unit::FluidOunce,
    ];

    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Gram | Unit::Kilogram | Unit::Ounce | Unit::Pound => Dimension::Mass,
            Unit::Milliliter | Unit::Liter | Unit::Gallon | Unit::FluidOunce => Dimension::Volume,
        }
    }

    /// Multiplier from this unit to its base unit (kg or L).
    pub fn to_base(self) -> f64 {
        match self {
            Unit::Gram => 0.001,
            Unit::Kilogram => 1.0,
            Unit::Ounce => 0.0283495,
            Unit::Pound => 0.453592,
            Unit::Milliliter => 0.001,
            Unit::Liter => 1.0,
            Unit::Gallon => LITERS_PER_GALLON,
            Unit::FluidOunce => 0.0295735,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Gram => "g",
            Unit::Kilogram => "kg",
            Unit::Ounce => "oz",
            Unit::Pound => "lb",
            Unit::Milliliter => "mL",
            Unit::Liter => "L",
            Unit::Gallon => "gal",
            Unit::FluidOunce => "fl_oz",
        }
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::ALL
            .into_iter()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| UnitError::InvalidUnit(s.to_string()))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert `value` between two units of the same dimension.
pub fn convert(value: f64, from: &str, to: &str) -> Result<f64, UnitError> {
    let (f, t): (Unit, Unit) = (from.parse()?, to.parse()?);
    convert_units(value, f, t)
}

pub fn convert_units(value: f64, from: Unit, to: Unit) -> Result<f64, UnitError> {
    if from == to {
        return Ok(value);
    }
    if from.dimension() != to.dimension() {
        return Err(UnitError::IncompatibleUnits {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(value * from.to_base() / to.to_base())
}

/// Concentration notation. `ppm` parses as [`ConcentrationUnit::MgPerL`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcentrationUnit {
    #[serde(rename = "mg/L", alias = "ppm")]
    MgPerL,
    #[serde(rename = "g/L")]
    GPerL,
    #[serde(rename = "oz/gal")]
    OzPerGal,
}

impl ConcentrationUnit {
    /// Multiplier to mg/L.
    pub fn to_mg_per_l(self) -> f64 {
        match self {
            ConcentrationUnit::MgPerL => 1.0,
            ConcentrationUnit::GPerL => 1000.0,
            ConcentrationUnit::OzPerGal => GRAMS_PER_OUNCE * 1000.0 / LITERS_PER_GALLON,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConcentrationUnit::MgPerL => "mg/L",
            ConcentrationUnit::GPerL => "g/L",
            ConcentrationUnit::OzPerGal => "oz/gal",
        }
    }
}

impl FromStr for ConcentrationUnit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mg/L" | "ppm" => Ok(ConcentrationUnit::MgPerL),
            "g/L" => Ok(ConcentrationUnit::GPerL),
            "oz/gal" => Ok(ConcentrationUnit::OzPerGal),
            other => Err(UnitError::InvalidUnit(other.to_string())),
        }
    }
}

impl fmt::Display for ConcentrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn convert_concentration(value: f64, from: &str, to: &str) -> Result<f64, UnitError> {
    let (f, t): (ConcentrationUnit, ConcentrationUnit) = (from.parse()?, to.parse()?);
    Ok(value * f.to_mg_per_l() / t.to_mg_per_l())
}

fn positive(v: f64, what: &'static str) -> Result<f64, UnitError> {
    if v > 0.0 && v.is_finite() {
        Ok(v)
    } else {
        Err(UnitError::NonPositive(what))
    }
}

/// Grams of fertilizer giving `concentration` in `volume_l` litres of solution.
pub fn mass_dose_g(concentration: f64, unit: &str, volume_l: f64) -> Result<f64, UnitError> {
    let unit: ConcentrationUnit = unit.parse()?;
    let volume_l = positive(volume_l, "solution volume")?;
    let mg = concentration * unit.to_mg_per_l() * volume_l;
    Ok(round_to(mg / 1000.0, 3))
}

/// Millilitres of a liquid product weighing `mass_g`.
pub fn volume_dose_ml(mass_g: f64, density_g_per_ml: f64) -> Result<f64, UnitError> {
    let density = positive(density_g_per_ml, "product density")?;
    Ok(round_to(mass_g / density, 3))
}

/// Concentration reached by dissolving `mass_g` into `volume_l` litres.
pub fn concentration_from_dose(mass_g: f64, volume_l: f64, unit: &str) -> Result<f64, UnitError> {
    let unit: ConcentrationUnit = unit.parse()?;
    let volume_l = positive(volume_l, "solution volume")?;
    let mg_per_l = mass_g * 1000.0 / volume_l;
    Ok(round_to(mg_per_l / unit.to_mg_per_l(), 3))
}

/// Litres of stock needed to make `final_volume_l` at `desired` (C1·V1 = C2·V2).
/// Both concentrations must share a unit.
pub fn dilution_volume_l(stock: f64, desired: f64, final_volume_l: f64) -> Result<f64, UnitError> {
    positive(stock, "stock concentration")?;
    positive(desired, "desired concentration")?;
    positive(final_volume_l, "final volume")?;
    if desired >= stock {
        return Err(UnitError::StockNotStronger { stock, desired });
    }
    Ok(round_to(desired * final_volume_l / stock, 3))
}

/// Concentration after mixing `(concentration, volume)` solutions that share a unit.
pub fn blend_concentrations(solutions: &[(f64, f64)]) -> Result<f64, UnitError> {
    if solutions.is_empty() {
        return Err(UnitError::Empty);
    }
    let mut total_volume = 0.0;
    let mut total_mass = 0.0;
    for &(c, v) in solutions {
        positive(v, "solution volume")?;
        total_volume += v;
        total_mass += c * v;
    }
    Ok(round_to(total_mass / total_volume, 3))
}
