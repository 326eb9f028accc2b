//! Recipe profiles: saved targets and catalog choice, overridable from the command line.

use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use nutrimix_core::NutrientVector;
use serde::{Deserialize, Serialize};

fn default_batch() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeProfile {
    /// mg/L per element.
    pub targets: NutrientVector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
    #[serde(default = "default_batch")]
    pub batch_liters: f64,
}

impl Default for RecipeProfile {
    fn default() -> Self {
        RecipeProfile {
            targets: NutrientVector::new(),
            catalog: None,
            batch_liters: default_batch(),
        }
    }
}

impl RecipeProfile {
    pub fn load(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile: {}", path.display()))?;
        serde_json::from_str(&txt).with_context(|| format!("Invalid profile JSON: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to save profile: {}", path.display()))
    }

    /// Apply command-line values on top of the profile (CLI wins).
    /// Targets merge per element.
    pub fn apply(
        &mut self,
        targets: &[(String, f64)],
        catalog: Option<&PathBuf>,
        batch_liters: Option<f64>,
    ) {
        for (el, mg) in targets {
            self.targets.insert(el.clone(), *mg);
        }
        if let Some(c) = catalog {
            self.catalog = Some(c.clone());
        }
        if let Some(b) = batch_liters {
            self.batch_liters = b;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.batch_liters.is_finite() && self.batch_liters > 0.0) {
            bail!("batch-liters must be > 0");
        }
        if let Some(el) = first_invalid(&self.targets) {
            bail!("target for {el} must be a non-negative number");
        }
        Ok(())
    }
}

fn first_invalid(v: &NutrientVector) -> Option<&str> {
    v.iter()
        .find(|(_, x)| !(x.is_finite() && **x >= 0.0))
        .map(|(el, _)| el.as_str())
}

/// Collect `--analysis` pairs, rejecting negative or non-finite fractions.
pub fn analysis_vector(pairs: Vec<(String, f64)>) -> Result<NutrientVector> {
    let analysis: NutrientVector = pairs.into_iter().collect();
    if let Some(el) = first_invalid(&analysis) {
        bail!("analysis for {el} must be a non-negative number");
    }
    Ok(analysis)
}

/// Parse `EL=VALUE` as used by `--target` and `--analysis`.
pub fn parse_pair(s: &str) -> Result<(String, f64)> {
    let (el, v) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected ELEMENT=VALUE, got '{s}'"))?;
    let el = el.trim();
    if el.is_empty() {
        bail!("missing element in '{s}'");
    }
    let v: f64 = v
        .trim()
        .parse()
        .with_context(|| format!("bad number in '{s}'"))?;
    Ok((el.to_string(), v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair("N=150").unwrap(), ("N".to_string(), 150.0));
        assert_eq!(parse_pair(" Fe = 2.5 ").unwrap(), ("Fe".to_string(), 2.5));
        assert!(parse_pair("N150").is_err());
        assert!(parse_pair("=3").is_err());
        assert!(parse_pair("K=lots").is_err());
    }

    #[test]
    fn test_cli_overrides_profile() {
        let mut p = RecipeProfile {
            targets: nutrimix_core::vector(&[("N", 100.0), ("K", 80.0)]),
            catalog: Some(PathBuf::from("saved.json")),
            batch_liters: 10.0,
        };
        p.apply(&[("K".to_string(), 120.0), ("Mg".to_string(), 20.0)], None, Some(5.0));

        assert_eq!(p.targets["N"], 100.0);
        assert_eq!(p.targets["K"], 120.0);
        assert_eq!(p.targets["Mg"], 20.0);
        assert_eq!(p.catalog, Some(PathBuf::from("saved.json")));
        assert_eq!(p.batch_liters, 5.0);
    }

    #[test]
    fn test_profile_json_defaults() {
        let p: RecipeProfile = serde_json::from_str(r#"{"targets":{"N":150.0}}"#).unwrap();
        assert_eq!(p.batch_liters, 1.0);
        assert!(p.catalog.is_none());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut p = RecipeProfile::default();
        p.batch_liters = 0.0;
        assert!(p.validate().is_err());

        let mut p = RecipeProfile::default();
        p.targets.insert("N".into(), -1.0);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_analysis_vector() {
        let a = analysis_vector(vec![("N".into(), 0.2), ("K".into(), 0.0)]).unwrap();
        assert_eq!(a, nutrimix_core::vector(&[("N", 0.2), ("K", 0.0)]));

        assert!(analysis_vector(vec![("N".into(), -0.33)]).is_err());
        assert!(analysis_vector(vec![("N".into(), f64::NAN)]).is_err());
        assert!(analysis_vector(vec![("P".into(), 0.1), ("K".into(), f64::INFINITY)]).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("nutrimix-profile-{}.json", std::process::id()));
        let p = RecipeProfile {
            targets: nutrimix_core::vector(&[("P", 50.0)]),
            catalog: None,
            batch_liters: 2.0,
        };
        p.save(&path).unwrap();
        let back = RecipeProfile::load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(back, p);
    }
}
