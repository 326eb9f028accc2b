mod catalog;
mod profile;

use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use nutrimix_core::{
    Allocation, Decomposition, Product, RecipeResult, allocate_traced,
    decompose_named, delivered, known_compounds, scale_recipe, units,
};
use serde::Serialize;
use tracing::debug;

use crate::catalog::{demo_catalog, demo_targets, load_catalog};
use crate::profile::{RecipeProfile, analysis_vector, parse_pair};

#[derive(Parser, Debug)]
#[command(
    name = "nutrimix",
    about = "Plan fertigation recipes and estimate label compositions.",
    version
)]
struct Cli {
    /// Log each allocation step
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Cheapest greedy recipe meeting per-litre element targets
    Recipe {
        /// Target as ELEMENT=MG_PER_L (repeatable), e.g. N=150
        #[arg(long = "target", value_parser = parse_target)]
        targets: Vec<(String, f64)>,

        /// Product catalog JSON (defaults to a built-in five-salt catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Scale the per-litre recipe to this many litres
        #[arg(long)]
        batch_liters: Option<f64>,

        /// Load a profile JSON before applying CLI overrides
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Save the effective targets/catalog/batch to a profile JSON
        #[arg(long)]
        save_profile: Option<PathBuf>,

        /// Show each greedy step
        #[arg(long)]
        explain: bool,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Estimate ingredient fractions from a guaranteed analysis
    Decompose {
        /// Guaranteed analysis as ELEMENT=FRACTION (repeatable), e.g. N=0.2
        #[arg(long = "analysis", value_parser = parse_target, required = true)]
        analysis: Vec<(String, f64)>,

        /// Candidate ingredients in priority order
        #[arg(required = true)]
        ingredients: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Convert a mass or volume between units (g, kg, oz, lb, mL, L, gal, fl_oz)
    Convert { value: f64, from: String, to: String },

    /// Grams (and mL, given a density) needed for a concentration
    Dose {
        concentration: f64,
        /// mg/L, ppm, g/L or oz/gal
        unit: String,
        /// Solution volume in litres
        #[arg(long, default_value_t = 1.0)]
        volume_l: f64,
        /// Product density in g/mL
        #[arg(long)]
        density: Option<f64>,
    },

    /// List the built-in ingredient reference table
    Compounds,
}

fn parse_target(s: &str) -> Result<(String, f64), String> {
    parse_pair(s).map_err(|e| e.to_string())
}

fn fmt_num(x: f64, places: usize) -> String {
    let s = format!("{x:.places$}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" { "0".to_string() } else { s.to_string() }
}

fn header(cols: &[&str]) -> Vec<Cell> {
    cols.iter()
        .map(|c| Cell::new(c).add_attribute(Attribute::Bold))
        .collect()
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

#[derive(Serialize)]
struct RecipeReport<'a> {
    generated_at: String,
    batch_liters: f64,
    #[serde(flatten)]
    allocation: &'a Allocation,
    batch: Option<RecipeResult>,
}

fn run_recipe(
    profile: &RecipeProfile,
    products: &[Product],
    explain: bool,
    json: bool,
) -> Result<()> {
    let allocation = allocate_traced(&profile.targets, products)?;
    let batch = (profile.batch_liters != 1.0)
        .then(|| scale_recipe(&allocation.recipe, products, profile.batch_liters));

    if json {
        let report = RecipeReport {
            generated_at: Local::now().to_rfc3339(),
            batch_liters: profile.batch_liters,
            allocation: &allocation,
            batch,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let recipe = &allocation.recipe;
    let shown = batch.as_ref().unwrap_or(recipe);

    let mut table = new_table();
    table.set_header(header(&["Product", "Dose", "Cost"]));
    for e in &shown.ingredients {
        table.add_row(vec![
            Cell::new(&e.product),
            Cell::new(format!("{} {}", fmt_num(e.dose, 4), e.unit)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", e.cost)).set_alignment(CellAlignment::Right),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(format!("{} L", fmt_num(shown.total_volume, 3))).set_alignment(CellAlignment::Right),
        Cell::new(format!("{:.2}", shown.total_cost))
            .add_attribute(Attribute::Bold)
            .set_alignment(CellAlignment::Right),
    ]);

    println!(
        "\n=== Recipe for {} L ({}) ===",
        fmt_num(profile.batch_liters, 3),
        Local::now().format("%Y-%m-%d %H:%M")
    );
    println!("{table}");

    // Delivered vs target, per litre.
    let got = delivered(recipe, products);
    let mut check = new_table();
    check.set_header(header(&["Element", "Target mg/L", "Delivered mg/L"]));
    for (el, target) in profile.targets.iter().filter(|(_, t)| **t > 0.0) {
        check.add_row(vec![
            Cell::new(el),
            Cell::new(fmt_num(*target, 3)).set_alignment(CellAlignment::Right),
            Cell::new(fmt_num(got.get(el).copied().unwrap_or(0.0), 3))
                .set_alignment(CellAlignment::Right),
        ]);
    }
    println!("\n=== Targets ===");
    println!("{check}");

    if explain {
        let mut steps = new_table();
        steps.set_header(header(&["#", "Element", "Need mg", "Product", "Dose", "Cost/mg"]));
        for (i, s) in allocation.steps.iter().enumerate() {
            steps.add_row(vec![
                Cell::new(i + 1),
                Cell::new(&s.element),
                Cell::new(fmt_num(s.need_mg, 3)),
                Cell::new(&s.product),
                Cell::new(format!("{} {}", fmt_num(s.dose, 4), s.unit)),
                Cell::new(format!("{:.3e}", s.cost_per_mg)),
            ]);
        }
        println!("\n=== Steps (largest target first) ===");
        println!("{steps}");
    }

    println!("\nNotes:");
    println!("• Greedy heuristic: cheapest source per element, not a global optimum.");
    println!("• Mixing compatibility (e.g. calcium with sulfates/phosphates) is not checked.");
    Ok(())
}

fn print_decomposition(d: &Decomposition) {
    let mut table = new_table();
    table.set_header(header(&["Ingredient", "Estimated fraction"]));
    for e in &d.estimates {
        table.add_row(vec![
            Cell::new(&e.ingredient),
            Cell::new(format!("{:.2} %", e.fraction * 100.0)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("\n=== Estimated composition ===");
    println!("{table}");

    let left: Vec<String> = d
        .remaining
        .iter()
        .filter(|(_, v)| **v > 0.0)
        .map(|(el, v)| format!("{el}={}", fmt_num(*v, 4)))
        .collect();
    if !left.is_empty() {
        println!("Unexplained: {}", left.join(", "));
    }
    println!("\nNote: heuristic attribution; fractions need not sum to 100 %.");
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match cli.command {
        Commands::Recipe {
            targets,
            catalog,
            batch_liters,
            profile,
            save_profile,
            explain,
            json,
        } => {
            let mut effective = match &profile {
                Some(path) => RecipeProfile::load(path)?,
                None => RecipeProfile::default(),
            };
            effective.apply(&targets, catalog.as_ref(), batch_liters);
            if effective.targets.is_empty() {
                debug!("no targets given, using demo targets");
                effective.targets = demo_targets();
            }
            effective.validate()?;

            if let Some(path) = &save_profile {
                effective.save(path)?;
                println!("Profile saved to {}", path.display());
            }

            let products = match &effective.catalog {
                Some(path) => load_catalog(path)?,
                None => demo_catalog(),
            };
            debug!(products = products.len(), "catalog loaded");

            run_recipe(&effective, &products, explain, json)?;
        }

        Commands::Decompose {
            analysis,
            ingredients,
            json,
        } => {
            let analysis = analysis_vector(analysis)?;
            let d = decompose_named(&analysis, ingredients.as_slice(), &known_compounds());
            if json {
                println!("{}", serde_json::to_string_pretty(&d)?);
            } else {
                print_decomposition(&d);
            }
        }

        Commands::Convert { value, from, to } => {
            let out = units::convert(value, &from, &to)?;
            println!("{} {from} = {} {to}", fmt_num(value, 4), fmt_num(out, 4));
        }

        Commands::Dose {
            concentration,
            unit,
            volume_l,
            density,
        } => {
            let grams = units::mass_dose_g(concentration, &unit, volume_l)?;
            println!(
                "{} {unit} in {} L → {} g",
                fmt_num(concentration, 3),
                fmt_num(volume_l, 3),
                fmt_num(grams, 3)
            );
            if let Some(d) = density {
                println!("  = {} mL at {} g/mL", fmt_num(units::volume_dose_ml(grams, d)?, 3), d);
            }
        }

        Commands::Compounds => {
            let mut table = new_table();
            table.set_header(header(&["Compound", "Analysis (% w/w)"]));
            for c in known_compounds() {
                let analysis: Vec<String> =
                    c.analysis.iter().map(|(el, pct)| format!("{el} {pct}")).collect();
                table.add_row(vec![Cell::new(&c.name), Cell::new(analysis.join(", "))]);
            }
            println!("{table}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fmt_num_trims() {
        assert_eq!(fmt_num(1.5000, 4), "1.5");
        assert_eq!(fmt_num(2.0, 3), "2");
        assert_eq!(fmt_num(0.0, 3), "0");
        assert_eq!(fmt_num(0.0334, 4), "0.0334");
    }

    #[test]
    fn test_parse_recipe_args() {
        let cli = Cli::parse_from([
            "nutrimix", "recipe", "--target", "N=150", "--target", "K=90", "--batch-liters", "20",
        ]);
        match cli.command {
            Commands::Recipe {
                targets,
                batch_liters,
                ..
            } => {
                assert_eq!(targets, vec![("N".to_string(), 150.0), ("K".to_string(), 90.0)]);
                assert_eq!(batch_liters, Some(20.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_bad_target_rejected() {
        assert!(Cli::try_parse_from(["nutrimix", "recipe", "--target", "N150"]).is_err());
    }

    #[test]
    fn test_negative_analysis_rejected() {
        let cli = Cli::parse_from([
            "nutrimix", "decompose", "--analysis", "N=-0.33", "Ammonium Nitrate",
        ]);
        match cli.command {
            Commands::Decompose { analysis, .. } => assert!(analysis_vector(analysis).is_err()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
