use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kigali_core::output::{write_csv, EngineResult};
use kigali_core::{run_monte_carlo, ParsedProgram};

#[derive(Parser)]
#[command(name = "kigali-cli", about = "Run and validate substance flow scenarios described in the DSL")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every (or a selected) scenario in a script and report its results.
    Run {
        /// Path to the DSL script.
        script: PathBuf,

        /// CSV file to write results to. Prints a terminal summary instead if omitted.
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Comma-separated list of scenario names to run. Runs every scenario if omitted.
        #[arg(long)]
        simulation: Option<String>,
    },

    /// Parse a script and report diagnostics without running it.
    Validate {
        /// Path to the DSL script.
        script: PathBuf,
    },
}

/// Exit codes from spec.md §6: 0 success, 2 parse errors, 3 runtime errors, 4 I/O errors.
const EXIT_OK: i32 = 0;
const EXIT_PARSE_ERROR: i32 = 2;
const EXIT_RUNTIME_ERROR: i32 = 3;
const EXIT_IO_ERROR: i32 = 4;

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let code = match &cli.command {
        Commands::Run { script, output, simulation } => {
            cmd_run(script, output.as_deref(), simulation.as_deref())
        }
        Commands::Validate { script } => cmd_validate(script),
    }
    .unwrap_or_else(|e| {
        eprintln!("error: {e:#}");
        EXIT_IO_ERROR
    });
    std::process::exit(code);
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn read_script(script: &std::path::Path) -> Result<String> {
    fs::read_to_string(script).with_context(|| format!("reading {}", script.display()))
}

fn cmd_validate(script: &std::path::Path) -> Result<i32> {
    let source = read_script(script)?;
    let parsed = kigali_core::parse_program(&source);

    if !parsed.is_ok() {
        for err in &parsed.errors {
            eprintln!("{err}");
        }
        return Ok(EXIT_PARSE_ERROR);
    }

    let program = parsed.program.expect("parse succeeded");
    println!("OK — {} scenario(s):", program.scenarios.len());
    for scenario in &program.scenarios {
        println!(
            "  {} ({} to {}, {} trial{})",
            scenario.name,
            scenario.year_start,
            scenario.year_end,
            scenario.trials,
            if scenario.trials == 1 { "" } else { "s" }
        );
    }
    Ok(EXIT_OK)
}

fn cmd_run(script: &std::path::Path, output: Option<&std::path::Path>, simulation: Option<&str>) -> Result<i32> {
    let source = read_script(script)?;
    let parsed = kigali_core::parse_program(&source);

    if !parsed.is_ok() {
        for err in &parsed.errors {
            eprintln!("{err}");
        }
        return Ok(EXIT_PARSE_ERROR);
    }
    let program = parsed.program.expect("parse succeeded");

    let selected = match selected_scenario_names(&program, simulation) {
        Ok(names) => names,
        Err(unknown) => {
            eprintln!("error: unknown scenario '{unknown}'");
            return Ok(EXIT_PARSE_ERROR);
        }
    };

    // spec.md §7: a scenario fails fast on its first error, but that does
    // not stop the other scenarios in the program from running.
    let mut all_rows: Vec<EngineResult> = Vec::new();
    let mut any_scenario_failed = false;
    for scenario in &program.scenarios {
        if let Some(names) = &selected {
            if !names.contains(&scenario.name) {
                continue;
            }
        }

        match run_monte_carlo(&program, scenario, None, |_progress| {}) {
            Ok(rows) => all_rows.extend(rows),
            Err(e) => {
                eprintln!("error running scenario '{}': {e}", scenario.name);
                any_scenario_failed = true;
            }
        }
    }

    match output {
        Some(path) => {
            let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
            write_csv(file, &all_rows).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Wrote {} row(s) to {}", all_rows.len(), path.display());
        }
        None => print_summary(&all_rows),
    }

    Ok(if any_scenario_failed { EXIT_RUNTIME_ERROR } else { EXIT_OK })
}

/// Parse `--simulation=<names>` into an allow-list, checked against the
/// program's actual scenario names. Returns the first unrecognized name as
/// `Err` so the caller can report it before any scenario runs (spec.md §6
/// "an unknown name is a hard error... reported before any scenario runs").
fn selected_scenario_names(program: &ParsedProgram, simulation: Option<&str>) -> std::result::Result<Option<Vec<String>>, String> {
    let Some(raw) = simulation else { return Ok(None) };
    let names: Vec<String> = raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    for name in &names {
        if !program.scenarios.iter().any(|s| &s.name == name) {
            return Err(name.clone());
        }
    }
    Ok(Some(names))
}

/// Terminal summary for the final simulated year of each scenario, the
/// direct analogue of the teacher's `print_summary` (SPEC_FULL.md §9).
fn print_summary(rows: &[EngineResult]) {
    println!(
        "{:<20} {:>6} {:<24} {:<16} {:>14} {:>16}",
        "Scenario", "Year", "Application", "Substance", "Population", "GhgConsumption(t)"
    );
    println!("{}", "-".repeat(100));

    let mut last_year_per_scenario: std::collections::HashMap<&str, i64> = std::collections::HashMap::new();
    for row in rows {
        let entry = last_year_per_scenario.entry(row.scenario.as_str()).or_insert(row.year);
        if row.year > *entry {
            *entry = row.year;
        }
    }

    for row in rows {
        if last_year_per_scenario.get(row.scenario.as_str()) != Some(&row.year) {
            continue;
        }
        println!(
            "{:<20} {:>6} {:<24} {:<16} {:>14.1} {:>16.1}",
            row.scenario, row.year, row.application, row.substance, row.population.value, row.ghg_consumption.value,
        );
    }
}
