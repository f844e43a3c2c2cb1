//! End-to-end checks of the `kigali-cli` binary: invokes the compiled
//! binary as a subprocess and inspects its exit code and output, the same
//! way a user would run it.

use std::io::Write;
use std::process::Command;

const VALID_SCRIPT: &str = r#"
    start default
      define application "Commercial Refrigeration"
        uses substance "HFC-134a"
          enable domestic
          initial charge with 1 kg / unit for domestic
          set domestic to 1000 kg during year 1
          retire 5 % each year
          equals 1430 kgCO2e / kg
        end substance
      end application
    end default

    start simulations
      simulate "BAU" from years 1 to 3
    end simulations
"#;

const BROKEN_SCRIPT: &str = r#"
    start default
      define application "Commercial Refrigeration"
        uses substance "HFC-134a"
          enable domestic
          bogus verb that does not exist
        end substance
      end application
    end default
"#;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_kigali-cli"))
}

fn write_script(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn validate_reports_success_and_scenario_names() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(&dir, "scenario.dsl", VALID_SCRIPT);

    let output = bin().arg("validate").arg(&script).output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("BAU"));
}

#[test]
fn validate_reports_parse_errors_with_exit_code_two() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(&dir, "broken.dsl", BROKEN_SCRIPT);

    let output = bin().arg("validate").arg(&script).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(!stderr.is_empty());
}

#[test]
fn run_writes_a_csv_with_the_expected_header() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(&dir, "scenario.dsl", VALID_SCRIPT);
    let out_csv = dir.path().join("out.csv");

    let output = bin().arg("run").arg(&script).arg("-o").arg(&out_csv).output().unwrap();
    assert_eq!(output.status.code(), Some(0));

    let contents = std::fs::read_to_string(&out_csv).unwrap();
    let mut lines = contents.lines();
    assert_eq!(
        lines.next().unwrap(),
        "scenario,trial,year,application,substance,domestic_kg,import_kg,export_kg,recycle_kg,population_units,priorPopulation_units,retired_units,rechargeEmissions_tCO2e,eolEmissions_tCO2e,exportEmissions_tCO2e,ghgConsumption_tCO2e,energy_kwh"
    );
    assert_eq!(lines.count(), 3);
}

#[test]
fn run_with_unknown_simulation_name_fails_before_running_anything() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(&dir, "scenario.dsl", VALID_SCRIPT);

    let output = bin().arg("run").arg(&script).arg("--simulation").arg("DoesNotExist").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn run_without_output_prints_a_terminal_summary() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(&dir, "scenario.dsl", VALID_SCRIPT);

    let output = bin().arg("run").arg(&script).output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Scenario"));
    assert!(stdout.contains("BAU"));
}
