//! End-to-end check of spec.md §8 Scenario 4: a "Replacement" policy that
//! diverts all new manufacture from a high-GWP substance to a low-GWP
//! substitute should leave total sales volume and total equipment
//! population unchanged relative to business-as-usual, while strictly
//! lowering total recharge emissions.

use kigali_core::parser::parse_program;
use kigali_core::runner::run_scenario;
use kigali_core::EngineResult;

const YEAR_START: i64 = 1;
const YEAR_END: i64 = 10;

fn script() -> String {
    format!(
        r#"
        start default
          define application "Commercial Refrigeration"
            uses substance "HFC-134a"
              enable domestic
              initial charge with 1 kg / unit for domestic
              retire 5 % each year
              recharge 10 % each year with 0.5 kg / unit
              equals 1430 kgCO2e / kg
              set domestic to 1000 kg during years {start} to {end}
            end substance
            uses substance "R-600a"
              enable domestic
              initial charge with 1 kg / unit for domestic
              retire 5 % each year
              recharge 10 % each year with 0.5 kg / unit
              equals 3 kgCO2e / kg
            end substance
          end application
        end default

        start policy "Replacement"
          modify application "Commercial Refrigeration"
            modify substance "HFC-134a"
              cap domestic to 0 kg displacing "R-600a" during years {start} to {end}
            end substance
          end application
        end policy

        start simulations
          simulate "BAU" from years {start} to {end}
          simulate "Replacement" using "Replacement" from years {start} to {end}
        end simulations
    "#,
        start = YEAR_START,
        end = YEAR_END
    )
}

fn run(program: &kigali_core::ParsedProgram, scenario_name: &str) -> Vec<EngineResult> {
    let scenario = program.scenarios.iter().find(|s| s.name == scenario_name).unwrap();
    run_scenario(program, scenario, 0, None).collect::<Result<Vec<_>, _>>().unwrap()
}

fn totals(rows: &[EngineResult]) -> (f64, f64, f64) {
    let mut sales = 0.0;
    let mut recharge_emissions = 0.0;
    let last_year_population: f64 = rows
        .iter()
        .filter(|r| r.year == YEAR_END)
        .map(|r| r.population.value)
        .sum();
    for r in rows {
        sales += r.sales.value;
        recharge_emissions += r.recharge_emissions.value;
    }
    (sales, last_year_population, recharge_emissions)
}

#[test]
fn replacement_conserves_sales_and_population_but_lowers_recharge_emissions() {
    let result = parse_program(&script());
    assert!(result.errors.is_empty(), "unexpected parse errors: {:?}", result.errors);
    let program = result.program.unwrap();
    assert_eq!(program.scenarios.len(), 2);

    let bau_rows = run(&program, "BAU");
    let replacement_rows = run(&program, "Replacement");

    let (bau_sales, bau_population, bau_recharge_emissions) = totals(&bau_rows);
    let (replacement_sales, replacement_population, replacement_recharge_emissions) = totals(&replacement_rows);

    assert!(
        (bau_sales - replacement_sales).abs() < 1e-6,
        "total sales volume should be identical: BAU={bau_sales} Replacement={replacement_sales}"
    );
    assert!(
        (bau_population - replacement_population).abs() < 1e-6,
        "year {YEAR_END} equipment population should be identical: BAU={bau_population} Replacement={replacement_population}"
    );
    assert!(
        bau_recharge_emissions > replacement_recharge_emissions,
        "BAU (GWP 1430) should emit strictly more from recharge than Replacement (GWP 3): BAU={bau_recharge_emissions} Replacement={replacement_recharge_emissions}"
    );
}
