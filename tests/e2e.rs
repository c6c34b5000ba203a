//! End-to-end scenarios exercised only through the public `Facade` API,
//! matching the literal cases in spec §8 (E1-E6), in the teacher's
//! `tests/*_it.rs` convention of black-box integration coverage.

use qubectalk::{Facade, QubecError};

fn run(source: &str, scenario: &str) -> Vec<qubectalk::EngineResult> {
    let facade = Facade::default();
    facade.run_source(source, scenario).unwrap_or_else(|e| panic!("unexpected error: {e}"))
}

#[test]
fn e1_cap_in_mass() {
    let source = r#"
    start default
      define application "Refrigeration"
        uses substance "HFC-134a"
          set manufacture to 100 kg
          cap manufacture to 50 kg
          equals 5 tCO2e / mt
          emit 0.25 tCO2e
        end substance
      end application
    end default

    start simulations
      simulate "sim" from years 1 to 1
    end simulations
    "#;
    let results = run(source, "sim");
    assert_eq!(results.len(), 1);
    let row = &results[0];
    assert_eq!(row.manufacture, rust_decimal::Decimal::from(50));
    assert_eq!(row.emissions, rust_decimal::Decimal::new(25, 2));
}

#[test]
fn e2_percentage_cap_stacked_across_two_policies() {
    let source = r#"
    start default
      define application "AppA"
        uses substance "SubA"
          set manufacture to 100 mt
        end substance
      end application
      define application "AppB"
        uses substance "SubB"
          set manufacture to 100 mt
        end substance
      end application
    end default

    start policy "policyA"
      modify application "AppA"
        modify substance "SubA"
          cap manufacture to 50%
        end substance
      end application
    end policy

    start policy "policyB"
      modify application "AppB"
        modify substance "SubB"
          cap manufacture to 50%
        end substance
      end application
    end policy

    start simulations
      simulate "sim" using "policyA" then "policyB" from years 1 to 2
    end simulations
    "#;
    let results = run(source, "sim");
    assert_eq!(results.len(), 4);
    for row in &results {
        assert_eq!(row.manufacture, rust_decimal::Decimal::from(50_000));
    }
}

#[test]
fn e3_floor_with_displacement() {
    let source = r#"
    start default
      define application "App"
        uses substance "SubB"
          set manufacture to 100 kg
        end substance
        uses substance "SubA"
          initial charge with 10 kg for manufacture
          set manufacture to 10 kg
          floor manufacture to 10 units displacing "SubB" during year 1
        end substance
      end application
    end default

    start simulations
      simulate "sim" from years 1 to 1
    end simulations
    "#;
    let results = run(source, "sim");
    let sub_a = results.iter().find(|r| r.substance == "SubA").unwrap();
    let sub_b = results.iter().find(|r| r.substance == "SubB").unwrap();
    assert_eq!(sub_a.manufacture, rust_decimal::Decimal::from(100));
    assert_eq!(sub_b.manufacture, rust_decimal::Decimal::from(10));
}

#[test]
fn e4_replace_moves_mass_between_substances() {
    let source = r#"
    start default
      define application "App"
        uses substance "SubB"
          initial charge with 20 kg for manufacture
          set manufacture to 0 kg
        end substance
        uses substance "SubA"
          initial charge with 10 kg for manufacture
          set manufacture to 1000 units
          replace 1000 units of manufacture with "SubB" during years 5 to 10
        end substance
      end application
    end default

    start simulations
      simulate "sim" from years 5 to 10
    end simulations
    "#;
    let results = run(source, "sim");
    for year in 5..=10 {
        let sub_a = results.iter().find(|r| r.substance == "SubA" && r.year == year).unwrap();
        let sub_b = results.iter().find(|r| r.substance == "SubB" && r.year == year).unwrap();
        assert_eq!(sub_a.manufacture, rust_decimal::Decimal::from(0));
        assert_eq!(sub_b.manufacture, rust_decimal::Decimal::from(10_000));
    }
}

#[test]
fn e5_equals_is_order_independent() {
    let before = r#"
    start default
      define application "App"
        uses substance "Sub"
          equals 5 tCO2e / mt
          set manufacture to 100 kg
        end substance
      end application
    end default
    start simulations
      simulate "sim" from years 1 to 1
    end simulations
    "#;
    let after = r#"
    start default
      define application "App"
        uses substance "Sub"
          set manufacture to 100 kg
          equals 5 tCO2e / mt
        end substance
      end application
    end default
    start simulations
      simulate "sim" from years 1 to 1
    end simulations
    "#;
    assert_eq!(run(before, "sim"), run(after, "sim"));
}

#[test]
fn e6_parse_error_line_capture() {
    let facade = Facade::default();
    let err = facade.load("invalid code").unwrap_err();
    match err {
        QubecError::Parse(errors) => {
            assert!(!errors.is_empty());
            assert!(errors.iter().all(|e| e.line >= 1));
        }
        other => panic!("expected a Parse error, got {other:?}"),
    }
}

#[test]
fn sales_equals_manufacture_plus_import_minus_export() {
    let source = r#"
    start default
      define application "App"
        uses substance "Sub"
          set manufacture to 100 kg
          set import to 20 kg
          set export to 5 kg
        end substance
      end application
    end default
    start simulations
      simulate "sim" from years 1 to 1
    end simulations
    "#;
    let results = run(source, "sim");
    let row = &results[0];
    assert_eq!(row.sales, row.manufacture + row.import - row.export);
}

#[test]
fn result_row_serializes_round_trip() {
    let source = r#"
    start default
      define application "App"
        uses substance "Sub"
          set manufacture to 1 kg
        end substance
      end application
    end default
    start simulations
      simulate "sim" from years 1 to 1
    end simulations
    "#;
    let results = run(source, "sim");
    let json = serde_json::to_string(&results[0]).expect("result row serializes to JSON");
    let back: qubectalk::EngineResult = serde_json::from_str(&json).expect("result row round-trips through JSON");
    assert_eq!(back, results[0]);
}

#[test]
fn result_row_count_matches_year_span() {
    let source = r#"
    start default
      define application "App"
        uses substance "Sub"
          set manufacture to 1 kg
        end substance
      end application
    end default
    start simulations
      simulate "sim" from years 2000 to 2005
    end simulations
    "#;
    let results = run(source, "sim");
    assert_eq!(results.len(), 6);
}
