use codebook_sql::RebuildError;
use codebook_sql::codebook::{Codebook, CodebookVariable};
use codebook_sql::engine::{EngineOptions, ScriptEngine, SourceInputs};
use codebook_sql::ingestion::SupplementaryData;
use codebook_sql::mapping::MappingRegistry;
use codebook_sql::sql::{ClearMode, TableRole};
use codebook_sql::transform::FaultMode;
use codebook_sql::types::{DataSet, Schema, Value};

const REGISTRY: &str = r#"{
    "lookups": [
        {"table": "census_regions", "source": {"kind": "codebook_labels", "order": 2}},
        {"table": "roof_construction_materials",
         "source": {"kind": "materials", "section": "roofMatAvg", "name_column": "roof_construction_material"}},
        {"table": "energy_sources", "source": {"kind": "fuel_sources"}}
    ],
    "tables": [
        {"table": "energy_sources_used", "row_id": "PUBID", "depends_on": ["buildings"], "rules": [
            {"target": "building_id", "sources": ["PUBID"], "kind": "int_cast"},
            {"target": "energy_source", "sources": ["ELUSED", "NGUSED"], "kind": "pivot_indicator",
             "group": "energy_source_indicators", "references": "energy_sources"}
        ]},
        {"table": "serves_food", "row_id": "PUBID", "depends_on": ["buildings"],
         "skip_when_all_null": ["FDSEAT", "DRVTHRU"], "rules": [
            {"target": "building_id", "sources": ["PUBID"], "kind": "int_cast"},
            {"target": "food_service_seating", "sources": ["FDSEAT"], "kind": "int_cast"},
            {"target": "drive_thru_window", "sources": ["DRVTHRU"], "kind": "bool_flag"}
        ]},
        {"table": "buildings", "role": "primary", "row_id": "PUBID", "rules": [
            {"target": "id", "sources": ["PUBID"], "kind": "int_cast"},
            {"target": "census_region", "sources": ["REGION"], "kind": "int_cast", "references": "census_regions"},
            {"target": "roof_construction_material_id", "sources": ["RFCNS"], "kind": "int_cast",
             "references": "roof_construction_materials"},
            {"target": "square_footage", "sources": ["SQFT"], "kind": "rename"}
        ]}
    ]
}"#;

const SUPPLEMENTARY: &str = r#"{
    "roofMatAvg": {
        "1": {"name": "Built-up", "unit": "sqft", "cost": 5.5},
        "2": {"name": "Metal surfacing", "unit": "sqft", "cost": 9}
    },
    "EnergySources": {
        "FuelSource": {
            "Electricity": {"unit": "lb/MWh", "AverageCarbonOutput": 852.3},
            "Natural gas": {"unit": "lb/MMBtu", "AverageCarbonOutput": 117}
        }
    }
}"#;

fn registry() -> MappingRegistry {
    MappingRegistry::from_json_str(REGISTRY).unwrap()
}

fn codebook() -> Codebook {
    Codebook::new([
        CodebookVariable::new(1, "PUBID", "1 - 6436"),
        CodebookVariable::new(2, "REGION", "1=Northeast\n2=Midwest\n3=South\n4=West"),
    ])
}

fn supplementary() -> SupplementaryData {
    SupplementaryData::from_json_str(SUPPLEMENTARY).unwrap()
}

fn row(pubid: f64, region: f64, rfcns: f64, sqft: Value, el: f64, ng: f64, seat: Value, drive: Value) -> Vec<Value> {
    vec![
        Value::Float64(pubid),
        Value::Float64(region),
        Value::Float64(rfcns),
        sqft,
        Value::Float64(el),
        Value::Float64(ng),
        seat,
        drive,
    ]
}

fn dataset() -> DataSet {
    DataSet::new(
        Schema::numeric(["PUBID", "REGION", "RFCNS", "SQFT", "ELUSED", "NGUSED", "FDSEAT", "DRVTHRU"]),
        vec![
            row(1.0, 3.0, 1.0, Value::Float64(40000.0), 1.0, 1.0, Value::Float64(80.0), Value::Float64(2.0)),
            row(2.0, 1.0, 2.0, Value::Float64(12.5), 1.0, 0.0, Value::Null, Value::Null),
            row(3.0, 4.0, 2.0, Value::Null, 0.0, 0.0, Value::Null, Value::Float64(1.0)),
        ],
    )
}

fn generate(options: EngineOptions, ds: &DataSet) -> Result<codebook_sql::engine::GeneratedScript, RebuildError> {
    let cb = codebook();
    let sup = supplementary();
    ScriptEngine::new(registry(), options)?.generate(&SourceInputs {
        dataset: ds,
        codebook: &cb,
        supplementary: Some(&sup),
    })
}

#[test]
fn full_script_matches_expected_text() {
    let script = generate(EngineOptions::default(), &dataset()).unwrap();
    let expected = "\
-- Insert into census_regions
TRUNCATE TABLE census_regions CASCADE;
INSERT INTO census_regions (id, label)
VALUES
(1, 'Northeast'),
(2, 'Midwest'),
(3, 'South'),
(4, 'West');

-- Insert into roof_construction_materials
TRUNCATE TABLE roof_construction_materials CASCADE;
INSERT INTO roof_construction_materials (id, roof_construction_material, average_cost, unit)
VALUES
(1, 'Built-up', 5.5, 'sqft'),
(2, 'Metal surfacing', 9, 'sqft');

-- Insert into energy_sources
TRUNCATE TABLE energy_sources CASCADE;
INSERT INTO energy_sources (id, fuel_source, average_carbon_output, unit)
VALUES
(1, 'Electricity', 852.3, 'lb/MWh'),
(2, 'Natural gas', 117, 'lb/MMBtu');

-- Insert into buildings
TRUNCATE TABLE buildings CASCADE;
INSERT INTO buildings (id, census_region, roof_construction_material_id, square_footage)
VALUES
(1, 3, 1, 40000.0),
(2, 1, 2, 12.5),
(3, 4, 2, NULL);

-- Insert into energy_sources_used
TRUNCATE TABLE energy_sources_used CASCADE;
INSERT INTO energy_sources_used (building_id, energy_source)
VALUES
(1, 1),
(1, 2),
(2, 1);

-- Insert into serves_food
TRUNCATE TABLE serves_food CASCADE;
INSERT INTO serves_food (building_id, food_service_seating, drive_thru_window)
VALUES
(1, 80, 'False'),
(3, NULL, 'True');

";
    assert_eq!(script.text, expected);

    let order: Vec<(&str, TableRole)> = script
        .report
        .tables
        .iter()
        .map(|t| (t.table.as_str(), t.role))
        .collect();
    assert_eq!(order[3], ("buildings", TableRole::Primary));
    let food = script.report.table("serves_food").unwrap();
    assert_eq!((food.rows_seen, food.rows_skipped, food.tuples), (3, 1, 2));
    assert_eq!(script.report.table("energy_sources_used").unwrap().tuples, 3);
}

#[test]
fn repeated_runs_are_byte_identical() {
    let ds = dataset();
    let first = generate(EngineOptions::default(), &ds).unwrap();
    let second = generate(EngineOptions::default(), &ds).unwrap();
    assert_eq!(first.text, second.text);
}

#[test]
fn parallel_generation_matches_sequential() {
    let ds = dataset();
    let sequential = generate(EngineOptions::default(), &ds).unwrap();
    let parallel = generate(
        EngineOptions {
            parallel: true,
            num_threads: Some(3),
            ..EngineOptions::default()
        },
        &ds,
    )
    .unwrap();
    assert_eq!(sequential.text, parallel.text);
    assert_eq!(sequential.report, parallel.report);
}

#[test]
fn empty_table_renders_clear_statement_only() {
    let ds = DataSet::new(dataset().schema.clone(), vec![]);
    let script = generate(
        EngineOptions {
            clear_mode: ClearMode::Delete,
            ..EngineOptions::default()
        },
        &ds,
    )
    .unwrap();
    assert!(script.text.contains("-- Insert into buildings\nDELETE FROM buildings;\n\n"));
    assert!(!script.text.contains("INSERT INTO buildings"));
    assert!(script.text.contains("INSERT INTO census_regions"));
}

#[test]
fn unknown_code_fails_the_run_with_row_context() {
    let mut ds = dataset();
    ds.rows[1][1] = Value::Float64(9.0);
    let err = generate(EngineOptions::default(), &ds).unwrap_err();
    match err {
        RebuildError::UnknownCode {
            table,
            row_id,
            column,
            code,
            lookup,
        } => {
            assert_eq!(table, "buildings");
            assert_eq!(row_id.as_deref(), Some("2"));
            assert_eq!(column, "census_region");
            assert_eq!(code, 9);
            assert_eq!(lookup, "census_regions");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn collect_mode_reports_every_faulty_row() {
    let mut ds = dataset();
    ds.rows[0][0] = Value::Float64(1.5);
    ds.rows[2][2] = Value::Float64(7.0);
    let err = generate(
        EngineOptions {
            fault_mode: FaultMode::Collect,
            tables: Some(vec!["buildings".to_string()]),
            ..EngineOptions::default()
        },
        &ds,
    )
    .unwrap_err();
    match err {
        RebuildError::RowFaults { table, faults } => {
            assert_eq!(table, "buildings");
            let rows: Vec<Option<&str>> = faults.iter().map(|f| f.row_id()).collect();
            assert_eq!(rows, vec![Some("1.5"), Some("3")]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unchecked_references_accept_unknown_codes() {
    let mut ds = dataset();
    ds.rows[1][1] = Value::Float64(9.0);
    let script = generate(
        EngineOptions {
            check_references: false,
            ..EngineOptions::default()
        },
        &ds,
    )
    .unwrap();
    assert!(script.text.contains("(2, 9, 2, 12.5)"));
}

#[test]
fn missing_supplementary_document_is_reported() {
    let ds = dataset();
    let cb = codebook();
    let err = ScriptEngine::new(registry(), EngineOptions::default())
        .unwrap()
        .generate(&SourceInputs {
            dataset: &ds,
            codebook: &cb,
            supplementary: None,
        })
        .unwrap_err();
    assert!(matches!(err, RebuildError::MissingReferenceData { .. }));
}

#[test]
fn built_in_survey_registry_is_consistent() {
    let registry = MappingRegistry::survey_2018().unwrap();
    assert_eq!(registry.lookups().len(), 12);
    assert_eq!(registry.mappings().len(), 11);
    let graph = registry.dependency_graph();
    assert_eq!(graph.role("buildings"), Some(TableRole::Primary));
    assert!(graph.dependencies("energy_sources_used").iter().any(|d| d == "buildings"));
    assert!(registry.source_schema().index_of("PUBID").is_some());

    let round_trip = MappingRegistry::from_json_str(&registry.to_json_string().unwrap()).unwrap();
    assert_eq!(round_trip, registry);
}
