//! Built-in registry for the 2018 commercial buildings survey microdata.

use crate::error::RebuildResult;
use crate::sql::TableRole;

use super::{ColumnRule as R, LookupSource, LookupSpec, MappingRegistry, TableMapping};

const BUILDINGS: &str = "buildings";

/// Codebook label tables: (table, variable order index).
const LABEL_TABLES: [(&str, u32); 8] = [
    ("principal_building_activity", 40),
    ("census_regions", 2),
    ("building_owner_type", 62),
    ("complex_type", 52),
    ("main_air_conditioning_type", 365),
    ("main_heating_equipment", 293),
    ("water_heating_equipment", 389),
    ("window_types", 556),
];

const ENERGY_SOURCE_INDICATORS: [&str; 11] = [
    "ELUSED", "NGUSED", "FKUSED", "PRUSED", "STUSED", "HWUSED", "CWUSED", "WOUSED", "COUSED",
    "SOUSED", "OTUSED",
];

const RENOVATIONS: [(&str, &str); 14] = [
    ("cosmetic_improvements", "RENCOS"),
    ("addition_or_annex", "RENADD"),
    ("reduced_floorspace", "RENRDC"),
    ("wall_reconfig", "RENINT"),
    ("roof_replace", "RENRFF"),
    ("window_replace", "RENWIN"),
    ("hvac_equip_upgrade", "RENHVC"),
    ("lighting_upgrade", "RENLGT"),
    ("plumbing_system_upgrade", "RENPLB"),
    ("electrical_upgrade", "RENELC"),
    ("insulation_upgrade", "RENINS"),
    ("fire_safety_upgrade", "RENSAF"),
    ("structural_upgrade", "RENSTR"),
    ("other_renovations", "RENOTH"),
];

const WATER_HEATING_FUELS: [(&str, &str); 10] = [
    ("electricity_used", "ELWATR"),
    ("natural_gas_used", "NGWATR"),
    ("fuel_oil_used", "FKWATR"),
    ("propane_used", "PRWATR"),
    ("district_steam_used", "STWATR"),
    ("district_hot_water_used", "HWWATR"),
    ("wood_used", "WOWATR"),
    ("coal_used", "COWATR"),
    ("solar_thermal_used", "SOWATR"),
    ("other_fuel_used", "OTWATR"),
];

const LIGHTING_SHARES: [(&str, &str); 7] = [
    ("percent_fluorescent", "FLUORP"),
    ("percent_compact_fluorescent", "CFLRP"),
    ("percent_incandescent", "BULBP"),
    ("percent_halogen", "HALOP"),
    ("percent_hid", "HIDP"),
    ("percent_led", "LEDP"),
    ("percent_other", "OTLTP"),
];

impl MappingRegistry {
    /// Registry covering every target table of the survey schema: 12 lookup tables and 11
    /// fact/junction tables keyed by the public building id (`PUBID`).
    pub fn survey_2018() -> RebuildResult<Self> {
        Self::new(survey_lookups(), survey_tables())
    }
}

fn survey_lookups() -> Vec<LookupSpec> {
    let mut lookups = vec![
        LookupSpec::new(
            "roof_construction_materials",
            LookupSource::Materials {
                section: "roofMatAvg".to_string(),
                name_column: "roof_construction_material".to_string(),
            },
        ),
        LookupSpec::new(
            "wall_construction_materials",
            LookupSource::Materials {
                section: "WallConstructionMaterial".to_string(),
                name_column: "wall_construction_material".to_string(),
            },
        ),
        LookupSpec::new("energy_sources", LookupSource::FuelSources),
    ];
    lookups.extend(
        LABEL_TABLES
            .iter()
            .map(|(table, order)| LookupSpec::new(table, LookupSource::CodebookLabels { order: *order })),
    );
    lookups.push(LookupSpec::new(
        "year_of_construction_category",
        LookupSource::CodebookRanges { order: 22 },
    ));
    lookups
}

fn building_id() -> R {
    R::int("building_id", "PUBID")
}

fn dependent(table: &str, rules: Vec<R>) -> TableMapping {
    TableMapping::new(table, TableRole::Dependent, "PUBID", rules).depends_on(&[BUILDINGS])
}

fn survey_tables() -> Vec<TableMapping> {
    let buildings = TableMapping::new(
        BUILDINGS,
        TableRole::Primary,
        "PUBID",
        vec![
            R::int("id", "PUBID"),
            R::code("census_region", "REGION", "census_regions"),
            R::code("principal_building_activity", "PBA", "principal_building_activity"),
            R::code("building_owner_type", "OWNTYPE", "building_owner_type"),
            R::int("square_footage", "SQFT"),
            R::code("wall_construction_material_id", "WLCNS", "wall_construction_materials"),
            R::code("roof_construction_material_id", "RFCNS", "roof_construction_materials"),
            R::code("type_of_complex", "FACACT", "complex_type"),
            R::code(
                "year_of_construction_category",
                "YRCONC",
                "year_of_construction_category",
            ),
        ],
    );

    let accessibility = dependent(
        "accessibility_modes",
        vec![
            building_id(),
            R::sentinel_text("number_of_floors", "NFLOOR", &[(994.0, "10-14"), (995.0, "15+")]),
            R::sentinel_text("number_of_elevators", "NELVTR", &[(995.0, "30+")]),
            R::sentinel_text("number_of_escalators", "NESLTR", &[(995.0, "10+")]),
        ],
    );

    let mut renovation_rules = vec![building_id()];
    renovation_rules.extend(RENOVATIONS.iter().map(|(t, s)| R::flag(t, s)));
    let renovations = dependent("renovations_since_2000", renovation_rules);

    let consumption = dependent(
        "annual_energy_consumption",
        vec![
            building_id(),
            R::int("electricity_consumption_thous_btu", "ELBTU"),
            R::int("electricity_expenditure_usd", "ELEXP"),
            R::int("natural_gas_consumption_thous_btu", "NGBTU"),
            R::int("natural_gas_expenditure_usd", "NGEXP"),
            R::int("fuel_oil_consumption_thous_btu", "FKBTU"),
            R::int("fuel_oil_expenditure_usd", "FKEXP"),
        ],
    );

    // Buildings without food service have all three topic columns empty.
    let food = dependent(
        "serves_food",
        vec![
            building_id(),
            R::int("food_service_seating", "FDSEAT"),
            R::flag("drive_thru_window", "DRVTHRU"),
            R::flag("food_court", "FDCOURT"),
        ],
    )
    .skip_when_all_null(&["FDSEAT", "DRVTHRU", "FDCOURT"]);

    // OPNMF codes 1 and 2 both mean "open on weekdays".
    let schedules = dependent(
        "schedules",
        vec![
            building_id(),
            R::flag_below("open_during_week", "OPNMF", 3.0),
            R::flag("open_on_weekend", "OPNWE"),
            R::int("total_hours_open_per_week", "WKHRS"),
            R::int("number_of_employees", "NWKER"),
        ],
    );

    let sources_used = dependent(
        "energy_sources_used",
        vec![
            building_id(),
            R::pivot(
                "energy_source",
                "energy_source_indicators",
                &ENERGY_SOURCE_INDICATORS,
                Some("energy_sources"),
            ),
        ],
    );

    let heating = dependent(
        "heating_and_ac_info",
        vec![
            building_id(),
            R::flag("has_smart_thermostat", "SMRTTHRM"),
            R::code("main_air_conditioning_type", "MAINCL", "main_air_conditioning_type"),
            R::code("main_heating_equipment_type", "MAINHT", "main_heating_equipment"),
        ],
    );

    let mut water_rules = vec![building_id()];
    water_rules.extend(WATER_HEATING_FUELS.iter().map(|(t, s)| R::flag(t, s)));
    water_rules.push(R::code(
        "water_heating_equipment_type",
        "WTHTEQ",
        "water_heating_equipment",
    ));
    let water = dependent("water_heating_info", water_rules);

    let windows = dependent(
        "window_information",
        vec![
            building_id(),
            R::code("window_type", "WINTYP", "window_types"),
            R::flag("has_reflective_windows", "REFL"),
            R::flag("has_tinted_windows", "TINT"),
        ],
    );

    let mut lighting_rules = vec![building_id()];
    lighting_rules.extend(LIGHTING_SHARES.iter().map(|(t, s)| R::rename(t, s)));
    lighting_rules.extend([
        R::flag("has_light_scheduling", "SCHED"),
        R::flag("has_occupancy_sensors", "OCSN"),
        R::rename("percent_building_receiving_enough_daylight", "DAYLTP"),
        R::rename("percent_building_lit_when_open", "LTOHRP"),
        R::rename("percent_building_lit_when_closed", "LTNHRP"),
        R::rename("percent_time_lights_off", "LTOFFP"),
    ]);
    let lighting = dependent("lighting_information", lighting_rules);

    vec![
        buildings,
        accessibility,
        renovations,
        consumption,
        food,
        schedules,
        sources_used,
        heating,
        water,
        windows,
        lighting,
    ]
}

#[cfg(test)]
mod tests {
    use crate::mapping::{MappingRegistry, RuleKind};
    use crate::sql::TableRole;

    #[test]
    fn survey_registry_validates_and_covers_all_tables() {
        let reg = MappingRegistry::survey_2018().unwrap();
        assert_eq!(reg.lookups().len(), 12);
        assert_eq!(reg.mappings().len(), 11);
        assert_eq!(
            reg.mappings()
                .iter()
                .filter(|m| m.role == TableRole::Primary)
                .count(),
            1
        );
    }

    #[test]
    fn energy_sources_used_pivots_eleven_indicators() {
        let reg = MappingRegistry::survey_2018().unwrap();
        let m = reg.mapping_for("energy_sources_used").unwrap();
        let pivot = m.rules.iter().find(|r| r.is_pivot()).unwrap();
        assert_eq!(pivot.sources.len(), 11);
        assert!(matches!(pivot.kind, RuleKind::PivotIndicator { .. }));
    }

    #[test]
    fn every_dependent_table_follows_buildings() {
        let reg = MappingRegistry::survey_2018().unwrap();
        let graph = reg.dependency_graph();
        for m in reg.mappings().iter().filter(|m| m.role == TableRole::Dependent) {
            assert!(
                graph.dependencies(&m.table).iter().any(|d| d == "buildings"),
                "{} does not depend on buildings",
                m.table
            );
        }
    }
}
