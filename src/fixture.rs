//! Fixtures for tests

use crate::config::{AdvancedSection, ScenarioConfig, ScenarioSection, SolverSection};
use crate::formulation::Formulation;
use crate::model::Model;
use crate::model::parameters::{CarryForward, YearParameters};
use crate::model::sets::ModelSets;
use crate::network::{Interconnector, Network};
use crate::region::{Region, RegionID, RegionMap, Zone, ZoneID, ZoneMap};
use crate::technology::{
    CapacityClass, DEFAULT_BUILD_LIMIT, Technology, TechnologyID, TechnologyKind, TechnologyMap,
    TechnologyTag, ZoneTechnology, ZoneTechnologyMap, default_commitment, parse_tags,
};
use crate::timeline::{Timeline, parse_timestamp};
use crate::trace::{SampledTraces, Series, Traces, ZoneDemandFactor};
use crate::units::{
    Capacity, Dimensionless, FuelPerEnergy, Money, MoneyPerCapacity, MoneyPerEnergy, MoneyPerFuel,
};
use chrono::{Duration, NaiveDateTime};
use indexmap::indexmap;
use rstest::fixture;
use std::path::PathBuf;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

#[fixture]
pub fn regions() -> RegionMap {
    indexmap! {
        RegionID(1) => Region { id: RegionID(1), name: "NSW".into() },
        RegionID(2) => Region { id: RegionID(2), name: "QLD".into() },
    }
}

#[fixture]
pub fn zones() -> ZoneMap {
    [(1, "NCEN", 1), (2, "NNS", 1), (3, "SEQ", 2)]
        .into_iter()
        .map(|(id, name, region)| {
            (
                ZoneID(id),
                Zone {
                    id: ZoneID(id),
                    name: name.into(),
                    region_id: RegionID(region),
                },
            )
        })
        .collect()
}

/// A technology with round-number costs
pub fn technology(id: u32, name: &str, tags: &str, kind: TechnologyKind) -> Technology {
    let tags = parse_tags(tags).unwrap();
    let capacity_class = CapacityClass::new(
        !tags.contains(&TechnologyTag::NoBuild),
        tags.contains(&TechnologyTag::Retireable),
    );
    let commitment = tags
        .contains(&TechnologyTag::Commitment)
        .then(|| default_commitment(TechnologyID(id)).unwrap());
    let fuel = tags.contains(&TechnologyTag::Fuel);
    let variable = tags.contains(&TechnologyTag::Renewable) || tags.contains(&TechnologyTag::Hybrid);

    Technology {
        id: TechnologyID(id),
        name: name.into(),
        tags,
        kind,
        capacity_class,
        lifetime: 30,
        build_cost: MoneyPerCapacity(1000.0),
        cost_fom: MoneyPerCapacity(10_000.0),
        cost_vom: MoneyPerEnergy(if fuel { 5.0 } else { 0.0 }),
        cost_retire: MoneyPerCapacity(60_000.0),
        emit_rate: if fuel { 800.0 } else { 0.0 },
        default_capacity_factor: Dimensionless(if variable { 0.0 } else { 1.0 }),
        commitment,
    }
}

#[fixture]
pub fn technologies() -> TechnologyMap {
    [
        technology(8, "ocgt", "fuel;dispatchable", TechnologyKind::Generator),
        technology(
            2,
            "ccgt",
            "fuel;commitment;dispatchable;retireable",
            TechnologyKind::Generator,
        ),
        technology(12, "wind", "renewable", TechnologyKind::Generator),
        technology(11, "solar", "renewable", TechnologyKind::Generator),
        technology(
            15,
            "battery",
            "storage",
            TechnologyKind::Storage {
                round_trip_efficiency: Dimensionless(0.8),
                charge_hours: 2.0,
            },
        ),
        technology(
            13,
            "cst",
            "hybrid;renewable_dispatchable",
            TechnologyKind::Hybrid {
                collector_multiple: Dimensionless(2.0),
                charge_hours: 6.0,
            },
        ),
        technology(
            18,
            "hydro",
            "renewable_dispatchable;dispatchable;no_build",
            TechnologyKind::Generator,
        ),
    ]
    .into_iter()
    .map(|tech| (tech.id, tech))
    .collect()
}

/// A declared (zone, technology) pair with default costs
pub fn zone_technology(zone: u32, technology: u32, fuel: bool) -> ZoneTechnology {
    ZoneTechnology {
        zone_id: ZoneID(zone),
        technology_id: TechnologyID(technology),
        build_cost: MoneyPerCapacity(1000.0),
        fuel_price: MoneyPerFuel(if fuel { 5.0 } else { 0.0 }),
        heat_rate: FuelPerEnergy(if fuel { 10.0 } else { 0.0 }),
        build_limit: Capacity(DEFAULT_BUILD_LIMIT),
    }
}

#[fixture]
pub fn zone_technologies() -> ZoneTechnologyMap {
    [
        (1, 8, true),
        (1, 12, false),
        (1, 15, false),
        (1, 2, true),
        (2, 12, false),
        (2, 11, false),
        (2, 13, false),
        (3, 8, true),
        (3, 18, false),
    ]
    .into_iter()
    .map(|(zone, tech, fuel)| ((ZoneID(zone), TechnologyID(tech)), zone_technology(zone, tech, fuel)))
    .collect()
}

/// A lossless link with a 500 MW limit
pub fn interconnector(source: u32, dest: u32) -> Interconnector {
    Interconnector {
        zone_source: ZoneID(source),
        zone_dest: ZoneID(dest),
        loss: Dimensionless(0.0),
        limit: Capacity(500.0),
        build_cost: MoneyPerCapacity(2000.0),
    }
}

#[fixture]
pub fn network(zones: ZoneMap) -> Network {
    Network::new(
        [
            interconnector(1, 2),
            interconnector(2, 1),
            interconnector(2, 3),
            interconnector(3, 2),
        ],
        &zones,
    )
    .unwrap()
}

#[fixture]
pub fn scenario_config() -> ScenarioConfig {
    ScenarioConfig {
        scenario: ScenarioSection {
            name: "test".into(),
            description: String::new(),
            years: vec![2020],
            discount_rate: Dimensionless(0.05),
            cost_emit: None,
            nem_emit_limit: None,
            nem_ret_ratio: None,
            nem_ret_gwh: None,
            nem_disp_ratio: None,
            nem_re_disp_ratio: None,
            region_ret_ratio: Vec::new(),
            unserved_limit: false,
            manual_intercon_build: None,
        },
        advanced: AdvancedSection {
            template: PathBuf::from("data"),
            custom_costs: None,
            exogenous_capacity: None,
            exogenous_transmission: None,
            cluster: false,
            cluster_sets: 6,
            max_synthetic: false,
            extreme_week: false,
        },
        solver: SolverSection::default(),
    }
}

/// `n` hourly timestamps from the start of financial year 2020
pub fn hours(n: i64) -> Vec<NaiveDateTime> {
    let start = parse_timestamp("2019-07-01 00:00:00").unwrap();
    (0..n).map(|h| start + Duration::hours(h)).collect()
}

/// A series following `f(hour)` over the first `n` hours of financial year 2020
fn series(n: i64, f: impl Fn(i64) -> f64) -> Series {
    hours(n)
        .into_iter()
        .enumerate()
        .map(|(h, ts)| (ts, f(i64::try_from(h).unwrap())))
        .collect()
}

/// Solar-shaped capacity factor
fn daylight(hour: i64) -> f64 {
    match hour % 24 {
        7..=17 => 0.6,
        _ => 0.0,
    }
}

#[fixture]
pub fn traces() -> Traces {
    Traces {
        demand: indexmap! {
            RegionID(1) => series(24, |h| if (17..=20).contains(&(h % 24)) { 1200.0 } else { 800.0 }),
            RegionID(2) => series(24, |_| 400.0),
        },
        zone_demand_factors: indexmap! {
            ZoneID(1) => ZoneDemandFactor::Constant(0.5),
            ZoneID(2) => ZoneDemandFactor::Constant(0.5),
            ZoneID(3) => ZoneDemandFactor::Constant(1.0),
        },
        capacity_factors: indexmap! {
            (ZoneID(1), TechnologyID(12)) => series(24, |h| if h % 24 < 12 { 0.2 } else { 0.5 }),
            (ZoneID(2), TechnologyID(12)) => series(24, |_| 0.35),
            (ZoneID(2), TechnologyID(11)) => series(24, daylight),
            (ZoneID(2), TechnologyID(13)) => series(24, daylight),
        },
    }
}

#[fixture]
pub fn timeline() -> Timeline {
    Timeline::single(hours(24)).unwrap()
}

#[fixture]
pub fn model(
    scenario_config: ScenarioConfig,
    regions: RegionMap,
    zones: ZoneMap,
    technologies: TechnologyMap,
    zone_technologies: ZoneTechnologyMap,
    network: Network,
    traces: Traces,
) -> Model {
    let sets = ModelSets::new(&regions, &zones, &technologies, &zone_technologies, &network).unwrap();
    let initial_capacity = indexmap! {
        (ZoneID(1), TechnologyID(2)) => Capacity(300.0),
        (ZoneID(3), TechnologyID(18)) => Capacity(200.0),
    };
    let initial_transmission = network.iter().map(|link| (link.key(), link.limit)).collect();
    let historical_repayment = zones.keys().map(|id| (*id, Money(0.0))).collect();

    Model {
        config: scenario_config,
        regions,
        zones,
        technologies,
        zone_technologies,
        network,
        sets,
        initial_capacity,
        initial_transmission,
        historical_repayment,
        generation_limits: Default::default(),
        traces,
        custom_costs: Default::default(),
        exogenous_capacity: Default::default(),
        exogenous_transmission: Default::default(),
    }
}

#[fixture]
pub fn year_parameters(model: Model) -> YearParameters {
    YearParameters::new(&model, 2020, &CarryForward::initial(&model)).unwrap()
}

#[fixture]
pub fn sampled_traces(model: Model, timeline: Timeline) -> SampledTraces {
    model
        .traces
        .sample(
            &model.zones,
            &model.technologies,
            &model.zone_technologies,
            &timeline,
        )
        .unwrap()
}

#[fixture]
pub fn formulation(
    model: Model,
    year_parameters: YearParameters,
    timeline: Timeline,
    sampled_traces: SampledTraces,
) -> Formulation {
    Formulation::build(&model, &year_parameters, &timeline, &sampled_traces, &[])
}
