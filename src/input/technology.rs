//! Code for reading technologies and the (zone, technology) pairs from CSV files.
use super::{input_err_msg, read_csv, read_csv_optional};
use crate::id::collect_by_id;
use crate::region::{ZoneID, ZoneMap};
use crate::technology::{
    CapacityClass, CommitmentParameters, DEFAULT_BUILD_LIMIT, DEFAULT_EFFRATE, DEFAULT_EMIT_RATE,
    DEFAULT_FUEL_PRICE, DEFAULT_HEAT_RATE, DEFAULT_MINCAP, DEFAULT_RETIREMENT_COST,
    GenerationLimits, Technology, TechnologyID, TechnologyKind, TechnologyMap, TechnologyTag,
    ZoneTechnology, ZoneTechnologyMap, default_commitment, default_lifetime, parse_tags,
    technology_kind,
};
use crate::units::{
    Capacity, Dimensionless, Energy, FuelPerEnergy, MoneyPerCapacity, MoneyPerEnergy, MoneyPerFuel,
};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const TECHNOLOGIES_FILE_NAME: &str = "technologies.csv";
const COMMITMENT_FILE_NAME: &str = "commitment.csv";
const ZONE_TECHNOLOGIES_FILE_NAME: &str = "zone_technologies.csv";
const GENERATION_LIMITS_FILE_NAME: &str = "generation_limits.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct TechnologyRaw {
    id: TechnologyID,
    name: String,
    #[serde(default)]
    tags: String,
    lifetime: Option<u32>,
    build_cost: Option<f64>,
    cost_fom: Option<f64>,
    cost_vom: Option<f64>,
    cost_retire: Option<f64>,
    emit_rate: Option<f64>,
    round_trip_efficiency: Option<f64>,
    charge_hours: Option<f64>,
    collector_multiple: Option<f64>,
    default_capacity_factor: Option<f64>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct CommitmentRaw {
    technology: TechnologyID,
    penalty: f64,
    rate_up: f64,
    rate_down: f64,
    uptime: u32,
    mincap: Option<f64>,
    effrate: Option<f64>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct ZoneTechnologyRaw {
    zone: ZoneID,
    technology: TechnologyID,
    build_cost: Option<f64>,
    fuel_price: Option<f64>,
    heat_rate: Option<f64>,
    build_limit: Option<f64>,
    regional_cost_factor: Option<f64>,
    connection_cost: Option<f64>,
}

/// Read technologies and their unit commitment parameters.
///
/// # Arguments
///
/// * `template_dir` - Folder containing the template tables
pub fn read_technologies(template_dir: &Path) -> Result<TechnologyMap> {
    let file_path = template_dir.join(COMMITMENT_FILE_NAME);
    let commitment_csv = read_csv_optional(&file_path)?;
    let mut commitment =
        read_commitment_from_iter(commitment_csv).with_context(|| input_err_msg(&file_path))?;

    let file_path = template_dir.join(TECHNOLOGIES_FILE_NAME);
    let technologies_csv = read_csv(&file_path)?;
    let technologies = read_technologies_from_iter(technologies_csv, &mut commitment)
        .with_context(|| input_err_msg(&file_path))?;

    if let Some(id) = commitment.keys().next() {
        bail!(
            "{}: technology {id} has commitment parameters but is not tagged commitment",
            input_err_msg(template_dir.join(COMMITMENT_FILE_NAME))
        );
    }

    Ok(technologies)
}

fn read_commitment_from_iter<I>(iter: I) -> Result<IndexMap<TechnologyID, CommitmentParameters>>
where
    I: IntoIterator<Item = CommitmentRaw>,
{
    let mut map = IndexMap::new();
    for raw in iter {
        let params = CommitmentParameters {
            penalty: raw.penalty,
            rate_up: raw.rate_up,
            rate_down: raw.rate_down,
            uptime: raw.uptime,
            mincap: raw.mincap.unwrap_or(DEFAULT_MINCAP),
            effrate: raw.effrate.unwrap_or(DEFAULT_EFFRATE),
        };
        params
            .validate()
            .with_context(|| format!("Invalid commitment parameters for {}", raw.technology))?;
        ensure!(
            map.insert(raw.technology, params).is_none(),
            "Duplicate commitment parameters for technology {}",
            raw.technology
        );
    }

    Ok(map)
}

fn read_technologies_from_iter<I>(
    iter: I,
    commitment: &mut IndexMap<TechnologyID, CommitmentParameters>,
) -> Result<TechnologyMap>
where
    I: IntoIterator<Item = TechnologyRaw>,
{
    let technologies = iter
        .into_iter()
        .map(|raw| technology_from_raw(raw, commitment))
        .collect::<Result<Vec<_>>>()?;

    collect_by_id(technologies)
}

fn technology_from_raw(
    raw: TechnologyRaw,
    commitment: &mut IndexMap<TechnologyID, CommitmentParameters>,
) -> Result<Technology> {
    let id = raw.id;
    let tags = parse_tags(&raw.tags).with_context(|| format!("Invalid tags for {id}"))?;
    let kind = technology_kind(
        id,
        &tags,
        raw.round_trip_efficiency,
        raw.charge_hours,
        raw.collector_multiple,
    )?;

    let retireable = tags.contains(&TechnologyTag::Retireable);
    ensure!(
        !retireable || kind == TechnologyKind::Generator,
        "Only generators can be retired (technology {id})"
    );
    let capacity_class =
        CapacityClass::new(!tags.contains(&TechnologyTag::NoBuild), retireable);

    let commitment = if tags.contains(&TechnologyTag::Commitment) {
        ensure!(
            tags.contains(&TechnologyTag::Fuel),
            "Commitment technology {id} must also be tagged fuel"
        );
        let params = commitment
            .shift_remove(&id)
            .or_else(|| default_commitment(id))
            .with_context(|| format!("No commitment parameters for technology {id}"))?;
        Some(params)
    } else {
        None
    };

    let fuel = tags.contains(&TechnologyTag::Fuel);
    let emit_rate = raw
        .emit_rate
        .unwrap_or(if fuel { DEFAULT_EMIT_RATE } else { 0.0 });
    ensure!(emit_rate >= 0.0, "emit_rate of technology {id} must be >= 0");

    let default_cf = raw.default_capacity_factor.unwrap_or(
        if tags.contains(&TechnologyTag::Renewable) || tags.contains(&TechnologyTag::Hybrid) {
            0.0
        } else {
            1.0
        },
    );
    ensure!(
        (0.0..=1.0).contains(&default_cf),
        "default_capacity_factor of technology {id} must be between 0 and 1"
    );

    let lifetime = raw.lifetime.unwrap_or_else(|| default_lifetime(id));
    ensure!(lifetime > 0, "lifetime of technology {id} must be > 0");

    for (name, value) in [
        ("build_cost", raw.build_cost),
        ("cost_fom", raw.cost_fom),
        ("cost_vom", raw.cost_vom),
        ("cost_retire", raw.cost_retire),
    ] {
        if let Some(value) = value {
            ensure!(value >= 0.0, "{name} of technology {id} must be >= 0");
        }
    }

    Ok(Technology {
        id,
        name: raw.name,
        tags,
        kind,
        capacity_class,
        lifetime,
        build_cost: MoneyPerCapacity(raw.build_cost.unwrap_or(0.0)),
        cost_fom: MoneyPerCapacity(raw.cost_fom.unwrap_or(0.0)),
        cost_vom: MoneyPerEnergy(raw.cost_vom.unwrap_or(0.0)),
        cost_retire: MoneyPerCapacity(raw.cost_retire.unwrap_or(DEFAULT_RETIREMENT_COST)),
        emit_rate,
        default_capacity_factor: Dimensionless(default_cf),
        commitment,
    })
}

/// Read the declared (zone, technology) pairs.
///
/// # Arguments
///
/// * `template_dir` - Folder containing the template tables
/// * `zones` - All known zones
/// * `technologies` - All known technologies
pub fn read_zone_technologies(
    template_dir: &Path,
    zones: &ZoneMap,
    technologies: &TechnologyMap,
) -> Result<ZoneTechnologyMap> {
    let file_path = template_dir.join(ZONE_TECHNOLOGIES_FILE_NAME);
    let zone_technologies_csv = read_csv(&file_path)?;
    read_zone_technologies_from_iter(zone_technologies_csv, zones, technologies)
        .with_context(|| input_err_msg(&file_path))
}

fn read_zone_technologies_from_iter<I>(
    iter: I,
    zones: &ZoneMap,
    technologies: &TechnologyMap,
) -> Result<ZoneTechnologyMap>
where
    I: IntoIterator<Item = ZoneTechnologyRaw>,
{
    let mut map = ZoneTechnologyMap::new();
    for raw in iter {
        let (zone_id, technology_id) = (raw.zone, raw.technology);
        ensure!(zones.contains_key(&zone_id), "Unknown zone {zone_id}");
        let technology = technologies
            .get(&technology_id)
            .with_context(|| format!("Unknown technology {technology_id}"))?;

        let build_cost = raw.build_cost.unwrap_or_else(|| {
            technology.build_cost.value() * raw.regional_cost_factor.unwrap_or(1.0)
                + raw.connection_cost.unwrap_or(0.0)
        });
        ensure!(
            build_cost >= 0.0,
            "Build cost of technology {technology_id} in zone {zone_id} must be >= 0"
        );

        let (fuel_price, heat_rate) = if technology.has_tag(TechnologyTag::Fuel) {
            (
                raw.fuel_price.unwrap_or(DEFAULT_FUEL_PRICE),
                raw.heat_rate.unwrap_or(DEFAULT_HEAT_RATE),
            )
        } else {
            (0.0, 0.0)
        };
        ensure!(
            fuel_price >= 0.0 && heat_rate >= 0.0,
            "Fuel price and heat rate of technology {technology_id} in zone {zone_id} must be >= 0"
        );

        let build_limit = raw.build_limit.unwrap_or(DEFAULT_BUILD_LIMIT);
        ensure!(
            build_limit >= 0.0,
            "Build limit of technology {technology_id} in zone {zone_id} must be >= 0"
        );

        let pair = ZoneTechnology {
            zone_id,
            technology_id,
            build_cost: MoneyPerCapacity(build_cost),
            fuel_price: MoneyPerFuel(fuel_price),
            heat_rate: FuelPerEnergy(heat_rate),
            build_limit: Capacity(build_limit),
        };
        ensure!(
            map.insert((zone_id, technology_id), pair).is_none(),
            "Technology {technology_id} declared more than once in zone {zone_id}"
        );
    }

    Ok(map)
}

#[derive(Debug, Deserialize)]
struct GenerationLimitRaw {
    zone: Option<ZoneID>,
    technology: TechnologyID,
    max_mwh: Option<f64>,
    max_capacity_factor: Option<f64>,
}

/// Read caps on annual generation.
///
/// Rows without a zone give a system-wide cap on annual energy for the technology.
pub fn read_generation_limits(
    template_dir: &Path,
    technologies: &TechnologyMap,
    zone_technologies: &ZoneTechnologyMap,
) -> Result<GenerationLimits> {
    let file_path = template_dir.join(GENERATION_LIMITS_FILE_NAME);
    let rows = read_csv_optional(&file_path)?;
    read_generation_limits_from_iter(rows, technologies, zone_technologies)
        .with_context(|| input_err_msg(&file_path))
}

fn read_generation_limits_from_iter<I>(
    iter: I,
    technologies: &TechnologyMap,
    zone_technologies: &ZoneTechnologyMap,
) -> Result<GenerationLimits>
where
    I: IntoIterator<Item = GenerationLimitRaw>,
{
    let mut limits = GenerationLimits::default();
    for row in iter {
        let technology = technologies
            .get(&row.technology)
            .with_context(|| format!("Unknown technology {}", row.technology))?;
        ensure!(
            technology.is_generator(),
            "Generation limits can only be set for generators, not technology {}",
            row.technology
        );
        if let Some(max_mwh) = row.max_mwh {
            ensure!(max_mwh >= 0.0, "max_mwh must be >= 0");
        }

        let Some(zone_id) = row.zone else {
            ensure!(
                row.max_capacity_factor.is_none(),
                "max_capacity_factor for technology {} must be given for a zone",
                row.technology
            );
            let max_mwh = row.max_mwh.with_context(|| {
                format!("No max_mwh given for technology {}", row.technology)
            })?;
            limits
                .system_energy
                .insert(row.technology, Energy(max_mwh));
            continue;
        };

        let key = (zone_id, row.technology);
        ensure!(
            zone_technologies.contains_key(&key),
            "Technology {} is not declared in zone {zone_id}",
            row.technology
        );
        if let Some(max_mwh) = row.max_mwh {
            limits.zone_energy.insert(key, Energy(max_mwh));
        }
        if let Some(cf) = row.max_capacity_factor {
            ensure!(
                (0.0..=1.0).contains(&cf),
                "max_capacity_factor must be between 0 and 1"
            );
            limits.zone_capacity_factor.insert(key, Dimensionless(cf));
        }
    }

    Ok(limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, zones};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    fn technology_raw(id: u32, tags: &str) -> TechnologyRaw {
        TechnologyRaw {
            id: TechnologyID(id),
            name: format!("tech{id}"),
            tags: tags.to_string(),
            lifetime: None,
            build_cost: Some(1000.0),
            cost_fom: None,
            cost_vom: None,
            cost_retire: None,
            emit_rate: None,
            round_trip_efficiency: None,
            charge_hours: None,
            collector_multiple: None,
            default_capacity_factor: None,
        }
    }

    #[test]
    fn technology_defaults() {
        let mut commitment = IndexMap::new();
        let tech = technology_from_raw(technology_raw(2, "fuel;commitment"), &mut commitment)
            .unwrap();
        assert_eq!(tech.lifetime, 30);
        assert_eq!(tech.kind, TechnologyKind::Generator);
        assert_eq!(tech.capacity_class, CapacityClass::Buildable);
        assert_approx_eq!(f64, tech.emit_rate, DEFAULT_EMIT_RATE);
        assert_eq!(tech.default_capacity_factor, Dimensionless(1.0));
        assert_eq!(tech.commitment.unwrap().uptime, 4);

        let tech = technology_from_raw(technology_raw(12, "renewable;retireable;no_build"), &mut commitment)
            .unwrap();
        assert_eq!(tech.capacity_class, CapacityClass::FixedRetireable);
        assert_eq!(tech.default_capacity_factor, Dimensionless(0.0));
        assert_approx_eq!(f64, tech.emit_rate, 0.0);
    }

    #[test]
    fn commitment_table_overrides_defaults() {
        let mut commitment = read_commitment_from_iter([CommitmentRaw {
            technology: TechnologyID(2),
            penalty: 10.0,
            rate_up: 0.5,
            rate_down: 0.5,
            uptime: 3,
            mincap: Some(0.4),
            effrate: None,
        }])
        .unwrap();
        let tech = technology_from_raw(technology_raw(2, "fuel;commitment"), &mut commitment)
            .unwrap();
        let params = tech.commitment.unwrap();
        assert_eq!(params.uptime, 3);
        assert_approx_eq!(f64, params.mincap, 0.4);
        assert_approx_eq!(f64, params.effrate, DEFAULT_EFFRATE);
        assert!(commitment.is_empty());
    }

    #[rstest]
    #[case(technology_raw(40, "fuel;commitment"), "No commitment parameters for technology 40")]
    #[case(technology_raw(2, "commitment"), "Commitment technology 2 must also be tagged fuel")]
    #[case(technology_raw(14, "storage;retireable"), "Only generators can be retired (technology 14)")]
    fn invalid_technology(#[case] raw: TechnologyRaw, #[case] msg: &str) {
        let mut commitment = IndexMap::new();
        assert_error!(technology_from_raw(raw, &mut commitment), msg);
    }

    #[rstest]
    fn zone_technology_costs(zones: ZoneMap) {
        let mut commitment = IndexMap::new();
        let technologies = read_technologies_from_iter(
            [technology_raw(8, "fuel"), technology_raw(12, "renewable")],
            &mut commitment,
        )
        .unwrap();

        let pairs = read_zone_technologies_from_iter(
            [
                ZoneTechnologyRaw {
                    zone: ZoneID(1),
                    technology: TechnologyID(8),
                    build_cost: None,
                    fuel_price: Some(9.0),
                    heat_rate: None,
                    build_limit: None,
                    regional_cost_factor: Some(1.1),
                    connection_cost: Some(50.0),
                },
                ZoneTechnologyRaw {
                    zone: ZoneID(2),
                    technology: TechnologyID(12),
                    build_cost: Some(2500.0),
                    fuel_price: Some(9.0),
                    heat_rate: None,
                    build_limit: Some(300.0),
                    regional_cost_factor: None,
                    connection_cost: None,
                },
            ],
            &zones,
            &technologies,
        )
        .unwrap();

        let ocgt = &pairs[&(ZoneID(1), TechnologyID(8))];
        assert_approx_eq!(f64, ocgt.build_cost.value(), 1150.0);
        assert_approx_eq!(f64, ocgt.fuel_price.value(), 9.0);
        assert_approx_eq!(f64, ocgt.heat_rate.value(), DEFAULT_HEAT_RATE);
        assert_approx_eq!(f64, ocgt.build_limit.value(), DEFAULT_BUILD_LIMIT);

        let wind = &pairs[&(ZoneID(2), TechnologyID(12))];
        assert_approx_eq!(f64, wind.build_cost.value(), 2500.0);
        assert_approx_eq!(f64, wind.fuel_price.value(), 0.0);
        assert_approx_eq!(f64, wind.build_limit.value(), 300.0);
    }

    #[test]
    fn read_technologies_from_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(TECHNOLOGIES_FILE_NAME),
            "id,name,tags,lifetime,build_cost,cost_fom,cost_vom,charge_hours\n\
             8,ocgt,fuel;dispatchable,,900,10000,8,\n\
             15,battery,storage,,1200,5000,0,\n\
             13,cst,hybrid;renewable_dispatchable,,5000,80000,0,6\n",
        )
        .unwrap();

        let technologies = read_technologies(dir.path()).unwrap();
        assert_eq!(technologies.len(), 3);
        assert!(technologies[&TechnologyID(15)].is_storage());
        assert_eq!(technologies[&TechnologyID(15)].lifetime, 15);
        assert!(technologies[&TechnologyID(13)].is_hybrid());
        assert_approx_eq!(
            f64,
            technologies[&TechnologyID(8)].cost_vom.value(),
            8.0
        );
    }

    #[rstest]
    fn generation_limits(
        #[from(crate::fixture::technologies)] technologies: TechnologyMap,
        #[from(crate::fixture::zone_technologies)] zone_technologies: ZoneTechnologyMap,
    ) {
        let limits = read_generation_limits_from_iter(
            [
                GenerationLimitRaw {
                    zone: Some(ZoneID(1)),
                    technology: TechnologyID(8),
                    max_mwh: Some(1000.0),
                    max_capacity_factor: Some(0.5),
                },
                GenerationLimitRaw {
                    zone: None,
                    technology: TechnologyID(12),
                    max_mwh: Some(5000.0),
                    max_capacity_factor: None,
                },
            ],
            &technologies,
            &zone_technologies,
        )
        .unwrap();
        assert_eq!(
            limits.zone_energy[&(ZoneID(1), TechnologyID(8))],
            Energy(1000.0)
        );
        assert_eq!(
            limits.zone_capacity_factor[&(ZoneID(1), TechnologyID(8))],
            Dimensionless(0.5)
        );
        assert_eq!(limits.system_energy[&TechnologyID(12)], Energy(5000.0));

        assert_error!(
            read_generation_limits_from_iter(
                [GenerationLimitRaw {
                    zone: None,
                    technology: TechnologyID(8),
                    max_mwh: None,
                    max_capacity_factor: Some(0.5),
                }],
                &technologies,
                &zone_technologies,
            ),
            "max_capacity_factor for technology 8 must be given for a zone"
        );
    }
}
