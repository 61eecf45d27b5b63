//! Code for reading demand and capacity factor traces.
use super::{deserialise_timestamp, input_err_msg, read_csv, read_csv_optional};
use crate::region::{RegionID, RegionMap, ZoneID, ZoneMap, zones_per_region};
use crate::technology::{TechnologyID, TechnologyMap, ZoneTechnologyMap};
use crate::timeline::parse_timestamp;
use crate::trace::{Series, Traces, ZoneDemandFactor};
use anyhow::{Context, Result, bail, ensure};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const DEMAND_FILE_NAME: &str = "demand.csv";
const ZONE_DEMAND_FACTORS_FILE_NAME: &str = "zone_demand_factors.csv";
const CAPACITY_FACTORS_FILE_NAME: &str = "capacity_factors.csv";

#[derive(Debug, Deserialize)]
struct DemandRaw {
    region: RegionID,
    #[serde(deserialize_with = "deserialise_timestamp")]
    timestamp: NaiveDateTime,
    demand: f64,
}

#[derive(Debug, Deserialize)]
struct ZoneDemandFactorRaw {
    zone: ZoneID,
    #[serde(default)]
    timestamp: Option<String>,
    factor: f64,
}

#[derive(Debug, Deserialize)]
struct CapacityFactorRaw {
    zone: ZoneID,
    technology: TechnologyID,
    #[serde(deserialize_with = "deserialise_timestamp")]
    timestamp: NaiveDateTime,
    value: f64,
}

/// Read all traces from the template folder.
///
/// # Arguments
///
/// * `template_dir` - Folder containing the template tables
/// * `regions` - All known regions
/// * `zones` - All known zones
/// * `technologies` - All known technologies
/// * `zone_technologies` - The declared (zone, technology) pairs
pub fn read_traces(
    template_dir: &Path,
    regions: &RegionMap,
    zones: &ZoneMap,
    technologies: &TechnologyMap,
    zone_technologies: &ZoneTechnologyMap,
) -> Result<Traces> {
    let file_path = template_dir.join(DEMAND_FILE_NAME);
    let demand = read_demand_from_iter(read_csv(&file_path)?, regions)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = template_dir.join(ZONE_DEMAND_FACTORS_FILE_NAME);
    let zone_demand_factors =
        read_zone_demand_factors_from_iter(read_csv_optional(&file_path)?, regions, zones)
            .with_context(|| input_err_msg(&file_path))?;

    let file_path = template_dir.join(CAPACITY_FACTORS_FILE_NAME);
    let capacity_factors = read_capacity_factors_from_iter(
        read_csv_optional(&file_path)?,
        technologies,
        zone_technologies,
    )
    .with_context(|| input_err_msg(&file_path))?;

    Ok(Traces {
        demand,
        zone_demand_factors,
        capacity_factors,
    })
}

fn read_demand_from_iter<I>(iter: I, regions: &RegionMap) -> Result<IndexMap<RegionID, Series>>
where
    I: IntoIterator<Item = DemandRaw>,
{
    let mut map: IndexMap<RegionID, Series> = IndexMap::new();
    for row in iter {
        ensure!(
            regions.contains_key(&row.region),
            "Unknown region {}",
            row.region
        );
        ensure!(
            row.demand >= 0.0,
            "Demand for region {} at {} must be >= 0",
            row.region,
            row.timestamp
        );
        ensure!(
            map.entry(row.region)
                .or_default()
                .insert(row.timestamp, row.demand)
                .is_none(),
            "Duplicate demand for region {} at {}",
            row.region,
            row.timestamp
        );
    }

    for region_id in regions.keys() {
        ensure!(map.contains_key(region_id), "No demand for region {region_id}");
    }

    Ok(map)
}

fn read_zone_demand_factors_from_iter<I>(
    iter: I,
    regions: &RegionMap,
    zones: &ZoneMap,
) -> Result<IndexMap<ZoneID, ZoneDemandFactor>>
where
    I: IntoIterator<Item = ZoneDemandFactorRaw>,
{
    let mut map: IndexMap<ZoneID, ZoneDemandFactor> = IndexMap::new();
    for row in iter {
        ensure!(zones.contains_key(&row.zone), "Unknown zone {}", row.zone);
        ensure!(
            row.factor >= 0.0,
            "Demand factor for zone {} must be >= 0",
            row.zone
        );

        match (row.timestamp, map.get_mut(&row.zone)) {
            (None, None) => {
                map.insert(row.zone, ZoneDemandFactor::Constant(row.factor));
            }
            (Some(ts), None) => {
                let series = Series::from([(parse_timestamp(&ts)?, row.factor)]);
                map.insert(row.zone, ZoneDemandFactor::Series(series));
            }
            (Some(ts), Some(ZoneDemandFactor::Series(series))) => {
                let ts = parse_timestamp(&ts)?;
                ensure!(
                    series.insert(ts, row.factor).is_none(),
                    "Duplicate demand factor for zone {} at {ts}",
                    row.zone
                );
            }
            _ => bail!(
                "Demand factor for zone {} must be either a constant or a series",
                row.zone
            ),
        }
    }

    for (region_id, zone_ids) in zones_per_region(regions, zones) {
        for zone_id in &zone_ids {
            if map.contains_key(zone_id) {
                continue;
            }
            ensure!(
                zone_ids.len() == 1,
                "No demand factor for zone {zone_id}, which shares region {region_id} with other zones"
            );
            map.insert(*zone_id, ZoneDemandFactor::Constant(1.0));
        }
    }

    Ok(map)
}

fn read_capacity_factors_from_iter<I>(
    iter: I,
    technologies: &TechnologyMap,
    zone_technologies: &ZoneTechnologyMap,
) -> Result<IndexMap<(ZoneID, TechnologyID), Series>>
where
    I: IntoIterator<Item = CapacityFactorRaw>,
{
    let mut map: IndexMap<(ZoneID, TechnologyID), Series> = IndexMap::new();
    for row in iter {
        let key = (row.zone, row.technology);
        ensure!(
            zone_technologies.contains_key(&key),
            "Technology {} is not declared in zone {}",
            row.technology,
            row.zone
        );
        ensure!(
            !technologies[&row.technology].is_storage(),
            "Storage technology {} cannot have a capacity factor trace",
            row.technology
        );
        ensure!(
            row.value >= 0.0,
            "Capacity factor for technology {} in zone {} at {} must be >= 0",
            row.technology,
            row.zone,
            row.timestamp
        );
        ensure!(
            map.entry(key)
                .or_default()
                .insert(row.timestamp, row.value)
                .is_none(),
            "Duplicate capacity factor for technology {} in zone {} at {}",
            row.technology,
            row.zone,
            row.timestamp
        );
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, regions, technologies, zone_technologies, zones};
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    fn factor(zone: u32, timestamp: Option<&str>, factor: f64) -> ZoneDemandFactorRaw {
        ZoneDemandFactorRaw {
            zone: ZoneID(zone),
            timestamp: timestamp.map(ToString::to_string),
            factor,
        }
    }

    #[rstest]
    fn zone_demand_factor_defaults(regions: RegionMap, zones: ZoneMap) {
        // Zones 1 and 2 share region 1; zone 3 is alone in region 2
        let map = read_zone_demand_factors_from_iter(
            [factor(1, None, 0.4), factor(2, None, 0.6)],
            &regions,
            &zones,
        )
        .unwrap();
        assert_eq!(map[&ZoneID(3)], ZoneDemandFactor::Constant(1.0));
        assert_eq!(map[&ZoneID(1)], ZoneDemandFactor::Constant(0.4));
    }

    #[rstest]
    fn zone_demand_factor_missing_for_shared_region(regions: RegionMap, zones: ZoneMap) {
        assert_error!(
            read_zone_demand_factors_from_iter([factor(1, None, 0.4)], &regions, &zones),
            "No demand factor for zone 2, which shares region 1 with other zones"
        );
    }

    #[rstest]
    fn zone_demand_factor_mixed(regions: RegionMap, zones: ZoneMap) {
        assert_error!(
            read_zone_demand_factors_from_iter(
                [
                    factor(1, None, 0.4),
                    factor(1, Some("2019-07-01 00:00:00"), 0.4)
                ],
                &regions,
                &zones
            ),
            "Demand factor for zone 1 must be either a constant or a series"
        );
    }

    #[rstest]
    fn read_traces_from_files(
        regions: RegionMap,
        zones: ZoneMap,
        technologies: TechnologyMap,
        zone_technologies: ZoneTechnologyMap,
    ) {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(DEMAND_FILE_NAME),
            "region,timestamp,demand
1,2019-07-01 00:00:00,100
1,2019-07-01 01:00:00,110
2,2019-07-01 00:00:00,50
2,2019-07-01 01:00:00,55
",
        )
        .unwrap();
        fs::write(
            dir.path().join(ZONE_DEMAND_FACTORS_FILE_NAME),
            "zone,timestamp,factor
1,2019-07-01 00:00:00,0.5
1,2019-07-01 01:00:00,0.4
2,2019-07-01 00:00:00,0.5
2,2019-07-01 01:00:00,0.6
",
        )
        .unwrap();
        fs::write(
            dir.path().join(CAPACITY_FACTORS_FILE_NAME),
            "zone,technology,timestamp,value
1,12,2019-07-01 00:00:00,0.3
1,12,2019-07-01 01:00:00,0.35
",
        )
        .unwrap();

        let traces =
            read_traces(dir.path(), &regions, &zones, &technologies, &zone_technologies).unwrap();
        assert_eq!(traces.demand.len(), 2);
        assert_eq!(traces.demand[&RegionID(1)].len(), 2);
        assert!(matches!(
            traces.zone_demand_factors[&ZoneID(2)],
            ZoneDemandFactor::Series(_)
        ));
        assert_eq!(
            traces.capacity_factors[&(ZoneID(1), TechnologyID(12))].len(),
            2
        );
    }

    #[rstest]
    fn capacity_factor_for_storage(
        technologies: TechnologyMap,
        zone_technologies: ZoneTechnologyMap,
    ) {
        let row = CapacityFactorRaw {
            zone: ZoneID(1),
            technology: TechnologyID(15),
            timestamp: parse_timestamp("2019-07-01 00:00:00").unwrap(),
            value: 0.5,
        };
        assert_error!(
            read_capacity_factors_from_iter([row], &technologies, &zone_technologies),
            "Storage technology 15 cannot have a capacity factor trace"
        );
    }
}
