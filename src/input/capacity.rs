//! Code for reading the capacity and cost obligations that exist before the first simulated year.
use super::{input_err_msg, read_csv_optional};
use crate::region::{ZoneID, ZoneMap};
use crate::technology::{TechnologyID, ZoneTechnologyMap};
use crate::units::{Capacity, Money};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const INITIAL_CAPACITY_FILE_NAME: &str = "initial_capacity.csv";
const CARRY_FORWARD_COSTS_FILE_NAME: &str = "carry_forward_costs.csv";

/// Operating capacity per (zone, technology) pair
pub type CapacityMap = IndexMap<(ZoneID, TechnologyID), Capacity>;

#[derive(Debug, Deserialize)]
struct CapacityRaw {
    zone: ZoneID,
    technology: TechnologyID,
    capacity: f64,
}

#[derive(Debug, Deserialize)]
struct ZoneCostRaw {
    zone: ZoneID,
    value: f64,
}

/// Read the operating capacity at the start of the first simulated year.
///
/// Pairs without an entry start with no capacity. Entries for the same pair are summed.
pub fn read_initial_capacity(
    template_dir: &Path,
    zone_technologies: &ZoneTechnologyMap,
) -> Result<CapacityMap> {
    let file_path = template_dir.join(INITIAL_CAPACITY_FILE_NAME);
    let rows = read_csv_optional(&file_path)?;
    read_initial_capacity_from_iter(rows, zone_technologies)
        .with_context(|| input_err_msg(&file_path))
}

fn read_initial_capacity_from_iter<I>(
    iter: I,
    zone_technologies: &ZoneTechnologyMap,
) -> Result<CapacityMap>
where
    I: IntoIterator<Item = CapacityRaw>,
{
    let mut map: CapacityMap = zone_technologies
        .keys()
        .map(|key| (*key, Capacity(0.0)))
        .collect();

    for row in iter {
        let key = (row.zone, row.technology);
        ensure!(row.capacity >= 0.0, "Capacity must be >= 0");
        let entry = map.get_mut(&key).with_context(|| {
            format!(
                "Technology {} is not declared in zone {}",
                row.technology, row.zone
            )
        })?;
        *entry += Capacity(row.capacity);
    }

    Ok(map)
}

/// Read the historical annualised capital repayments per zone.
///
/// Zones without an entry have no historical repayments.
pub fn read_historical_repayments(
    template_dir: &Path,
    zones: &ZoneMap,
) -> Result<IndexMap<ZoneID, Money>> {
    let file_path = template_dir.join(CARRY_FORWARD_COSTS_FILE_NAME);
    let rows: Vec<ZoneCostRaw> = read_csv_optional(&file_path)?;

    let mut map: IndexMap<_, _> = zones.keys().map(|id| (*id, Money(0.0))).collect();
    for row in rows {
        let entry = map
            .get_mut(&row.zone)
            .with_context(|| format!("Unknown zone {}", row.zone))
            .with_context(|| input_err_msg(&file_path))?;
        *entry += Money(row.value);
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, zone_technologies};
    use rstest::rstest;

    #[rstest]
    fn initial_capacity_defaults_to_zero(zone_technologies: ZoneTechnologyMap) {
        let map = read_initial_capacity_from_iter(
            [
                CapacityRaw {
                    zone: ZoneID(1),
                    technology: TechnologyID(8),
                    capacity: 100.0,
                },
                CapacityRaw {
                    zone: ZoneID(1),
                    technology: TechnologyID(8),
                    capacity: 50.0,
                },
            ],
            &zone_technologies,
        )
        .unwrap();
        assert_eq!(map.len(), zone_technologies.len());
        assert_eq!(map[&(ZoneID(1), TechnologyID(8))], Capacity(150.0));
        assert_eq!(map[&(ZoneID(1), TechnologyID(12))], Capacity(0.0));
    }

    #[rstest]
    fn initial_capacity_for_undeclared_pair(zone_technologies: ZoneTechnologyMap) {
        assert_error!(
            read_initial_capacity_from_iter(
                [CapacityRaw {
                    zone: ZoneID(3),
                    technology: TechnologyID(99),
                    capacity: 1.0,
                }],
                &zone_technologies,
            ),
            "Technology 99 is not declared in zone 3"
        );
    }
}
