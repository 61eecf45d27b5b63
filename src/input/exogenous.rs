//! Code for reading scenario-level overrides: custom costs and exogenous capacity changes.
use super::{input_err_msg, read_csv};
use crate::input::capacity::CapacityMap;
use crate::network::Network;
use crate::region::ZoneID;
use crate::technology::{TechnologyID, TechnologyKind, TechnologyMap, ZoneTechnologyMap};
use crate::units::Capacity;
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use log::warn;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use strum::{Display, EnumString};

/// The first simulated year sums exogenous changes made after this year
pub const EXOGENOUS_BASE_YEAR: u32 = 2017;

/// A cost which can be overridden per simulated year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum CostName {
    /// Build cost of a generator in a zone ($/MW)
    CostGenBuild,
    /// Build cost of storage in a zone ($/MW)
    CostStorBuild,
    /// Build cost of a hybrid in a zone ($/MW)
    CostHybBuild,
    /// Fuel price in a zone ($/GJ)
    CostFuel,
    /// Build cost of a technology in every zone ($/MW)
    BuildCost,
    /// Fixed O&M of a generator ($/MW/year)
    CostGenFom,
    /// Variable O&M of a generator ($/MWh)
    CostGenVom,
    /// Fixed O&M of storage ($/MW/year)
    CostStorFom,
    /// Variable O&M of storage ($/MWh)
    CostStorVom,
    /// Fixed O&M of a hybrid ($/MW/year)
    CostHybFom,
    /// Variable O&M of a hybrid ($/MWh)
    CostHybVom,
}

impl CostName {
    /// Whether the cost is given per (zone, technology) pair rather than per technology
    pub fn is_per_pair(self) -> bool {
        matches!(
            self,
            Self::CostGenBuild | Self::CostStorBuild | Self::CostHybBuild | Self::CostFuel
        )
    }

    /// Whether the cost applies to technologies of the given kind
    pub fn applies_to(self, kind: &TechnologyKind) -> bool {
        match self {
            Self::CostGenBuild | Self::CostGenFom | Self::CostGenVom | Self::CostFuel => {
                matches!(kind, TechnologyKind::Generator)
            }
            Self::CostStorBuild | Self::CostStorFom | Self::CostStorVom => {
                matches!(kind, TechnologyKind::Storage { .. })
            }
            Self::CostHybBuild | Self::CostHybFom | Self::CostHybVom => {
                matches!(kind, TechnologyKind::Hybrid { .. })
            }
            Self::BuildCost => true,
        }
    }
}

/// One row of the custom costs table
#[derive(Debug, Clone, PartialEq)]
pub struct CustomCost {
    /// Which cost is overridden
    pub name: CostName,
    /// The zone, for costs given per pair
    pub zone_id: Option<ZoneID>,
    /// The technology
    pub technology_id: TechnologyID,
    values: IndexMap<u32, f64>,
}

impl CustomCost {
    /// The override for a year, if there is one
    pub fn value_for(&self, year: u32) -> Option<f64> {
        self.values.get(&year).copied()
    }
}

/// Cost overrides per simulated year
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomCosts(Vec<CustomCost>);

impl CustomCosts {
    /// The overrides which apply to the given year, with their values
    pub fn for_year(&self, year: u32) -> impl Iterator<Item = (&CustomCost, f64)> {
        self.0
            .iter()
            .filter_map(move |cost| cost.value_for(year).map(|value| (cost, value)))
    }
}

/// Read custom costs from a CSV file with a `name,zone,tech` prefix and one column per year.
///
/// Empty cells mean that the cost is not overridden for that year.
pub fn read_custom_costs(file_path: &Path) -> Result<CustomCosts> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?;
    let headers = reader
        .headers()
        .with_context(|| input_err_msg(file_path))?
        .clone();
    let records = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| input_err_msg(file_path))?;

    parse_custom_costs(&headers, &records).with_context(|| input_err_msg(file_path))
}

fn parse_custom_costs(
    headers: &csv::StringRecord,
    records: &[csv::StringRecord],
) -> Result<CustomCosts> {
    ensure!(
        headers.iter().take(3).eq(["name", "zone", "tech"]),
        "Custom cost tables must start with the columns name,zone,tech"
    );
    let years = headers
        .iter()
        .skip(3)
        .map(|year| {
            year.parse::<u32>()
                .with_context(|| format!("Invalid year column: {year}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut costs = Vec::new();
    for record in records {
        let name = CostName::from_str(&record[0])
            .with_context(|| format!("Unknown custom cost: {}", &record[0]))?;
        let zone_id = match &record[1] {
            "" => None,
            zone => Some(ZoneID(
                zone.parse()
                    .with_context(|| format!("Invalid zone: {zone}"))?,
            )),
        };
        if name.is_per_pair() && zone_id.is_none() {
            bail!("Custom cost {name} must be given for a zone");
        }
        let technology_id = TechnologyID(
            record[2]
                .parse()
                .with_context(|| format!("Invalid technology: {}", &record[2]))?,
        );

        let mut values = IndexMap::new();
        for (year, cell) in years.iter().zip(record.iter().skip(3)) {
            if cell.is_empty() {
                continue;
            }
            let value: f64 = cell
                .parse()
                .with_context(|| format!("Invalid value for {name} in {year}: {cell}"))?;
            ensure!(value >= 0.0, "Custom cost {name} in {year} must be >= 0");
            values.insert(*year, value);
        }

        costs.push(CustomCost {
            name,
            zone_id,
            technology_id,
            values,
        });
    }

    Ok(CustomCosts(costs))
}

/// Names of exogenous capacity changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CapacityChangeName {
    /// New generation capacity
    GenCapExo,
    /// New storage capacity
    StorCapExo,
    /// New hybrid capacity
    HybCapExo,
    /// Retired generation capacity
    RetGenCapExo,
}

impl CapacityChangeName {
    fn applies_to(self, kind: &TechnologyKind) -> bool {
        match self {
            Self::GenCapExo | Self::RetGenCapExo => matches!(kind, TechnologyKind::Generator),
            Self::StorCapExo => matches!(kind, TechnologyKind::Storage { .. }),
            Self::HybCapExo => matches!(kind, TechnologyKind::Hybrid { .. }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct CapacityChangeRaw {
    name: CapacityChangeName,
    zone: ZoneID,
    tech: TechnologyID,
    year: u32,
    value: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct TransmissionChangeRaw {
    name: String,
    zone_source: ZoneID,
    zone_dest: ZoneID,
    year: u32,
    value: f64,
}

/// Dated exogenous capacity changes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExogenousCapacity(Vec<CapacityChangeRaw>);

/// Exogenous capacity changes accumulated for one simulated year
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapacityChanges {
    /// New capacity of generators, storage and hybrids
    pub built: CapacityMap,
    /// Retired generation capacity
    pub retired: CapacityMap,
}

/// Read exogenous capacity changes (`name,zone,tech,year,value`)
pub fn read_exogenous_capacity(file_path: &Path) -> Result<ExogenousCapacity> {
    let rows: Vec<CapacityChangeRaw> = read_csv(file_path)?;
    for row in &rows {
        ensure!(
            row.value >= 0.0,
            "{}: exogenous capacity must be >= 0",
            input_err_msg(file_path)
        );
    }

    Ok(ExogenousCapacity(rows))
}

impl ExogenousCapacity {
    /// Sum the changes dated in `(previous_year, year]` per (zone, technology) pair.
    ///
    /// Entries for undeclared pairs, or which don't match the technology's kind, are dropped.
    pub fn between(
        &self,
        previous_year: u32,
        year: u32,
        technologies: &TechnologyMap,
        zone_technologies: &ZoneTechnologyMap,
    ) -> CapacityChanges {
        let mut changes = CapacityChanges::default();
        for row in self
            .0
            .iter()
            .filter(|row| row.year > previous_year && row.year <= year)
        {
            let key = (row.zone, row.tech);
            if !zone_technologies.contains_key(&key) {
                warn!(
                    "Dropping {} for technology {} in zone {}: not declared in the zone",
                    row.name, row.tech, row.zone
                );
                continue;
            }
            if !row.name.applies_to(&technologies[&row.tech].kind) {
                warn!(
                    "Dropping {} for technology {} in zone {}: wrong kind of technology",
                    row.name, row.tech, row.zone
                );
                continue;
            }

            let map = match row.name {
                CapacityChangeName::RetGenCapExo => &mut changes.retired,
                _ => &mut changes.built,
            };
            *map.entry(key).or_insert(Capacity(0.0)) += Capacity(row.value);
        }

        changes
    }
}

/// Dated exogenous transmission builds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExogenousTransmission(Vec<TransmissionChangeRaw>);

/// Read exogenous transmission builds (`name,zone_source,zone_dest,year,value`)
pub fn read_exogenous_transmission(file_path: &Path) -> Result<ExogenousTransmission> {
    let rows: Vec<TransmissionChangeRaw> = read_csv(file_path)?;
    for row in &rows {
        ensure!(
            row.name == "intercon_cap_exo",
            "{}: unknown exogenous transmission entry {}",
            input_err_msg(file_path),
            row.name
        );
        ensure!(
            row.value >= 0.0,
            "{}: exogenous transmission must be >= 0",
            input_err_msg(file_path)
        );
    }

    Ok(ExogenousTransmission(rows))
}

impl ExogenousTransmission {
    /// Sum the builds dated in `(previous_year, year]` per link, dropping undeclared links
    pub fn between(
        &self,
        previous_year: u32,
        year: u32,
        network: &Network,
    ) -> IndexMap<(ZoneID, ZoneID), Capacity> {
        let mut map = IndexMap::new();
        for row in self
            .0
            .iter()
            .filter(|row| row.year > previous_year && row.year <= year)
        {
            let key = (row.zone_source, row.zone_dest);
            if !network.contains(key.0, key.1) {
                warn!(
                    "Dropping exogenous transmission for undeclared interconnector {}->{}",
                    key.0, key.1
                );
                continue;
            }
            *map.entry(key).or_insert(Capacity(0.0)) += Capacity(row.value);
        }

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, interconnector, technologies, zone_technologies, zones};
    use crate::region::ZoneMap;
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    fn record(fields: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(fields.to_vec())
    }

    #[test]
    fn custom_costs_per_year() {
        let headers = record(&["name", "zone", "tech", "2020", "2025"]);
        let records = [
            record(&["cost_gen_build", "1", "8", "1200", ""]),
            record(&["cost_gen_fom", "", "8", "", "15000"]),
        ];
        let costs = parse_custom_costs(&headers, &records).unwrap();

        let in_2020: Vec<_> = costs.for_year(2020).collect();
        assert_eq!(in_2020.len(), 1);
        assert_eq!(in_2020[0].0.name, CostName::CostGenBuild);
        assert_eq!(in_2020[0].0.zone_id, Some(ZoneID(1)));
        assert_eq!(in_2020[0].1, 1200.0);

        let in_2025: Vec<_> = costs.for_year(2025).collect();
        assert_eq!(in_2025.len(), 1);
        assert_eq!(in_2025[0].0.name, CostName::CostGenFom);
        assert!(costs.for_year(2030).next().is_none());
    }

    #[rstest]
    #[case(&["cost_nothing", "1", "8", "1"], "Unknown custom cost: cost_nothing")]
    #[case(&["cost_fuel", "", "8", "1"], "Custom cost cost_fuel must be given for a zone")]
    #[case(&["cost_gen_vom", "", "8", "-1"], "Custom cost cost_gen_vom in 2020 must be >= 0")]
    fn custom_costs_invalid(#[case] fields: &[&str], #[case] msg: &str) {
        let headers = record(&["name", "zone", "tech", "2020"]);
        assert_error!(parse_custom_costs(&headers, &[record(fields)]), msg);
    }

    #[rstest]
    fn exogenous_capacity_is_summed_over_years(
        technologies: TechnologyMap,
        zone_technologies: ZoneTechnologyMap,
    ) {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("exogenous.csv");
        fs::write(
            &file_path,
            "name,zone,tech,year,value
gen_cap_exo,1,8,2018,100
gen_cap_exo,1,8,2020,50
gen_cap_exo,1,8,2021,25
ret_gen_cap_exo,1,12,2019,10
stor_cap_exo,1,8,2019,10
gen_cap_exo,3,99,2019,10
",
        )
        .unwrap();
        let exogenous = read_exogenous_capacity(&file_path).unwrap();

        let changes = exogenous.between(EXOGENOUS_BASE_YEAR, 2020, &technologies, &zone_technologies);
        assert_eq!(changes.built.len(), 1);
        assert_eq!(changes.built[&(ZoneID(1), TechnologyID(8))], Capacity(150.0));
        assert_eq!(changes.retired[&(ZoneID(1), TechnologyID(12))], Capacity(10.0));

        let changes = exogenous.between(2020, 2025, &technologies, &zone_technologies);
        assert_eq!(changes.built[&(ZoneID(1), TechnologyID(8))], Capacity(25.0));
        assert!(changes.retired.is_empty());
    }

    #[rstest]
    fn exogenous_transmission_drops_undeclared_links(zones: ZoneMap) {
        let network = Network::new(
            [interconnector(1, 2), interconnector(2, 1)],
            &zones,
        )
        .unwrap();
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("transmission.csv");
        fs::write(
            &file_path,
            "name,zone_source,zone_dest,year,value
intercon_cap_exo,1,2,2019,100
intercon_cap_exo,1,2,2020,100
intercon_cap_exo,1,3,2019,100
",
        )
        .unwrap();
        let exogenous = read_exogenous_transmission(&file_path).unwrap();
        let map = exogenous.between(EXOGENOUS_BASE_YEAR, 2020, &network);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&(ZoneID(1), ZoneID(2))], Capacity(200.0));
    }
}
