//! Code for reading the transmission network from CSV files.
use super::{input_err_msg, read_csv, read_csv_optional};
use crate::network::{Interconnector, Network};
use crate::region::{ZoneID, ZoneMap};
use crate::units::{Capacity, Dimensionless, MoneyPerCapacity};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const INTERCONNECTORS_FILE_NAME: &str = "interconnectors.csv";
const INITIAL_TRANSMISSION_FILE_NAME: &str = "initial_transmission.csv";

#[derive(Debug, Deserialize)]
struct InterconnectorRaw {
    zone_source: ZoneID,
    zone_dest: ZoneID,
    #[serde(default)]
    loss: f64,
    limit: f64,
    #[serde(default)]
    build_cost: f64,
}

#[derive(Debug, Deserialize)]
struct TransmissionCapacityRaw {
    zone_source: ZoneID,
    zone_dest: ZoneID,
    capacity: f64,
}

/// Read the interconnectors between zones.
///
/// A template without an interconnector table describes a network without links.
pub fn read_network(template_dir: &Path, zones: &ZoneMap) -> Result<Network> {
    let file_path = template_dir.join(INTERCONNECTORS_FILE_NAME);
    let links = read_csv_optional::<InterconnectorRaw>(&file_path)?
        .into_iter()
        .map(|raw| Interconnector {
            zone_source: raw.zone_source,
            zone_dest: raw.zone_dest,
            loss: Dimensionless(raw.loss),
            limit: Capacity(raw.limit),
            build_cost: MoneyPerCapacity(raw.build_cost),
        });

    Network::new(links, zones).with_context(|| input_err_msg(&file_path))
}

/// Read the transmission capacity at the start of the first simulated year.
///
/// Links without an entry start at their thermal limit.
pub fn read_initial_transmission(
    template_dir: &Path,
    network: &Network,
) -> Result<IndexMap<(ZoneID, ZoneID), Capacity>> {
    let file_path = template_dir.join(INITIAL_TRANSMISSION_FILE_NAME);
    let mut capacity: IndexMap<_, _> = network
        .iter()
        .map(|link| (link.key(), link.limit))
        .collect();

    if file_path.exists() {
        let rows: Vec<TransmissionCapacityRaw> = read_csv(&file_path)?;
        for row in rows {
            let key = (row.zone_source, row.zone_dest);
            let entry = capacity
                .get_mut(&key)
                .with_context(|| format!("Unknown interconnector {}->{}", key.0, key.1))
                .with_context(|| input_err_msg(&file_path))?;
            ensure!(
                row.capacity >= 0.0,
                "{}: capacity must be >= 0",
                input_err_msg(&file_path)
            );
            *entry = Capacity(row.capacity);
        }
    }

    Ok(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::zones;
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    #[rstest]
    fn read_network_and_initial_capacity(zones: ZoneMap) {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(INTERCONNECTORS_FILE_NAME),
            "zone_source,zone_dest,loss,limit,build_cost\n1,2,0.05,500,1000\n2,1,0.05,400,1000\n",
        )
        .unwrap();
        let network = read_network(dir.path(), &zones).unwrap();
        assert_eq!(network.len(), 2);

        let initial = read_initial_transmission(dir.path(), &network).unwrap();
        assert_eq!(initial[&(ZoneID(1), ZoneID(2))], Capacity(500.0));

        fs::write(
            dir.path().join(INITIAL_TRANSMISSION_FILE_NAME),
            "zone_source,zone_dest,capacity\n2,1,250\n",
        )
        .unwrap();
        let initial = read_initial_transmission(dir.path(), &network).unwrap();
        assert_eq!(initial[&(ZoneID(2), ZoneID(1))], Capacity(250.0));
        assert_eq!(initial[&(ZoneID(1), ZoneID(2))], Capacity(500.0));
    }

    #[rstest]
    fn missing_table_means_no_links(zones: ZoneMap) {
        let dir = tempdir().unwrap();
        let network = read_network(dir.path(), &zones).unwrap();
        assert!(network.is_empty());
    }
}
