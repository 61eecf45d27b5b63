//! Code for reading regions and zones from CSV files.
use super::{input_err_msg, read_csv_id_file};
use crate::region::{RegionMap, ZoneMap};
use anyhow::{Context, Result, ensure};
use std::path::Path;

const REGIONS_FILE_NAME: &str = "regions.csv";
const ZONES_FILE_NAME: &str = "zones.csv";

/// Reads regions from a CSV file.
///
/// # Arguments
///
/// * `template_dir` - Folder containing the template tables
pub fn read_regions(template_dir: &Path) -> Result<RegionMap> {
    read_csv_id_file(&template_dir.join(REGIONS_FILE_NAME))
}

/// Reads zones from a CSV file, checking that each belongs to a known region.
///
/// # Arguments
///
/// * `template_dir` - Folder containing the template tables
/// * `regions` - All known regions
pub fn read_zones(template_dir: &Path, regions: &RegionMap) -> Result<ZoneMap> {
    let file_path = template_dir.join(ZONES_FILE_NAME);
    let zones: ZoneMap = read_csv_id_file(&file_path)?;
    validate_zones(&zones, regions).with_context(|| input_err_msg(&file_path))?;

    Ok(zones)
}

fn validate_zones(zones: &ZoneMap, regions: &RegionMap) -> Result<()> {
    for zone in zones.values() {
        ensure!(
            regions.contains_key(&zone.region_id),
            "Zone {} belongs to unknown region {}",
            zone.id,
            zone.region_id
        );
    }

    for region in regions.values() {
        ensure!(
            zones.values().any(|zone| zone.region_id == region.id),
            "Region {} has no zones",
            region.id
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{Region, RegionID, ZoneID};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn read_regions_and_zones() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(REGIONS_FILE_NAME),
            "id,name\n1,NSW\n2,QLD\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(ZONES_FILE_NAME),
            "id,name,region_id\n7,NCEN,1\n4,SEQ,2\n",
        )
        .unwrap();

        let regions = read_regions(dir.path()).unwrap();
        assert_eq!(
            regions[&RegionID(1)],
            Region {
                id: RegionID(1),
                name: "NSW".to_string()
            }
        );

        let zones = read_zones(dir.path(), &regions).unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[&ZoneID(4)].region_id, RegionID(2));
    }

    #[test]
    fn zone_in_unknown_region() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(REGIONS_FILE_NAME), "id,name\n1,NSW\n").unwrap();
        fs::write(
            dir.path().join(ZONES_FILE_NAME),
            "id,name,region_id\n7,NCEN,1\n4,SEQ,2\n",
        )
        .unwrap();

        let regions = read_regions(dir.path()).unwrap();
        let err = read_zones(dir.path(), &regions).unwrap_err();
        assert_eq!(
            err.root_cause().to_string(),
            "Zone 4 belongs to unknown region 2"
        );
    }
}
