//! Regions and zones describe the geography of the transmission network.
//!
//! A zone is a node of the network and belongs to exactly one region. Regional quantities (demand,
//! renewable targets, the unserved energy cap) are shared out between the zones of a region.
use crate::id::{define_id_getter, define_id_type};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::ops::RangeInclusive;

define_id_type! {RegionID}
define_id_type! {ZoneID}

/// IDs of the regions of the National Electricity Market
pub const NEM_REGIONS: RangeInclusive<u32> = 1..=5;

/// A map of [`Region`]s, keyed by region ID
pub type RegionMap = IndexMap<RegionID, Region>;

/// A map of [`Zone`]s, keyed by zone ID
pub type ZoneMap = IndexMap<ZoneID, Zone>;

/// A planning region, i.e. a group of zones
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Region {
    /// A unique identifier for the region
    pub id: RegionID,
    /// Human-readable name (e.g. "NSW")
    pub name: String,
}
define_id_getter! {Region, RegionID}

/// A node in the transmission network
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Zone {
    /// A unique identifier for the zone
    pub id: ZoneID,
    /// Human-readable name (e.g. "NCEN")
    pub name: String,
    /// The region the zone belongs to
    pub region_id: RegionID,
}
define_id_getter! {Zone, ZoneID}

/// Get the zones in each region, in zone order.
///
/// Regions without zones are included with an empty set.
pub fn zones_per_region(regions: &RegionMap, zones: &ZoneMap) -> IndexMap<RegionID, IndexSet<ZoneID>> {
    let mut map: IndexMap<_, _> = regions.keys().map(|id| (*id, IndexSet::new())).collect();
    for zone in zones.values() {
        map.entry(zone.region_id).or_default().insert(zone.id);
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{regions, zones};
    use rstest::rstest;

    #[rstest]
    fn zones_grouped_by_region(regions: RegionMap, zones: ZoneMap) {
        let map = zones_per_region(&regions, &zones);
        assert_eq!(map.len(), 2);
        assert_eq!(
            map[&RegionID(1)].iter().copied().collect::<Vec<_>>(),
            [ZoneID(1), ZoneID(2)]
        );
        assert_eq!(
            map[&RegionID(2)].iter().copied().collect::<Vec<_>>(),
            [ZoneID(3)]
        );
    }
}
