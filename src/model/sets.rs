//! Index sets derived once from the declared (zone, technology) pairs.
use crate::network::Network;
use crate::region::{RegionID, RegionMap, ZoneID, ZoneMap, zones_per_region};
use crate::technology::{TechnologyID, TechnologyMap, TechnologyTag, ZoneTechnologyMap};
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use strum::{Display, EnumIter, IntoEnumIterator};

/// A set of technologies within a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum TechSet {
    /// All generators
    Generator,
    /// All storage technologies
    Storage,
    /// All hybrid technologies
    Hybrid,
    /// Generators which can be retired endogenously
    Retireable,
    /// Generators which burn fuel
    Fuel,
    /// Generators subject to unit commitment
    Commitment,
    /// Renewable generators
    Renewable,
    /// Dispatchable generators
    Dispatchable,
    /// Renewable generators which can be dispatched on demand
    RenewableDispatchable,
}

/// The technology sets of one zone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneSets(IndexMap<TechSet, IndexSet<TechnologyID>>);

impl ZoneSets {
    /// The technologies in a set
    pub fn get(&self, set: TechSet) -> impl Iterator<Item = TechnologyID> + '_ {
        self.0.get(&set).into_iter().flatten().copied()
    }

    /// Whether a technology is in a set
    pub fn contains(&self, set: TechSet, technology_id: TechnologyID) -> bool {
        self.0
            .get(&set)
            .is_some_and(|techs| techs.contains(&technology_id))
    }

    fn insert(&mut self, set: TechSet, technology_id: TechnologyID) {
        self.0.entry(set).or_default().insert(technology_id);
    }
}

/// Sparse index sets of the model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSets {
    zones: IndexMap<ZoneID, ZoneSets>,
    zones_per_region: IndexMap<RegionID, IndexSet<ZoneID>>,
    region_of_zone: IndexMap<ZoneID, RegionID>,
    links_per_zone: IndexMap<ZoneID, IndexSet<ZoneID>>,
}

impl ModelSets {
    /// Build the sets from the declared pairs and validate them against the declarations
    pub fn new(
        regions: &RegionMap,
        zones: &ZoneMap,
        technologies: &TechnologyMap,
        zone_technologies: &ZoneTechnologyMap,
        network: &Network,
    ) -> Result<Self> {
        let mut zone_sets: IndexMap<_, _> =
            zones.keys().map(|id| (*id, ZoneSets::default())).collect();

        for (zone_id, technology_id) in zone_technologies.keys() {
            let technology = technologies
                .get(technology_id)
                .with_context(|| format!("Unknown technology {technology_id}"))?;
            let sets = zone_sets
                .get_mut(zone_id)
                .with_context(|| format!("Unknown zone {zone_id}"))?;

            if technology.is_storage() {
                sets.insert(TechSet::Storage, *technology_id);
                continue;
            }
            if technology.is_hybrid() {
                sets.insert(TechSet::Hybrid, *technology_id);
                continue;
            }

            sets.insert(TechSet::Generator, *technology_id);
            if technology.capacity_class.has_retirement() {
                sets.insert(TechSet::Retireable, *technology_id);
            }
            if technology.commitment.is_some() {
                sets.insert(TechSet::Commitment, *technology_id);
            }
            for (tag, set) in [
                (TechnologyTag::Fuel, TechSet::Fuel),
                (TechnologyTag::Renewable, TechSet::Renewable),
                (TechnologyTag::Dispatchable, TechSet::Dispatchable),
                (
                    TechnologyTag::RenewableDispatchable,
                    TechSet::RenewableDispatchable,
                ),
            ] {
                if technology.has_tag(tag) {
                    sets.insert(set, *technology_id);
                }
            }
        }

        let links_per_zone = zones
            .keys()
            .map(|zone_id| (*zone_id, network.destinations(*zone_id).collect()))
            .collect();

        let model_sets = Self {
            zones: zone_sets,
            zones_per_region: zones_per_region(regions, zones),
            region_of_zone: zones.values().map(|zone| (zone.id, zone.region_id)).collect(),
            links_per_zone,
        };
        model_sets.validate(zone_technologies, network)?;

        Ok(model_sets)
    }

    /// Check that every index refers to a declared pair or link
    fn validate(&self, zone_technologies: &ZoneTechnologyMap, network: &Network) -> Result<()> {
        for (zone_id, sets) in &self.zones {
            for set in TechSet::iter() {
                for technology_id in sets.get(set) {
                    ensure!(
                        zone_technologies.contains_key(&(*zone_id, technology_id)),
                        "Technology {technology_id} in {set} set of zone {zone_id} is not declared"
                    );
                }
            }
            for subset in [
                TechSet::Retireable,
                TechSet::Fuel,
                TechSet::Commitment,
                TechSet::Renewable,
                TechSet::Dispatchable,
                TechSet::RenewableDispatchable,
            ] {
                for technology_id in sets.get(subset) {
                    ensure!(
                        sets.contains(TechSet::Generator, technology_id),
                        "Technology {technology_id} in {subset} set of zone {zone_id} is not a generator"
                    );
                }
            }
        }
        for (source, dests) in &self.links_per_zone {
            for dest in dests {
                ensure!(
                    network.contains(*source, *dest),
                    "Interconnector {source}->{dest} is not declared"
                );
            }
        }

        Ok(())
    }

    /// Iterate over zones
    pub fn zones(&self) -> impl Iterator<Item = ZoneID> + '_ {
        self.zones.keys().copied()
    }

    /// Iterate over regions
    pub fn regions(&self) -> impl Iterator<Item = RegionID> + '_ {
        self.zones_per_region.keys().copied()
    }

    /// The technology sets of a zone
    pub fn zone(&self, zone_id: ZoneID) -> &ZoneSets {
        &self.zones[&zone_id]
    }

    /// The zones in a region
    pub fn zones_in_region(&self, region_id: RegionID) -> impl Iterator<Item = ZoneID> + '_ {
        self.zones_per_region
            .get(&region_id)
            .into_iter()
            .flatten()
            .copied()
    }

    /// The region of a zone
    pub fn region_of(&self, zone_id: ZoneID) -> RegionID {
        self.region_of_zone[&zone_id]
    }

    /// Destinations of links leaving a zone
    pub fn links_from(&self, zone_id: ZoneID) -> impl Iterator<Item = ZoneID> + '_ {
        self.links_per_zone
            .get(&zone_id)
            .into_iter()
            .flatten()
            .copied()
    }

    /// All (zone, technology) pairs in a set
    pub fn pairs(&self, set: TechSet) -> impl Iterator<Item = (ZoneID, TechnologyID)> + '_ {
        self.zones
            .iter()
            .flat_map(move |(zone_id, sets)| sets.get(set).map(move |tech| (*zone_id, tech)))
    }

    /// The (zone, technology) pairs in a set within one region
    pub fn pairs_in_region(
        &self,
        region_id: RegionID,
        set: TechSet,
    ) -> impl Iterator<Item = (ZoneID, TechnologyID)> + '_ {
        self.zones_in_region(region_id)
            .flat_map(move |zone_id| self.zone(zone_id).get(set).map(move |tech| (zone_id, tech)))
    }

    /// Generators in a set which are not subject to unit commitment
    pub fn flexible_pairs(&self, set: TechSet) -> impl Iterator<Item = (ZoneID, TechnologyID)> + '_ {
        self.pairs(set)
            .filter(|(zone_id, tech)| !self.zone(*zone_id).contains(TechSet::Commitment, *tech))
    }
}
