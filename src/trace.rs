//! Hourly demand and capacity factor traces.
//!
//! Traces are read once for the whole horizon and sampled at the timestamps of each model's
//! timeline.
use crate::region::{RegionID, ZoneID, ZoneMap};
use crate::technology::{TechnologyID, TechnologyMap, ZoneTechnologyMap};
use crate::timeline::{IntervalID, Timeline};
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Capacity factors below this value are treated as zero
pub const CAPACITY_FACTOR_THRESHOLD: f64 = 1e-5;

/// A series of values keyed by timestamp
pub type Series = BTreeMap<NaiveDateTime, f64>;

/// The share of a region's demand which falls in a zone
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneDemandFactor {
    /// The same share at all times
    Constant(f64),
    /// A share for each timestamp
    Series(Series),
}

impl ZoneDemandFactor {
    fn at(&self, zone_id: ZoneID, ts: NaiveDateTime) -> Result<f64> {
        match self {
            Self::Constant(factor) => Ok(*factor),
            Self::Series(series) => series
                .get(&ts)
                .copied()
                .with_context(|| format!("No demand factor for zone {zone_id} at {ts}")),
        }
    }
}

/// All time series inputs of a scenario
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Traces {
    /// Demand per region (MW)
    pub demand: IndexMap<RegionID, Series>,
    /// Share of regional demand per zone
    pub zone_demand_factors: IndexMap<ZoneID, ZoneDemandFactor>,
    /// Capacity factor traces for (zone, technology) pairs
    pub capacity_factors: IndexMap<(ZoneID, TechnologyID), Series>,
}

impl Traces {
    /// The timestamps between `start` and `end` (inclusive) for which demand is given.
    ///
    /// Every region must have demand for the same timestamps.
    pub fn timestamps_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<NaiveDateTime>> {
        let mut regions = self.demand.iter();
        let (first_region, first_series) = regions.next().context("No demand traces")?;
        let timestamps: Vec<_> = first_series.range(start..=end).map(|(ts, _)| *ts).collect();
        ensure!(
            !timestamps.is_empty(),
            "No demand for region {first_region} between {start} and {end}"
        );

        for (region_id, series) in regions {
            ensure!(
                series.range(start..=end).map(|(ts, _)| ts).eq(timestamps.iter()),
                "Demand timestamps for region {region_id} do not match region {first_region}"
            );
        }

        Ok(timestamps)
    }

    /// Demand for a region at a timestamp
    pub fn region_demand(&self, region_id: RegionID, ts: NaiveDateTime) -> Result<f64> {
        self.demand
            .get(&region_id)
            .and_then(|series| series.get(&ts))
            .copied()
            .with_context(|| format!("No demand for region {region_id} at {ts}"))
    }

    /// Sample the traces at the intervals of a timeline.
    ///
    /// Capacity factors are given for every generator and hybrid pair; pairs without a trace use the
    /// technology default. Values below [`CAPACITY_FACTOR_THRESHOLD`] become zero.
    pub fn sample(
        &self,
        zones: &ZoneMap,
        technologies: &TechnologyMap,
        zone_technologies: &ZoneTechnologyMap,
        timeline: &Timeline,
    ) -> Result<SampledTraces> {
        let timestamps = timeline.timestamps();

        let mut region_demand = IndexMap::new();
        for region_id in self.demand.keys() {
            let values = timestamps
                .iter()
                .map(|ts| self.region_demand(*region_id, *ts))
                .collect::<Result<Vec<_>>>()?;
            region_demand.insert(*region_id, values);
        }

        let mut zone_demand = IndexMap::new();
        for zone in zones.values() {
            let regional = region_demand
                .get(&zone.region_id)
                .with_context(|| format!("No demand for region {}", zone.region_id))?;
            let factor = self
                .zone_demand_factors
                .get(&zone.id)
                .with_context(|| format!("No demand factor for zone {}", zone.id))?;
            let values = timestamps
                .iter()
                .zip(regional)
                .map(|(ts, demand)| Ok(demand * factor.at(zone.id, *ts)?))
                .collect::<Result<Vec<_>>>()?;
            zone_demand.insert(zone.id, values);
        }

        let mut capacity_factor = IndexMap::new();
        for key in zone_technologies.keys() {
            let technology = &technologies[&key.1];
            if technology.is_storage() {
                continue;
            }

            let values = match self.capacity_factors.get(key) {
                Some(series) => timestamps
                    .iter()
                    .map(|ts| {
                        series.get(ts).copied().with_context(|| {
                            format!(
                                "No capacity factor for technology {} in zone {} at {ts}",
                                key.1, key.0
                            )
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
                None => vec![technology.default_capacity_factor.value(); timestamps.len()],
            };
            let values = values
                .into_iter()
                .map(|cf| if cf < CAPACITY_FACTOR_THRESHOLD { 0.0 } else { cf })
                .collect();
            capacity_factor.insert(*key, values);
        }

        Ok(SampledTraces {
            region_demand,
            zone_demand,
            capacity_factor,
        })
    }
}

/// Traces sampled at the intervals of one timeline
#[derive(Debug, Clone, PartialEq)]
pub struct SampledTraces {
    region_demand: IndexMap<RegionID, Vec<f64>>,
    zone_demand: IndexMap<ZoneID, Vec<f64>>,
    capacity_factor: IndexMap<(ZoneID, TechnologyID), Vec<f64>>,
}

impl SampledTraces {
    /// Demand of a region (MW)
    pub fn region_demand(&self, region_id: RegionID, t: IntervalID) -> f64 {
        self.region_demand
            .get(&region_id)
            .map_or(0.0, |values| values[t.value() as usize])
    }

    /// Demand of a zone (MW)
    pub fn zone_demand(&self, zone_id: ZoneID, t: IntervalID) -> f64 {
        self.zone_demand
            .get(&zone_id)
            .map_or(0.0, |values| values[t.value() as usize])
    }

    /// Capacity factor of a pair, zero for storage pairs
    pub fn capacity_factor(&self, zone_id: ZoneID, technology_id: TechnologyID, t: IntervalID) -> f64 {
        self.capacity_factor
            .get(&(zone_id, technology_id))
            .map_or(0.0, |values| values[t.value() as usize])
    }
}
