//! The static description of a scenario: geography, technologies, network and input data.
//!
//! A [`Model`] is read once and is read-only afterwards. Everything which changes between simulated
//! years is derived from it by [`parameters::YearParameters`].
use crate::config::ScenarioConfig;
use crate::input::capacity::{CapacityMap, read_historical_repayments, read_initial_capacity};
use crate::input::exogenous::{
    CustomCosts, ExogenousCapacity, ExogenousTransmission, read_custom_costs,
    read_exogenous_capacity, read_exogenous_transmission,
};
use crate::input::network::{read_initial_transmission, read_network};
use crate::input::region::{read_regions, read_zones};
use crate::input::technology::{read_generation_limits, read_technologies, read_zone_technologies};
use crate::input::trace::read_traces;
use crate::network::Network;
use crate::region::{RegionMap, ZoneID, ZoneMap};
use crate::technology::{GenerationLimits, TechnologyMap, ZoneTechnologyMap};
use crate::trace::Traces;
use crate::units::{Capacity, Money};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::info;
use std::path::Path;

pub mod adjust;
pub mod parameters;
pub mod sets;
use sets::ModelSets;

/// Transfer capacity per directed link
pub type TransmissionMap = IndexMap<(ZoneID, ZoneID), Capacity>;

/// Model definition
#[derive(Debug, Clone)]
pub struct Model {
    /// The scenario file
    pub config: ScenarioConfig,
    /// Planning regions
    pub regions: RegionMap,
    /// Network zones
    pub zones: ZoneMap,
    /// Technology archetypes
    pub technologies: TechnologyMap,
    /// The declared (zone, technology) pairs
    pub zone_technologies: ZoneTechnologyMap,
    /// Interconnectors between zones
    pub network: Network,
    /// Index sets derived from the declared pairs
    pub sets: ModelSets,
    /// Operating capacity before the first simulated year
    pub initial_capacity: CapacityMap,
    /// Transfer capacity before the first simulated year
    pub initial_transmission: TransmissionMap,
    /// Annualised repayments for capacity built before the first simulated year
    pub historical_repayment: IndexMap<ZoneID, Money>,
    /// Caps on annual generation
    pub generation_limits: GenerationLimits,
    /// Demand and capacity factor traces
    pub traces: Traces,
    /// Cost overrides per year
    pub custom_costs: CustomCosts,
    /// Dated exogenous capacity changes
    pub exogenous_capacity: ExogenousCapacity,
    /// Dated exogenous transmission builds
    pub exogenous_transmission: ExogenousTransmission,
}

impl Model {
    /// Read a scenario file and every table it refers to.
    ///
    /// # Arguments
    ///
    /// * `scenario_path` - Path to the scenario file
    pub fn from_path<P: AsRef<Path>>(scenario_path: P) -> Result<Model> {
        let config = ScenarioConfig::from_path(scenario_path)?;
        Self::from_config(config)
    }

    /// Read the tables referred to by an already-validated scenario
    pub fn from_config(config: ScenarioConfig) -> Result<Model> {
        let template_dir = config.advanced.template.clone();
        let template_dir = template_dir.as_path();
        info!("Reading template data from {}", template_dir.display());

        let regions = read_regions(template_dir)?;
        let zones = read_zones(template_dir, &regions)?;
        let technologies = read_technologies(template_dir)?;
        let zone_technologies = read_zone_technologies(template_dir, &zones, &technologies)?;
        let network = read_network(template_dir, &zones)?;
        let initial_capacity = read_initial_capacity(template_dir, &zone_technologies)?;
        let initial_transmission = read_initial_transmission(template_dir, &network)?;
        let historical_repayment = read_historical_repayments(template_dir, &zones)?;
        let generation_limits =
            read_generation_limits(template_dir, &technologies, &zone_technologies)?;
        let traces = read_traces(
            template_dir,
            &regions,
            &zones,
            &technologies,
            &zone_technologies,
        )?;

        let advanced = &config.advanced;
        let custom_costs = advanced
            .custom_costs
            .as_deref()
            .map(read_custom_costs)
            .transpose()?
            .unwrap_or_default();
        let exogenous_capacity = advanced
            .exogenous_capacity
            .as_deref()
            .map(read_exogenous_capacity)
            .transpose()?
            .unwrap_or_default();
        let exogenous_transmission = advanced
            .exogenous_transmission
            .as_deref()
            .map(read_exogenous_transmission)
            .transpose()?
            .unwrap_or_default();

        let sets = ModelSets::new(
            &regions,
            &zones,
            &technologies,
            &zone_technologies,
            &network,
        )?;

        let model = Model {
            config,
            regions,
            zones,
            technologies,
            zone_technologies,
            network,
            sets,
            initial_capacity,
            initial_transmission,
            historical_repayment,
            generation_limits,
            traces,
            custom_costs,
            exogenous_capacity,
            exogenous_transmission,
        };
        model.validate()?;
        info!(
            "Scenario '{}': {} zones, {} technologies, {} interconnectors",
            model.config.scenario.name,
            model.zones.len(),
            model.technologies.len(),
            model.network.len()
        );

        Ok(model)
    }

    /// Check the scenario against the template data
    fn validate(&self) -> Result<()> {
        for ratios in &self.config.scenario.region_ret_ratio {
            ensure!(
                self.regions.contains_key(&ratios.region),
                "region_ret_ratio refers to unknown region {}",
                ratios.region
            );
        }
        for region_id in self.regions.keys() {
            ensure!(
                self.sets.zones_in_region(*region_id).next().is_some(),
                "Region {region_id} has no zones"
            );
        }
        for year in self.config.years() {
            let (start, end) = crate::timeline::financial_year_bounds(*year)?;
            self.traces
                .timestamps_between(start, end)
                .with_context(|| format!("No demand trace for financial year {year}"))?;
        }

        Ok(())
    }
}
