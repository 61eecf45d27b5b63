//! Parameters of the model for one simulated year.
//!
//! These combine the static template data with the custom costs, exogenous capacity changes and
//! policy settings of the year and with the state carried forward from the previous year.
use super::{Model, TransmissionMap};
use crate::config::YearPolicy;
use crate::finance::capital_recovery_factor;
use crate::input::capacity::CapacityMap;
use crate::input::exogenous::CostName;
use crate::network::INTERCONNECTOR_LIFETIME;
use crate::region::ZoneID;
use crate::technology::{CapacityClass, TechnologyID};
use crate::units::{
    Capacity, Dimensionless, FuelPerEnergy, Money, MoneyPerCapacity, MoneyPerEnergy, MoneyPerFuel,
};
use anyhow::Result;
use indexmap::IndexMap;
use log::warn;

/// State passed from one simulated year to the next
#[derive(Debug, Clone, PartialEq)]
pub struct CarryForward {
    /// Operating capacity per (zone, technology) pair
    pub capacity: CapacityMap,
    /// Transfer capacity per link
    pub transmission: TransmissionMap,
    /// Cumulative annualised capital cost of simulated builds per zone
    pub cost: IndexMap<ZoneID, Money>,
}

impl CarryForward {
    /// The state before the first simulated year
    pub fn initial(model: &Model) -> Self {
        Self {
            capacity: model.initial_capacity.clone(),
            transmission: model.initial_transmission.clone(),
            cost: model.zones.keys().map(|id| (*id, Money(0.0))).collect(),
        }
    }
}

/// Costs, limits and capacities of one (zone, technology) pair
#[derive(Debug, Clone, PartialEq)]
pub struct PairParameters {
    /// Cost of new capacity
    pub build_cost: MoneyPerCapacity,
    /// Fuel price, zero for technologies which burn no fuel
    pub fuel_price: MoneyPerFuel,
    /// Full-load heat rate
    pub heat_rate: FuelPerEnergy,
    /// Fixed O&M per year
    pub cost_fom: MoneyPerCapacity,
    /// Variable O&M
    pub cost_vom: MoneyPerEnergy,
    /// Cost of endogenous retirement
    pub cost_retire: MoneyPerCapacity,
    /// Annuity factor for the technology's lifetime
    pub fixed_charge_rate: Dimensionless,
    /// Maximum operating capacity
    pub build_limit: Capacity,
    /// Operating capacity at the start of the year
    pub initial: Capacity,
    /// Exogenous new capacity
    pub exogenous_built: Capacity,
    /// Exogenous retirements
    pub exogenous_retired: Capacity,
    /// Whether the pair can be built and retired
    pub capacity_class: CapacityClass,
}

impl PairParameters {
    /// Annualised cost of building `capacity`
    pub fn annualised_build_cost(&self, capacity: Capacity) -> Money {
        self.build_cost * capacity * self.fixed_charge_rate
    }
}

/// Costs and capacities of one directed link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkParameters {
    /// Fraction of the flow lost, charged on the sending side
    pub loss: Dimensionless,
    /// Cost of new transfer capacity
    pub build_cost: MoneyPerCapacity,
    /// Annuity factor for interconnectors
    pub fixed_charge_rate: Dimensionless,
    /// Transfer capacity at the start of the year
    pub initial: Capacity,
    /// Exogenous new transfer capacity
    pub exogenous: Capacity,
}

impl LinkParameters {
    /// Annualised cost of building `capacity`
    pub fn annualised_build_cost(&self, capacity: Capacity) -> Money {
        self.build_cost * capacity * self.fixed_charge_rate
    }
}

/// All year-dependent parameters of the model
#[derive(Debug, Clone, PartialEq)]
pub struct YearParameters {
    /// The simulated year
    pub year: u32,
    /// Discount rate used for annuities
    pub discount_rate: Dimensionless,
    /// Policy settings for the year
    pub policy: YearPolicy,
    /// Parameters per declared (zone, technology) pair
    pub pairs: IndexMap<(ZoneID, TechnologyID), PairParameters>,
    /// Parameters per link
    pub links: IndexMap<(ZoneID, ZoneID), LinkParameters>,
    /// Cumulative annualised cost of builds in earlier simulated years, per zone
    pub carried_cost: IndexMap<ZoneID, Money>,
    /// Annualised cost of builds before the first simulated year, per zone
    pub historical_repayment: IndexMap<ZoneID, Money>,
}

impl YearParameters {
    /// Assemble the parameters for a simulated year.
    ///
    /// # Arguments
    ///
    /// * `model` - The model
    /// * `year` - The simulated year
    /// * `state` - Capacity and costs carried forward from the previous simulated year
    pub fn new(model: &Model, year: u32, state: &CarryForward) -> Result<Self> {
        let policy = model.config.policy_for_year(year)?;
        let discount_rate = model.config.scenario.discount_rate;
        let previous_year = model.config.previous_year(year);

        let changes = model.exogenous_capacity.between(
            previous_year,
            year,
            &model.technologies,
            &model.zone_technologies,
        );
        let mut pairs = IndexMap::new();
        for (key, pair) in &model.zone_technologies {
            let technology = &model.technologies[&key.1];
            let capacity = |map: &CapacityMap| map.get(key).copied().unwrap_or(Capacity(0.0));
            pairs.insert(
                *key,
                PairParameters {
                    build_cost: pair.build_cost,
                    fuel_price: pair.fuel_price,
                    heat_rate: pair.heat_rate,
                    cost_fom: technology.cost_fom,
                    cost_vom: technology.cost_vom,
                    cost_retire: technology.cost_retire,
                    fixed_charge_rate: capital_recovery_factor(technology.lifetime, discount_rate),
                    build_limit: pair.build_limit,
                    initial: capacity(&state.capacity),
                    exogenous_built: capacity(&changes.built),
                    exogenous_retired: capacity(&changes.retired),
                    capacity_class: technology.capacity_class,
                },
            );
        }
        apply_custom_costs(model, year, &mut pairs);

        let network = &model.network;
        let exogenous_transmission = model
            .exogenous_transmission
            .between(previous_year, year, network);
        let fixed_charge_rate = capital_recovery_factor(INTERCONNECTOR_LIFETIME, discount_rate);
        let links = network
            .iter()
            .map(|link| {
                let key = link.key();
                let parameters = LinkParameters {
                    loss: link.loss,
                    build_cost: link.build_cost,
                    fixed_charge_rate,
                    initial: state.transmission.get(&key).copied().unwrap_or(link.limit),
                    exogenous: exogenous_transmission
                        .get(&key)
                        .copied()
                        .unwrap_or(Capacity(0.0)),
                };
                (key, parameters)
            })
            .collect();

        Ok(Self {
            year,
            discount_rate,
            policy,
            pairs,
            links,
            carried_cost: state.cost.clone(),
            historical_repayment: model.historical_repayment.clone(),
        })
    }

    /// Parameters of a (zone, technology) pair
    pub fn pair(&self, zone_id: ZoneID, technology_id: TechnologyID) -> &PairParameters {
        &self.pairs[&(zone_id, technology_id)]
    }

    /// Parameters of a link
    pub fn link(&self, source: ZoneID, dest: ZoneID) -> &LinkParameters {
        &self.links[&(source, dest)]
    }

    /// Annualised capital repayments owed by a zone this year
    pub fn repayment(&self, zone_id: ZoneID) -> Money {
        let carried = self.carried_cost.get(&zone_id).copied().unwrap_or_default();
        let historical = self
            .historical_repayment
            .get(&zone_id)
            .copied()
            .unwrap_or_default();
        carried + historical
    }

    /// Annualised cost of this year's exogenous builds originating in a zone
    pub fn exogenous_build_cost(&self, zone_id: ZoneID) -> Money {
        let pairs: Money = self
            .pairs
            .iter()
            .filter(|((zone, _), _)| *zone == zone_id)
            .map(|(_, pair)| pair.annualised_build_cost(pair.exogenous_built))
            .sum();
        let links: Money = self
            .links
            .iter()
            .filter(|((source, _), _)| *source == zone_id)
            .map(|(_, link)| link.annualised_build_cost(link.exogenous))
            .sum();
        pairs + links
    }
}

/// Override template costs with the custom costs for the year.
///
/// Technology-wide build costs are applied first so that costs given for a particular zone take
/// precedence.
fn apply_custom_costs(
    model: &Model,
    year: u32,
    pairs: &mut IndexMap<(ZoneID, TechnologyID), PairParameters>,
) {
    let mut costs: Vec<_> = model.custom_costs.for_year(year).collect();
    costs.sort_by_key(|(cost, _)| cost.name.is_per_pair());

    for (cost, value) in costs {
        let Some(technology) = model.technologies.get(&cost.technology_id) else {
            warn!(
                "Dropping custom cost {} for unknown technology {}",
                cost.name, cost.technology_id
            );
            continue;
        };
        if !cost.name.applies_to(&technology.kind) {
            warn!(
                "Dropping custom cost {} for technology {}: wrong kind of technology",
                cost.name, cost.technology_id
            );
            continue;
        }

        let targets: Vec<_> = match cost.zone_id {
            Some(zone_id) if cost.name.is_per_pair() => {
                let key = (zone_id, cost.technology_id);
                if !pairs.contains_key(&key) {
                    warn!(
                        "Dropping custom cost {} for technology {} in zone {zone_id}: not declared \
                         in the zone",
                        cost.name, cost.technology_id
                    );
                    continue;
                }
                vec![key]
            }
            _ => pairs
                .keys()
                .filter(|(_, tech)| *tech == cost.technology_id)
                .copied()
                .collect(),
        };

        for key in targets {
            let pair = &mut pairs[&key];
            match cost.name {
                CostName::CostGenBuild
                | CostName::CostStorBuild
                | CostName::CostHybBuild
                | CostName::BuildCost => pair.build_cost = MoneyPerCapacity(value),
                CostName::CostFuel => pair.fuel_price = MoneyPerFuel(value),
                CostName::CostGenFom | CostName::CostStorFom | CostName::CostHybFom => {
                    pair.cost_fom = MoneyPerCapacity(value);
                }
                CostName::CostGenVom | CostName::CostStorVom | CostName::CostHybVom => {
                    pair.cost_vom = MoneyPerEnergy(value);
                }
            }
        }
    }
}

/// Annualised cost of the capacity built in a zone during a year.
///
/// This is what the zone carries forward on top of its previous obligations.
pub fn annualised_cost_of_builds(
    parameters: &YearParameters,
    zone_id: ZoneID,
    new_capacity: &CapacityMap,
    new_transmission: &TransmissionMap,
) -> Money {
    let endogenous_pairs: Money = new_capacity
        .iter()
        .filter(|((zone, _), _)| *zone == zone_id)
        .map(|((zone, tech), capacity)| {
            parameters
                .pair(*zone, *tech)
                .annualised_build_cost(*capacity)
        })
        .sum();
    let endogenous_links: Money = new_transmission
        .iter()
        .filter(|((source, _), _)| *source == zone_id)
        .map(|((source, dest), capacity)| {
            parameters
                .link(*source, *dest)
                .annualised_build_cost(*capacity)
        })
        .sum();

    endogenous_pairs + endogenous_links + parameters.exogenous_build_cost(zone_id)
}
