//! Technologies are the generation, storage and hybrid archetypes that can hold capacity in a zone.
use crate::id::{define_id_getter, define_id_type};
use crate::region::ZoneID;
use crate::units::{
    Capacity, Dimensionless, Energy, FuelPerEnergy, MoneyPerCapacity, MoneyPerEnergy, MoneyPerFuel,
};
use anyhow::{Result, bail, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use strum::{Display, EnumIter, EnumString};

define_id_type! {TechnologyID}

/// A map of [`Technology`]s, keyed by technology ID
pub type TechnologyMap = IndexMap<TechnologyID, Technology>;

/// A map of the declared (zone, technology) pairs
pub type ZoneTechnologyMap = IndexMap<(ZoneID, TechnologyID), ZoneTechnology>;

/// Default lifetime of a technology in years
pub const DEFAULT_LIFETIME: u32 = 30;

/// Default round-trip efficiency of storage technologies
pub const DEFAULT_ROUND_TRIP_EFFICIENCY: f64 = 0.8;

/// Default collector multiple of hybrid technologies
pub const DEFAULT_COLLECTOR_MULTIPLE: f64 = 1.0;

/// Default part-load efficiency ratio of commitment technologies
pub const DEFAULT_EFFRATE: f64 = 0.9;

/// Default minimum stable load of commitment technologies, as a fraction of committed capacity
pub const DEFAULT_MINCAP: f64 = 0.5;

/// Default emission rate of fuel-burning technologies (kg CO2/MWh)
pub const DEFAULT_EMIT_RATE: f64 = 800.0;

/// Default fuel price for fuel-burning technologies ($/GJ)
pub const DEFAULT_FUEL_PRICE: f64 = 100.0;

/// Default heat rate for fuel-burning technologies (GJ/MWh)
pub const DEFAULT_HEAT_RATE: f64 = 15.0;

/// Default build limit of a (zone, technology) pair (MW)
pub const DEFAULT_BUILD_LIMIT: f64 = 100_000.0;

/// Default cost of endogenously retiring capacity ($/MW)
pub const DEFAULT_RETIREMENT_COST: f64 = 60_000.0;

/// The technology whose build limit in a zone also caps the zone's hybrid capacity
pub const LAND_CONSTRAINED_TECHNOLOGY: TechnologyID = TechnologyID(11);

/// Tags classifying a technology.
///
/// A technology can carry any number of tags. They decide which sets the technology belongs to and
/// therefore which constraints apply to it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TechnologyTag {
    /// Variable renewable generation
    Renewable,
    /// Counts towards the operating reserve
    Dispatchable,
    /// Renewable generation that can be dispatched on demand
    RenewableDispatchable,
    /// Burns fuel
    Fuel,
    /// Subject to linearised unit commitment
    Commitment,
    /// Capacity can be endogenously retired
    Retireable,
    /// No new capacity can be built
    NoBuild,
    /// A storage technology
    Storage,
    /// A hybrid generation and storage technology
    Hybrid,
}

/// The physical behaviour of a technology
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TechnologyKind {
    /// Generates electricity
    Generator,
    /// Charges from and discharges into the network
    Storage {
        /// Fraction of charged energy that can be discharged
        round_trip_efficiency: Dimensionless,
        /// Hours of discharge at nameplate capacity
        charge_hours: f64,
    },
    /// Charges from its own collector field and discharges into the network
    Hybrid {
        /// Size of the collector field relative to nameplate capacity
        collector_multiple: Dimensionless,
        /// Hours of discharge at nameplate capacity
        charge_hours: f64,
    },
}

impl TechnologyKind {
    /// Hours of storage, if the technology stores energy
    pub fn charge_hours(&self) -> Option<f64> {
        match self {
            Self::Generator => None,
            Self::Storage { charge_hours, .. } | Self::Hybrid { charge_hours, .. } => {
                Some(*charge_hours)
            }
        }
    }
}

/// How the operating capacity of a technology is accounted for from one year to the next.
///
/// Every class starts from the initial capacity plus exogenous builds. Buildable classes add an
/// endogenous new-build term and retireable classes subtract endogenous and exogenous retirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CapacityClass {
    /// `init + exo + new`
    Buildable,
    /// `init + exo + new - ret - ret_exo`
    BuildableRetireable,
    /// `init + exo`
    Fixed,
    /// `init + exo - ret - ret_exo`
    FixedRetireable,
}

impl CapacityClass {
    /// Select the class from the build and retirement eligibility of a technology
    pub fn new(buildable: bool, retireable: bool) -> Self {
        match (buildable, retireable) {
            (true, false) => Self::Buildable,
            (true, true) => Self::BuildableRetireable,
            (false, false) => Self::Fixed,
            (false, true) => Self::FixedRetireable,
        }
    }

    /// Whether an endogenous new-build variable appears in the recursion
    pub fn has_new_build(self) -> bool {
        matches!(self, Self::Buildable | Self::BuildableRetireable)
    }

    /// Whether retirement terms appear in the recursion
    pub fn has_retirement(self) -> bool {
        matches!(self, Self::BuildableRetireable | Self::FixedRetireable)
    }
}

/// Parameters of the linearised unit commitment formulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CommitmentParameters {
    /// Startup fuel per MW started (GJ/MW)
    pub penalty: f64,
    /// Fraction of capacity that can be ramped up in one interval
    pub rate_up: f64,
    /// Fraction of capacity that can be ramped down in one interval
    pub rate_down: f64,
    /// Minimum number of intervals a unit stays on once started
    pub uptime: u32,
    /// Minimum stable load as a fraction of committed capacity
    pub mincap: f64,
    /// Efficiency at minimum load relative to full load
    pub effrate: f64,
}

impl CommitmentParameters {
    /// Check the parameters are physically meaningful
    pub fn validate(&self) -> Result<()> {
        ensure!(self.penalty >= 0.0, "penalty must be >= 0");
        ensure!(
            (0.0..=1.0).contains(&self.rate_up) && (0.0..=1.0).contains(&self.rate_down),
            "Ramp rates must be between 0 and 1"
        );
        ensure!(self.uptime >= 1, "uptime must be at least one interval");
        ensure!(
            (0.0..1.0).contains(&self.mincap),
            "mincap must be >= 0 and < 1"
        );
        ensure!(
            self.effrate > 0.0 && self.effrate <= 1.0,
            "effrate must be > 0 and <= 1"
        );

        Ok(())
    }
}

/// A technology archetype
#[derive(Debug, Clone, PartialEq)]
pub struct Technology {
    /// Unique identifier
    pub id: TechnologyID,
    /// Human-readable name
    pub name: String,
    /// Classification tags
    pub tags: IndexSet<TechnologyTag>,
    /// Generator, storage or hybrid behaviour
    pub kind: TechnologyKind,
    /// Capacity accounting class
    pub capacity_class: CapacityClass,
    /// Economic lifetime in years
    pub lifetime: u32,
    /// Overnight build cost, before regional adjustment
    pub build_cost: MoneyPerCapacity,
    /// Fixed operation and maintenance cost per year
    pub cost_fom: MoneyPerCapacity,
    /// Variable operation and maintenance cost
    pub cost_vom: MoneyPerEnergy,
    /// Cost of endogenous retirement
    pub cost_retire: MoneyPerCapacity,
    /// Emission rate in kg CO2/MWh
    pub emit_rate: f64,
    /// Capacity factor used where no trace is given for a zone
    pub default_capacity_factor: Dimensionless,
    /// Unit commitment parameters, for technologies tagged [`TechnologyTag::Commitment`]
    pub commitment: Option<CommitmentParameters>,
}
define_id_getter! {Technology, TechnologyID}

impl Technology {
    /// Whether the technology carries the given tag
    pub fn has_tag(&self, tag: TechnologyTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Whether the technology is a plain generator
    pub fn is_generator(&self) -> bool {
        matches!(self.kind, TechnologyKind::Generator)
    }

    /// Whether the technology is a storage technology
    pub fn is_storage(&self) -> bool {
        matches!(self.kind, TechnologyKind::Storage { .. })
    }

    /// Whether the technology is a hybrid technology
    pub fn is_hybrid(&self) -> bool {
        matches!(self.kind, TechnologyKind::Hybrid { .. })
    }
}

/// A technology which may hold capacity in a particular zone.
///
/// The set of these pairs is the sparsity pattern of the model: capacity and dispatch variables
/// only exist for declared pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneTechnology {
    /// The zone
    pub zone_id: ZoneID,
    /// The technology
    pub technology_id: TechnologyID,
    /// Build cost in this zone, after regional and connection adjustments
    pub build_cost: MoneyPerCapacity,
    /// Fuel price, zero for technologies which do not burn fuel
    pub fuel_price: MoneyPerFuel,
    /// Full-load heat rate, zero for technologies which do not burn fuel
    pub heat_rate: FuelPerEnergy,
    /// Maximum operating capacity in this zone
    pub build_limit: Capacity,
}

/// Caps on annual generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationLimits {
    /// Maximum annual energy of a (zone, technology) pair
    pub zone_energy: IndexMap<(ZoneID, TechnologyID), Energy>,
    /// Maximum annual capacity factor of a (zone, technology) pair
    pub zone_capacity_factor: IndexMap<(ZoneID, TechnologyID), Dimensionless>,
    /// Maximum annual energy of a technology across all zones
    pub system_energy: IndexMap<TechnologyID, Energy>,
}

impl GenerationLimits {
    /// Whether no limits are set
    pub fn is_empty(&self) -> bool {
        self.zone_energy.is_empty()
            && self.zone_capacity_factor.is_empty()
            && self.system_energy.is_empty()
    }
}

/// Work out the [`TechnologyKind`] from tags and the optional storage columns
pub fn technology_kind(
    id: TechnologyID,
    tags: &IndexSet<TechnologyTag>,
    round_trip_efficiency: Option<f64>,
    charge_hours: Option<f64>,
    collector_multiple: Option<f64>,
) -> Result<TechnologyKind> {
    let storage = tags.contains(&TechnologyTag::Storage);
    let hybrid = tags.contains(&TechnologyTag::Hybrid);
    ensure!(
        !(storage && hybrid),
        "Technology {id} cannot be both storage and hybrid"
    );

    let kind = if storage {
        let Some(charge_hours) = charge_hours.or_else(|| default_charge_hours(id)) else {
            bail!("Storage technology {id} has no charge_hours");
        };
        let rt = round_trip_efficiency.unwrap_or(DEFAULT_ROUND_TRIP_EFFICIENCY);
        ensure!(
            rt > 0.0 && rt <= 1.0,
            "round_trip_efficiency of technology {id} must be > 0 and <= 1"
        );
        TechnologyKind::Storage {
            round_trip_efficiency: Dimensionless(rt),
            charge_hours,
        }
    } else if hybrid {
        let Some(charge_hours) = charge_hours else {
            bail!("Hybrid technology {id} has no charge_hours");
        };
        let col_mult = collector_multiple.unwrap_or(DEFAULT_COLLECTOR_MULTIPLE);
        ensure!(
            col_mult >= 0.0,
            "collector_multiple of technology {id} must be >= 0"
        );
        TechnologyKind::Hybrid {
            collector_multiple: Dimensionless(col_mult),
            charge_hours,
        }
    } else {
        TechnologyKind::Generator
    };

    if let Some(hours) = kind.charge_hours() {
        ensure!(
            hours >= 0.0,
            "charge_hours of technology {id} must be >= 0"
        );
    }

    Ok(kind)
}

/// Default lifetime for the technology, in years
pub fn default_lifetime(id: TechnologyID) -> u32 {
    match id.value() {
        14 | 21 => 50,
        15 => 15,
        _ => DEFAULT_LIFETIME,
    }
}

/// Default hours of storage for the well-known storage technologies
pub fn default_charge_hours(id: TechnologyID) -> Option<f64> {
    match id.value() {
        14 => Some(6.0),
        15 => Some(2.0),
        21 => Some(168.0),
        _ => None,
    }
}

/// Default unit commitment parameters for the well-known thermal technologies
pub fn default_commitment(id: TechnologyID) -> Option<CommitmentParameters> {
    let (penalty, rate_up, rate_down, uptime) = match id.value() {
        2 | 3 => (19.0, 0.68, 0.87, 4),
        4 | 5 => (41.0, 0.67, 0.67, 12),
        6 => (41.0, 0.45, 0.41, 12),
        7 => (41.0, 0.99, 0.41, 12),
        19 => (25.0, 0.67, 0.67, 12),
        _ => return None,
    };

    Some(CommitmentParameters {
        penalty,
        rate_up,
        rate_down,
        uptime,
        mincap: DEFAULT_MINCAP,
        effrate: DEFAULT_EFFRATE,
    })
}

/// Parse a `;`-separated list of tags
pub fn parse_tags(s: &str) -> Result<IndexSet<TechnologyTag>> {
    let mut tags = IndexSet::new();
    for tag in s.split(';').map(str::trim).filter(|t| !t.is_empty()) {
        let Ok(parsed) = tag.parse() else {
            bail!("Unknown technology tag: {tag}");
        };
        ensure!(tags.insert(parsed), "Duplicate technology tag: {tag}");
    }

    Ok(tags)
}
