//! The transmission network connecting zones.
use crate::region::{ZoneID, ZoneMap};
use crate::technology::TechnologyID;
use crate::units::{Capacity, Dimensionless, MoneyPerCapacity};
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use log::warn;
use petgraph::Direction;
use petgraph::algo::kosaraju_scc;
use petgraph::graphmap::DiGraphMap;

/// Lifetime used to annualise interconnector build costs, in years
pub const INTERCONNECTOR_LIFETIME: u32 = 50;

/// A directed link between two zones
#[derive(Debug, Clone, PartialEq)]
pub struct Interconnector {
    /// Zone power flows out of
    pub zone_source: ZoneID,
    /// Zone power flows into
    pub zone_dest: ZoneID,
    /// Fraction of the flow lost in transit, charged on the sending side
    pub loss: Dimensionless,
    /// Thermal limit, used as the initial capacity where none is given
    pub limit: Capacity,
    /// Cost of new transfer capacity
    pub build_cost: MoneyPerCapacity,
}

impl Interconnector {
    /// The `(source, dest)` key of the link
    pub fn key(&self) -> (ZoneID, ZoneID) {
        (self.zone_source, self.zone_dest)
    }
}

/// A flow limit on a link which is tightened by the output of a hydro generator in a nearby zone.
///
/// These are literal network-study results for two specific links and cannot be derived from
/// general parameters. They only apply if the link and the generator both exist in the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkDerating {
    /// The derated link
    pub link: (ZoneID, ZoneID),
    /// Zone and technology whose dispatch tightens the limit
    pub generator: (ZoneID, TechnologyID),
    /// MW of transfer capacity lost per MW dispatched by the generator
    pub coefficient: f64,
}

/// The hard-coded deratings of the SWNSW/NVIC links by Murray and Tumut hydro output
pub const LINK_DERATINGS: [LinkDerating; 2] = [
    LinkDerating {
        link: (ZoneID(5), ZoneID(12)),
        generator: (ZoneID(5), TechnologyID(18)),
        coefficient: (1350.0 - 400.0) / 2303.0,
    },
    LinkDerating {
        link: (ZoneID(12), ZoneID(5)),
        generator: (ZoneID(12), TechnologyID(18)),
        coefficient: (1600.0 - 700.0) / 2222.0,
    },
];

/// The set of interconnectors between zones
#[derive(Debug, Clone, Default)]
pub struct Network {
    links: IndexMap<(ZoneID, ZoneID), Interconnector>,
    graph: DiGraphMap<ZoneID, ()>,
}

impl Network {
    /// Create a network from a list of links, checking them against the known zones.
    ///
    /// Every link must be declared in both directions.
    pub fn new<I>(links: I, zones: &ZoneMap) -> Result<Self>
    where
        I: IntoIterator<Item = Interconnector>,
    {
        let mut map = IndexMap::new();
        let mut graph = DiGraphMap::new();
        for zone in zones.keys() {
            graph.add_node(*zone);
        }

        for link in links {
            let (source, dest) = link.key();
            ensure!(
                zones.contains_key(&source) && zones.contains_key(&dest),
                "Interconnector {source}->{dest} refers to an unknown zone"
            );
            ensure!(source != dest, "Interconnector from zone {source} to itself");
            ensure!(
                (0.0..1.0).contains(&link.loss.value()),
                "Loss on interconnector {source}->{dest} must be >= 0 and < 1"
            );
            ensure!(
                link.limit.value() >= 0.0,
                "Limit on interconnector {source}->{dest} must be >= 0"
            );
            graph.add_edge(source, dest, ());
            ensure!(
                map.insert((source, dest), link).is_none(),
                "Interconnector {source}->{dest} declared more than once"
            );
        }

        for (source, dest) in map.keys() {
            ensure!(
                map.contains_key(&(*dest, *source)),
                "Interconnector {source}->{dest} has no reverse link {dest}->{source}"
            );
        }

        let network = Self { links: map, graph };
        if zones.len() > 1 && network.num_islands() > 1 {
            warn!(
                "Transmission network has {} disconnected parts",
                network.num_islands()
            );
        }

        Ok(network)
    }

    /// Iterate over all links in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Interconnector> {
        self.links.values()
    }

    /// Number of directed links
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the network has no links
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Look up a link
    pub fn get(&self, source: ZoneID, dest: ZoneID) -> Option<&Interconnector> {
        self.links.get(&(source, dest))
    }

    /// Whether the link exists
    pub fn contains(&self, source: ZoneID, dest: ZoneID) -> bool {
        self.links.contains_key(&(source, dest))
    }

    /// Zones which `zone` exports to
    pub fn destinations(&self, zone: ZoneID) -> impl Iterator<Item = ZoneID> + '_ {
        self.graph.neighbors_directed(zone, Direction::Outgoing)
    }

    /// Zones which `zone` imports from
    pub fn sources(&self, zone: ZoneID) -> impl Iterator<Item = ZoneID> + '_ {
        self.graph.neighbors_directed(zone, Direction::Incoming)
    }

    /// Number of islands in the network
    fn num_islands(&self) -> usize {
        kosaraju_scc(&self.graph).len()
    }
}
