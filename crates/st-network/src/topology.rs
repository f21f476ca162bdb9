//! Subcatchment -> junction topology.
//!
//! Answers four questions about a parsed network:
//! - which junctions receive subcatchment runoff ("manholes"),
//! - which subcatchments (possibly through chains of other subcatchments) drain
//!   into each manhole,
//! - which manholes also receive conduit inflow and must be split,
//! - how much area of each land use drains into each manhole.

use std::collections::{BTreeMap, HashMap, HashSet};

use st_core::hectares_to_m2;

use crate::error::{NetworkError, NetworkResult};
use crate::model::NetworkModel;
use crate::records::Subcatchment;

/// Area draining into one junction, split by land use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandUseArea {
    pub total: f64,
    pub by_land_use: BTreeMap<String, f64>,
}

impl LandUseArea {
    fn add(&mut self, land_use: &str, area: f64) {
        *self.by_land_use.entry(land_use.to_string()).or_insert(0.0) += area;
        self.total += area;
    }

    /// Share of one land use in percent; zero when the total is zero.
    pub fn share_percent(&self, land_use: &str) -> f64 {
        let area = self.by_land_use.get(land_use).copied().unwrap_or(0.0);
        st_core::percent_of(area, self.total)
    }

    /// Same breakdown converted from hectares to square meters.
    pub fn to_m2(&self) -> LandUseArea {
        LandUseArea {
            total: hectares_to_m2(self.total),
            by_land_use: self
                .by_land_use
                .iter()
                .map(|(k, v)| (k.clone(), hectares_to_m2(*v)))
                .collect(),
        }
    }

    /// Accumulate another breakdown into this one.
    pub fn merge(&mut self, other: &LandUseArea) {
        for (land_use, area) in &other.by_land_use {
            *self.by_land_use.entry(land_use.clone()).or_insert(0.0) += area;
        }
        self.total += other.total;
    }
}

/// Resolved topology of a network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    /// Junctions receiving subcatchment runoff, in first-appearance order.
    pub manholes: Vec<String>,
    /// Manhole -> subcatchments whose outlet chain ends there.
    pub inlets: BTreeMap<String, Vec<String>>,
    /// Manholes that are also the downstream end of a conduit.
    pub to_separate: Vec<String>,
    /// Land use -> manholes receiving runoff from that land use.
    pub land_use_pools: BTreeMap<String, Vec<String>>,
    /// Manhole -> land-use area breakdown in hectares.
    pub areas: BTreeMap<String, LandUseArea>,
    /// Declared land uses followed by any only seen in coverages.
    pub land_uses: Vec<String>,
}

impl Topology {
    pub fn is_manhole(&self, id: &str) -> bool {
        self.inlets.contains_key(id)
    }

    pub fn needs_separation(&self, id: &str) -> bool {
        self.to_separate.iter().any(|j| j == id)
    }
}

/// Map every subcatchment to the non-subcatchment node its chain ends at.
///
/// Chains of any length are followed; already resolved links are reused.
pub fn terminal_outlets(subcatchments: &[Subcatchment]) -> NetworkResult<HashMap<&str, &str>> {
    let outlet_of: HashMap<&str, &str> = subcatchments
        .iter()
        .map(|s| (s.id.as_str(), s.outlet.as_str()))
        .collect();

    let mut resolved: HashMap<&str, &str> = HashMap::with_capacity(outlet_of.len());
    for sub in subcatchments {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = sub.id.as_str();
        let terminal = loop {
            if let Some(&terminal) = resolved.get(current) {
                break terminal;
            }
            if !seen.insert(current) {
                return Err(NetworkError::CyclicOutlet {
                    subcatchment: sub.id.clone(),
                });
            }
            chain.push(current);
            let next = outlet_of[current];
            if !outlet_of.contains_key(next) {
                break next;
            }
            current = next;
        };
        for link in chain {
            resolved.insert(link, terminal);
        }
    }
    Ok(resolved)
}

fn push_unique(list: &mut Vec<String>, id: &str) {
    if !list.iter().any(|x| x == id) {
        list.push(id.to_string());
    }
}

pub fn resolve(model: &NetworkModel) -> NetworkResult<Topology> {
    let sub_ids: HashSet<&str> = model.subcatchments.iter().map(|s| s.id.as_str()).collect();
    let terminal = terminal_outlets(&model.subcatchments)?;

    let mut topology = Topology::default();

    for sub in &model.subcatchments {
        if !sub_ids.contains(sub.outlet.as_str()) {
            push_unique(&mut topology.manholes, &sub.outlet);
        }
    }

    for manhole in &topology.manholes {
        topology.inlets.insert(manhole.clone(), Vec::new());
    }
    for sub in &model.subcatchments {
        let end = terminal[sub.id.as_str()];
        if let Some(list) = topology.inlets.get_mut(end) {
            list.push(sub.id.clone());
        }
    }

    for conduit in &model.conduits {
        if topology.inlets.contains_key(&conduit.to) {
            push_unique(&mut topology.to_separate, &conduit.to);
        }
    }

    for land_use in &model.land_uses {
        push_unique(&mut topology.land_uses, &land_use.id);
    }
    for coverage in &model.coverages {
        push_unique(&mut topology.land_uses, &coverage.land_use);
    }

    let area_of: HashMap<&str, f64> = model
        .subcatchments
        .iter()
        .map(|s| (s.id.as_str(), s.area_ha))
        .collect();
    let mut coverages_of: HashMap<&str, Vec<(&str, f64)>> = HashMap::new();
    for c in &model.coverages {
        coverages_of
            .entry(c.subcatchment.as_str())
            .or_default()
            .push((c.land_use.as_str(), c.percent));
    }

    for (manhole, subs) in &topology.inlets {
        let mut area = LandUseArea::default();
        for land_use in &topology.land_uses {
            area.by_land_use.insert(land_use.clone(), 0.0);
        }
        for sub in subs {
            let sub_area = area_of.get(sub.as_str()).copied().unwrap_or(0.0);
            for &(land_use, percent) in coverages_of.get(sub.as_str()).into_iter().flatten() {
                area.add(land_use, percent / 100.0 * sub_area);
                let pool = topology
                    .land_use_pools
                    .entry(land_use.to_string())
                    .or_default();
                push_unique(pool, manhole);
            }
        }
        topology.areas.insert(manhole.clone(), area);
    }

    tracing::debug!(
        manholes = topology.manholes.len(),
        to_separate = topology.to_separate.len(),
        "resolved network topology"
    );
    Ok(topology)
}
