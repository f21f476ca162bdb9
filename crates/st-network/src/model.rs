//! Typed snapshot of the sections the topology resolver needs.

use crate::document::NetworkFile;
use crate::error::NetworkResult;
use crate::records::{Conduit, Coverage, Junction, LandUse, Subcatchment};

/// Parsed subcatchments, junctions, conduits, land uses and coverages.
///
/// Every section is optional; a missing section yields an empty collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkModel {
    pub subcatchments: Vec<Subcatchment>,
    pub junctions: Vec<Junction>,
    pub conduits: Vec<Conduit>,
    pub land_uses: Vec<LandUse>,
    pub coverages: Vec<Coverage>,
}

impl NetworkModel {
    pub fn from_file(file: &NetworkFile) -> NetworkResult<Self> {
        Ok(Self {
            subcatchments: file.optional_records()?,
            junctions: file.optional_records()?,
            conduits: file.optional_records()?,
            land_uses: file.optional_records()?,
            coverages: file.optional_records()?,
        })
    }
}
