//! st-network: network file model and topology for stormtrap.
//!
//! Provides:
//! - A line-preserving model of bracketed network files (sections, records)
//! - Typed record views and a small network model
//! - Subcatchment -> manhole topology with land-use area breakdowns
//! - Junction separation, treatment and option edits
//! - GIS layer export
//!
//! # Example
//!
//! ```
//! use st_network::{NetworkFile, NetworkModel, resolve};
//!
//! let text = "[SUBCATCHMENTS]\nS1  RG1  J1  2\nS2  RG1  S1  1\n";
//! let doc = NetworkFile::parse(text);
//! let topology = resolve(&NetworkModel::from_file(&doc).unwrap()).unwrap();
//!
//! assert_eq!(topology.manholes, vec!["J1"]);
//! assert_eq!(topology.inlets["J1"], vec!["S1", "S2"]);
//! assert_eq!(doc.to_string(), text);
//! ```

pub mod document;
pub mod edit;
pub mod error;
pub mod gis;
pub(crate) mod index;
pub mod model;
pub mod records;
pub mod separate;
pub mod topology;

pub use document::{Line, NetworkFile, Record, Section};
pub use edit::{
    PollutantProcess, TimeSteps, change_buildup_washoff, change_time_steps, set_options,
    set_treatment,
};
pub use error::{NetworkError, NetworkResult};
pub use gis::{GisLayers, build_layers};
pub use index::SectionSpan;
pub use model::NetworkModel;
pub use records::{SectionRecord, Treatment};
pub use separate::{Separation, SeparationOptions, separate_junctions};
pub use topology::{LandUseArea, Topology, resolve};
