//! Typed views of the sections the workspace reads.

/// A record type bound to one bracketed section.
pub trait SectionRecord: Sized {
    const SECTION: &'static str;

    /// Build the record from its whitespace-separated fields.
    fn from_fields(fields: &[&str]) -> Result<Self, String>;
}

fn require<'a>(fields: &[&'a str], index: usize, what: &str) -> Result<&'a str, String> {
    fields
        .get(index)
        .copied()
        .ok_or_else(|| format!("missing {} (field {})", what, index + 1))
}

fn number(fields: &[&str], index: usize, what: &str) -> Result<f64, String> {
    let raw = require(fields, index, what)?;
    raw.parse::<f64>()
        .map_err(|_| format!("{} '{}' is not a number", what, raw))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subcatchment {
    pub id: String,
    pub rain_gage: String,
    /// A junction or another subcatchment.
    pub outlet: String,
    pub area_ha: f64,
}

impl SectionRecord for Subcatchment {
    const SECTION: &'static str = "SUBCATCHMENTS";

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        Ok(Self {
            id: require(fields, 0, "name")?.to_string(),
            rain_gage: require(fields, 1, "rain gage")?.to_string(),
            outlet: require(fields, 2, "outlet")?.to_string(),
            area_ha: number(fields, 3, "area")?,
        })
    }
}

/// Field position of the outlet in a SUBCATCHMENTS record.
pub const SUBCATCHMENT_OUTLET: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct Junction {
    pub id: String,
    pub elevation: f64,
}

impl SectionRecord for Junction {
    const SECTION: &'static str = "JUNCTIONS";

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        Ok(Self {
            id: require(fields, 0, "name")?.to_string(),
            elevation: number(fields, 1, "elevation")?,
        })
    }
}

/// Field position of the invert elevation in a JUNCTIONS record.
pub const JUNCTION_ELEVATION: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Conduit {
    pub id: String,
    pub from: String,
    pub to: String,
    pub length: f64,
}

impl SectionRecord for Conduit {
    const SECTION: &'static str = "CONDUITS";

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        Ok(Self {
            id: require(fields, 0, "name")?.to_string(),
            from: require(fields, 1, "from node")?.to_string(),
            to: require(fields, 2, "to node")?.to_string(),
            length: number(fields, 3, "length")?,
        })
    }
}

pub const CONDUIT_FROM: usize = 1;
pub const CONDUIT_TO: usize = 2;
pub const CONDUIT_LENGTH: usize = 3;

/// Field positions that name a node, per section. Every other field holds a
/// value or a non-node id and is never renamed.
const NODE_REFERENCES: &[(&str, &[usize])] = &[
    ("JUNCTIONS", &[0]),
    ("OUTFALLS", &[0]),
    ("STORAGE", &[0]),
    ("DIVIDERS", &[0]),
    ("CONDUITS", &[CONDUIT_FROM, CONDUIT_TO]),
    ("PUMPS", &[1, 2]),
    ("ORIFICES", &[1, 2]),
    ("WEIRS", &[1, 2]),
    ("OUTLETS", &[1, 2]),
    ("SUBCATCHMENTS", &[SUBCATCHMENT_OUTLET]),
    ("COORDINATES", &[0]),
    ("TREATMENT", &[0]),
    ("INFLOWS", &[0]),
    ("DWF", &[0]),
    ("RDII", &[0]),
];

/// Node reference positions of a section; empty for sections without any.
pub fn node_reference_fields(section: &str) -> &'static [usize] {
    NODE_REFERENCES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(section))
        .map(|(_, fields)| *fields)
        .unwrap_or(&[])
}

#[derive(Debug, Clone, PartialEq)]
pub struct LandUse {
    pub id: String,
}

impl SectionRecord for LandUse {
    const SECTION: &'static str = "LANDUSES";

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        Ok(Self {
            id: require(fields, 0, "name")?.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    pub subcatchment: String,
    pub land_use: String,
    /// Percent of the subcatchment area, 0-100.
    pub percent: f64,
}

impl SectionRecord for Coverage {
    const SECTION: &'static str = "COVERAGES";

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        Ok(Self {
            subcatchment: require(fields, 0, "subcatchment")?.to_string(),
            land_use: require(fields, 1, "land use")?.to_string(),
            percent: number(fields, 2, "percent")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub node: String,
    pub x: f64,
    pub y: f64,
}

impl SectionRecord for Coordinate {
    const SECTION: &'static str = "COORDINATES";

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        Ok(Self {
            node: require(fields, 0, "node")?.to_string(),
            x: number(fields, 1, "x")?,
            y: number(fields, 2, "y")?,
        })
    }
}

/// One vertex of a subcatchment outline.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonVertex {
    pub subcatchment: String,
    pub x: f64,
    pub y: f64,
}

impl SectionRecord for PolygonVertex {
    const SECTION: &'static str = "POLYGONS";

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        Ok(Self {
            subcatchment: require(fields, 0, "subcatchment")?.to_string(),
            x: number(fields, 1, "x")?,
            y: number(fields, 2, "y")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct XSection {
    pub link: String,
    pub shape: String,
}

impl SectionRecord for XSection {
    const SECTION: &'static str = "XSECTIONS";

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        Ok(Self {
            link: require(fields, 0, "link")?.to_string(),
            shape: require(fields, 1, "shape")?.to_string(),
        })
    }
}

/// A treatment expression attached to a node, e.g. `J1 TSS R = 0.8`.
#[derive(Debug, Clone, PartialEq)]
pub struct Treatment {
    pub node: String,
    pub pollutant: String,
    pub function: String,
}

impl SectionRecord for Treatment {
    const SECTION: &'static str = "TREATMENT";

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        let node = require(fields, 0, "node")?.to_string();
        let pollutant = require(fields, 1, "pollutant")?.to_string();
        require(fields, 2, "function")?;
        Ok(Self {
            node,
            pollutant,
            function: fields[2..].join(" "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcatchment_fields() {
        let s = Subcatchment::from_fields(&["S1", "RG1", "J1", "2.5", "25"]).unwrap();
        assert_eq!(s.outlet, "J1");
        assert_eq!(s.area_ha, 2.5);
    }

    #[test]
    fn bad_number_is_reported() {
        let err = Junction::from_fields(&["J1", "ten"]).unwrap_err();
        assert!(err.contains("elevation"));
        let err = Conduit::from_fields(&["C1", "J1"]).unwrap_err();
        assert!(err.contains("to node"));
    }

    #[test]
    fn node_references_by_section() {
        assert_eq!(node_reference_fields("conduits"), &[1, 2]);
        assert_eq!(node_reference_fields("SUBCATCHMENTS"), &[2]);
        assert_eq!(node_reference_fields("Junctions"), &[0]);
        assert!(node_reference_fields("XSECTIONS").is_empty());
        assert!(node_reference_fields("OPTIONS").is_empty());
    }

    #[test]
    fn treatment_function_keeps_spaces() {
        let t = Treatment::from_fields(&["J1", "TSS", "R", "=", "0.8"]).unwrap();
        assert_eq!(t.function, "R = 0.8");
    }
}
