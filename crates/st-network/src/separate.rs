//! Junction separation.
//!
//! A manhole that also receives conduit inflow is split in two: the original
//! node keeps the conduit connections and a new `id+suffix` node takes the
//! subcatchment runoff. The two are joined by a short synthetic conduit, so a
//! treatment placed on the `+suffix` node only sees runoff. Manholes with no
//! conduit inflow are renamed to `id+suffix` instead, which keeps treatment
//! targets uniformly named.

use std::collections::HashSet;

use st_core::{StError, StResult, ensure_finite, scaled_add};

use crate::document::{NetworkFile, Record};
use crate::error::NetworkResult;
use crate::records::{
    CONDUIT_FROM, CONDUIT_LENGTH, CONDUIT_TO, JUNCTION_ELEVATION, SUBCATCHMENT_OUTLET,
};
use crate::topology::Topology;

#[derive(Debug, Clone, PartialEq)]
pub struct SeparationOptions {
    pub suffix: String,
    /// Elevation drop of the new node; the sign is ignored.
    pub height_offset: f64,
    /// Shift of the new node on both map axes.
    pub coord_offset: f64,
    /// Length given to the synthetic conduit.
    pub conduit_length: f64,
}

impl SeparationOptions {
    /// Reject options that would write an unusable network.
    pub fn validate(&self) -> StResult<()> {
        if self.suffix.is_empty() {
            return Err(StError::InvalidArg {
                what: "junction suffix must not be empty",
            });
        }
        ensure_finite(self.height_offset, "height_offset")?;
        ensure_finite(self.coord_offset, "coord_offset")?;
        if ensure_finite(self.conduit_length, "conduit_length")? <= 0.0 {
            return Err(StError::InvalidArg {
                what: "conduit_length must be positive",
            });
        }
        Ok(())
    }
}

/// Outcome of a separation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Separation {
    /// Every manhole id as it exists after separation.
    pub manholes: Vec<String>,
    /// Original ids of the split junctions.
    pub split: Vec<String>,
    /// Original ids of the renamed manholes.
    pub renamed: Vec<String>,
    /// Conduits whose records were cloned for the synthetic links.
    pub template_conduits: Vec<String>,
    suffix: String,
}

impl Separation {
    /// Name under which an original junction id receives runoff now.
    ///
    /// Looks the suffixed name up among the manholes, so ids written before
    /// separation still resolve when the file was already separated by an
    /// earlier run.
    pub fn resolve_id(&self, original: &str) -> String {
        let runoff = suffixed(original, &self.suffix);
        if self.manholes.contains(&runoff) {
            runoff
        } else {
            original.to_string()
        }
    }
}

fn suffixed(id: &str, suffix: &str) -> String {
    format!("{}{}", id, suffix)
}

/// Split and rename manholes in place.
///
/// The edit runs on a copy of the document that replaces the original only when
/// every step succeeded. Running it again on its own output changes nothing.
pub fn separate_junctions(
    file: &mut NetworkFile,
    topology: &Topology,
    options: &SeparationOptions,
) -> NetworkResult<Separation> {
    options.validate()?;
    let suffix = options.suffix.as_str();
    let split: Vec<String> = topology.to_separate.clone();
    let split_set: HashSet<&str> = split.iter().map(String::as_str).collect();
    let mut work = file.clone();

    redirect_outlets(&mut work, &split_set, suffix)?;
    insert_junctions(&mut work, &split, suffix, options.height_offset)?;
    let templates = insert_conduits(&mut work, &split_set, suffix, options.conduit_length)?;
    duplicate_xsections(&mut work, &templates, suffix)?;
    insert_coordinates(&mut work, &split, suffix, options.coord_offset)?;

    let mut renamed = Vec::new();
    for manhole in &topology.manholes {
        if split_set.contains(manhole.as_str()) || manhole.ends_with(suffix) {
            continue;
        }
        let count = work.rename_node(manhole, &suffixed(manhole, suffix));
        tracing::trace!(manhole = %manhole, references = count, "renamed manhole");
        renamed.push(manhole.clone());
    }

    let manholes = topology
        .manholes
        .iter()
        .map(|m| {
            if m.ends_with(suffix) {
                m.clone()
            } else {
                suffixed(m, suffix)
            }
        })
        .collect();

    *file = work;
    tracing::info!(
        split = split.len(),
        renamed = renamed.len(),
        "separated junctions"
    );
    Ok(Separation {
        manholes,
        split,
        renamed,
        template_conduits: templates,
        suffix: suffix.to_string(),
    })
}

fn redirect_outlets(work: &mut NetworkFile, split: &HashSet<&str>, suffix: &str) -> NetworkResult<()> {
    if split.is_empty() || !work.has_section("SUBCATCHMENTS") {
        return Ok(());
    }
    for record in work.section_mut("SUBCATCHMENTS")?.records_mut() {
        let Some(outlet) = record.field(SUBCATCHMENT_OUTLET).map(str::to_string) else {
            continue;
        };
        if split.contains(outlet.as_str()) {
            record.set_field(SUBCATCHMENT_OUTLET, &suffixed(&outlet, suffix));
        }
    }
    Ok(())
}

/// Clone the record of `id` in `section`, rewrite it, and insert it before the original.
fn insert_clone_before(
    work: &mut NetworkFile,
    section: &str,
    id: &str,
    rewrite: impl FnOnce(&mut Record),
) -> NetworkResult<bool> {
    let section = work.section_mut(section)?;
    let Some(pos) = section.position_of(id) else {
        return Ok(false);
    };
    let Some(mut clone) = section.lines()[pos].as_record().cloned() else {
        return Ok(false);
    };
    rewrite(&mut clone);
    section.insert(pos, clone)?;
    Ok(true)
}

fn insert_junctions(
    work: &mut NetworkFile,
    split: &[String],
    suffix: &str,
    height_offset: f64,
) -> NetworkResult<()> {
    if split.is_empty() {
        return Ok(());
    }
    for id in split {
        let inserted = insert_clone_before(work, "JUNCTIONS", id, |record| {
            record.set_field(0, &suffixed(id, suffix));
            let lowered = record
                .field(JUNCTION_ELEVATION)
                .and_then(|e| e.parse::<f64>().ok())
                .map(|e| scaled_add(e, -height_offset.abs()));
            if let Some(elevation) = lowered {
                record.set_field(JUNCTION_ELEVATION, &elevation.to_string());
            }
        })?;
        if !inserted {
            tracing::warn!(junction = %id, "no [JUNCTIONS] record to split");
        }
    }
    Ok(())
}

/// Returns the conduit ids used as templates, one per split junction.
fn insert_conduits(
    work: &mut NetworkFile,
    split: &HashSet<&str>,
    suffix: &str,
    conduit_length: f64,
) -> NetworkResult<Vec<String>> {
    let mut templates: Vec<(String, String)> = Vec::new();
    if split.is_empty() {
        return Ok(Vec::new());
    }
    let mut linked: HashSet<String> = HashSet::new();
    for record in work.section("CONDUITS")?.records() {
        let (Some(id), Some(to)) = (record.id(), record.field(CONDUIT_TO)) else {
            continue;
        };
        if split.contains(to) && linked.insert(to.to_string()) {
            templates.push((id.to_string(), to.to_string()));
        }
    }

    for (conduit, to) in &templates {
        insert_clone_before(work, "CONDUITS", conduit, |record| {
            record.set_field(0, &suffixed(conduit, suffix));
            record.set_field(CONDUIT_FROM, &suffixed(to, suffix));
            record.set_field(CONDUIT_TO, to);
            record.set_field(CONDUIT_LENGTH, &conduit_length.to_string());
        })?;
    }
    Ok(templates.into_iter().map(|(c, _)| c).collect())
}

fn duplicate_xsections(work: &mut NetworkFile, templates: &[String], suffix: &str) -> NetworkResult<()> {
    if templates.is_empty() {
        return Ok(());
    }
    if !work.has_section("XSECTIONS") {
        tracing::debug!("no [XSECTIONS] section, skipping cross-sections");
        return Ok(());
    }
    for conduit in templates {
        insert_clone_before(work, "XSECTIONS", conduit, |record| {
            record.set_field(0, &suffixed(conduit, suffix));
        })?;
    }
    Ok(())
}

fn insert_coordinates(
    work: &mut NetworkFile,
    split: &[String],
    suffix: &str,
    coord_offset: f64,
) -> NetworkResult<()> {
    if split.is_empty() {
        return Ok(());
    }
    if !work.has_section("COORDINATES") {
        tracing::debug!("no [COORDINATES] section, skipping node positions");
        return Ok(());
    }
    for id in split {
        insert_clone_before(work, "COORDINATES", id, |record| {
            record.set_field(0, &suffixed(id, suffix));
            for axis in [1, 2] {
                let shifted = record
                    .field(axis)
                    .and_then(|v| v.parse::<f64>().ok())
                    .map(|v| scaled_add(v, coord_offset));
                if let Some(v) = shifted {
                    record.set_field(axis, &v.to_string());
                }
            }
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use crate::model::NetworkModel;
    use crate::topology::resolve;

    const NET: &str = "\
[SUBCATCHMENTS]
;;Name  Rain  Outlet  Area
S1      RG1   J1      2
S2      RG1   S1      1
S3      RG1   J2      1.5

[JUNCTIONS]
;;Name  Elev
J0      12
J1      10
J2      11

[CONDUITS]
;;Name  From  To  Length
C1      J0    J1  50
C2      J2    J1  30

[XSECTIONS]
C1      CIRCULAR  0.5
C2      CIRCULAR  0.4

[COORDINATES]
J0      0     0
J1      100   0
J2      100   50
";

    fn options() -> SeparationOptions {
        SeparationOptions {
            suffix: "_m".into(),
            height_offset: 0.01,
            coord_offset: 1.0,
            conduit_length: 0.1,
        }
    }

    fn run(doc: &mut NetworkFile) -> Separation {
        let topo = resolve(&NetworkModel::from_file(doc).unwrap()).unwrap();
        separate_junctions(doc, &topo, &options()).unwrap()
    }

    #[test]
    fn split_and_rename() {
        let mut doc = NetworkFile::parse(NET);
        let sep = run(&mut doc);
        assert_eq!(sep.split, vec!["J1"]);
        assert_eq!(sep.renamed, vec!["J2"]);
        assert_eq!(sep.template_conduits, vec!["C1"]);
        assert_eq!(sep.manholes, vec!["J1_m", "J2_m"]);
        assert_eq!(sep.resolve_id("J1"), "J1_m");
        assert_eq!(sep.resolve_id("J0"), "J0");

        let junctions = doc.parse_records("JUNCTIONS").unwrap();
        assert_eq!(junctions[1], vec!["J1_m", "9.99"]);
        assert_eq!(junctions[2], vec!["J1", "10"]);
        assert_eq!(junctions[3], vec!["J2_m", "11"]);

        let conduits = doc.parse_records("CONDUITS").unwrap();
        assert_eq!(conduits[0], vec!["C1_m", "J1_m", "J1", "0.1"]);
        assert_eq!(conduits[2], vec!["C2", "J2_m", "J1", "30"]);

        let xs = doc.parse_records("XSECTIONS").unwrap();
        assert_eq!(xs[0], vec!["C1_m", "CIRCULAR", "0.5"]);

        let coords = doc.parse_records("COORDINATES").unwrap();
        assert_eq!(coords[1], vec!["J1_m", "101", "1"]);

        let subs = doc.parse_records("SUBCATCHMENTS").unwrap();
        assert_eq!(subs[0][2], "J1_m");
        assert_eq!(subs[1][2], "S1");
        assert_eq!(subs[2][2], "J2_m");
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut doc = NetworkFile::parse(NET);
        run(&mut doc);
        let once = doc.to_string();

        let topo = resolve(&NetworkModel::from_file(&doc).unwrap()).unwrap();
        assert!(topo.to_separate.is_empty());

        let sep = separate_junctions(&mut doc, &topo, &options()).unwrap();
        assert_eq!(doc.to_string(), once);
        assert!(sep.split.is_empty());
        assert!(sep.renamed.is_empty());
        assert_eq!(sep.manholes, vec!["J1_m", "J2_m"]);
        assert_eq!(sep.resolve_id("J1"), "J1_m");
        assert_eq!(sep.resolve_id("J2"), "J2_m");
        assert_eq!(sep.resolve_id("J1_m"), "J1_m");
        assert_eq!(sep.resolve_id("J0"), "J0");
    }

    #[test]
    fn numeric_ids_keep_value_fields() {
        let text = "\
[SUBCATCHMENTS]
S1  RG1  10  2

[JUNCTIONS]
10  10  0
20  12  0

[CONDUITS]
C1  10  20  10

[XSECTIONS]
C1  CIRCULAR  10

[COORDINATES]
10  10  5
20  10  10
";
        let mut doc = NetworkFile::parse(text);
        let sep = run(&mut doc);
        assert!(sep.split.is_empty());
        assert_eq!(sep.renamed, vec!["10"]);

        let expected = text
            .replace("S1  RG1  10  2", "S1  RG1  10_m 2")
            .replace("10  10  0", "10_m 10  0")
            .replace("C1  10  20  10", "C1  10_m 20  10")
            .replace("10  10  5", "10_m 10  5");
        assert_eq!(doc.to_string(), expected);
    }

    #[test]
    fn invalid_options_are_rejected_before_editing() {
        let mut doc = NetworkFile::parse(NET);
        let topo = resolve(&NetworkModel::from_file(&doc).unwrap()).unwrap();
        let bad = [
            SeparationOptions {
                suffix: String::new(),
                ..options()
            },
            SeparationOptions {
                height_offset: f64::NAN,
                ..options()
            },
            SeparationOptions {
                coord_offset: f64::INFINITY,
                ..options()
            },
            SeparationOptions {
                conduit_length: 0.0,
                ..options()
            },
        ];
        for opts in &bad {
            let err = separate_junctions(&mut doc, &topo, opts).unwrap_err();
            assert!(matches!(err, NetworkError::InvalidOptions { .. }));
        }
        assert_eq!(doc.to_string(), NET);
    }

    #[test]
    fn failure_leaves_document_untouched() {
        let text = "[SUBCATCHMENTS]\nS1 RG1 J1 1\n\n[JUNCTIONS]\nJ1 10\n";
        let mut doc = NetworkFile::parse(text);
        let topo = Topology {
            manholes: vec!["J1".into()],
            to_separate: vec!["J1".into()],
            ..Default::default()
        };
        // no [CONDUITS] section to link the split junction
        assert!(separate_junctions(&mut doc, &topo, &options()).is_err());
        assert_eq!(doc.to_string(), text);
    }
}
