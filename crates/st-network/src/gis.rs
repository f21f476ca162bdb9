//! Pipe-delimited WKT layers for loading a network into a GIS.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::Path;

use crate::document::NetworkFile;
use crate::error::{NetworkError, NetworkResult};
use crate::records::{Conduit, Coordinate, Coverage, PolygonVertex, Subcatchment};
use crate::topology::terminal_outlets;

pub const DELIMITER: char = '|';

/// One delimited text file per layer.
#[derive(Debug, Clone, PartialEq)]
pub struct GisLayers {
    pub subcatchments: String,
    pub nodes: String,
    pub manholes: String,
    pub links: String,
    pub subcatchment_outlets: String,
}

impl GisLayers {
    /// Layer file names paired with their contents.
    pub fn files(&self) -> [(&'static str, &str); 5] {
        [
            ("subcatchments.csv", &self.subcatchments),
            ("nodes.csv", &self.nodes),
            ("manholes.csv", &self.manholes),
            ("links.csv", &self.links),
            ("subcatchment_outlets.csv", &self.subcatchment_outlets),
        ]
    }

    pub fn write_to_dir(&self, dir: &Path) -> NetworkResult<()> {
        let io_err = |path: &Path, e: std::io::Error| NetworkError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        for (name, content) in self.files() {
            let path = dir.join(name);
            std::fs::write(&path, content).map_err(|e| io_err(&path, e))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    x: f64,
    y: f64,
}

impl Point {
    fn wkt(&self) -> String {
        format!("{} {}", self.x, self.y)
    }
}

fn header(extra: &[&str]) -> String {
    let mut line = format!("id{}features", DELIMITER);
    for column in extra {
        line.push(DELIMITER);
        line.push_str(column);
    }
    line.push('\n');
    line
}

fn centroid(vertices: &[Point]) -> Point {
    let n = vertices.len() as f64;
    Point {
        x: vertices.iter().map(|p| p.x).sum::<f64>() / n,
        y: vertices.iter().map(|p| p.y).sum::<f64>() / n,
    }
}

/// Build all layers from a network file.
///
/// Subcatchments without an outline are left out of the polygon layer; a link
/// or outlet whose end has no position fails with `MissingGeometry`.
pub fn build_layers(file: &NetworkFile) -> NetworkResult<GisLayers> {
    let subcatchments: Vec<Subcatchment> = file.optional_records()?;
    let coverages: Vec<Coverage> = file.optional_records()?;
    let conduits: Vec<Conduit> = file.optional_records()?;

    let mut outlines: BTreeMap<String, Vec<Point>> = BTreeMap::new();
    let mut outline_order: Vec<String> = Vec::new();
    for v in file.optional_records::<PolygonVertex>()? {
        if !outlines.contains_key(&v.subcatchment) {
            outline_order.push(v.subcatchment.clone());
        }
        outlines
            .entry(v.subcatchment)
            .or_default()
            .push(Point { x: v.x, y: v.y });
    }
    let centroids: HashMap<&str, Point> = outlines
        .iter()
        .map(|(id, vertices)| (id.as_str(), centroid(vertices)))
        .collect();

    let coordinates: Vec<Coordinate> = file.optional_records()?;
    let points: HashMap<&str, Point> = coordinates
        .iter()
        .map(|c| (c.node.as_str(), Point { x: c.x, y: c.y }))
        .collect();

    let mut land_uses: HashMap<&str, Vec<&str>> = HashMap::new();
    for c in &coverages {
        land_uses
            .entry(c.subcatchment.as_str())
            .or_default()
            .push(c.land_use.as_str());
    }

    let mut polygons = header(&["landuses"]);
    for id in &outline_order {
        let ring: Vec<String> = outlines[id].iter().map(Point::wkt).collect();
        let uses = land_uses.get(id.as_str()).map(|l| l.join(",")).unwrap_or_default();
        let _ = writeln!(
            polygons,
            "{id}{d}POLYGON(({ring})){d}{uses}",
            d = DELIMITER,
            ring = ring.join(",")
        );
    }

    let terminal = terminal_outlets(&subcatchments)?;
    let mut nodes = header(&[]);
    let mut manholes = header(&[]);
    for c in &coordinates {
        let line = format!("{}{}POINT(({} {}))\n", c.node, DELIMITER, c.x, c.y);
        if terminal.values().any(|&t| t == c.node) {
            manholes.push_str(&line);
        }
        nodes.push_str(&line);
    }

    let locate = |id: &str| -> NetworkResult<Point> {
        points
            .get(id)
            .or_else(|| centroids.get(id))
            .copied()
            .ok_or_else(|| NetworkError::MissingGeometry { id: id.to_string() })
    };

    let mut links = header(&[]);
    for c in &conduits {
        let (from, to) = (locate(&c.from)?, locate(&c.to)?);
        let _ = writeln!(
            links,
            "{}{}LINESTRING(({},{}))",
            c.id,
            DELIMITER,
            from.wkt(),
            to.wkt()
        );
    }

    let mut outlets = header(&[]);
    for s in &subcatchments {
        let Some(start) = centroids.get(s.id.as_str()) else {
            continue;
        };
        let end = locate(&s.outlet)?;
        let _ = writeln!(
            outlets,
            "{}{}LINESTRING(({},{}))",
            s.id,
            DELIMITER,
            start.wkt(),
            end.wkt()
        );
    }

    Ok(GisLayers {
        subcatchments: polygons,
        nodes,
        manholes,
        links,
        subcatchment_outlets: outlets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET: &str = "\
[SUBCATCHMENTS]
S1  RG1  J1  1
S2  RG1  S1  1

[CONDUITS]
C1  J0  J1  10

[COVERAGES]
S1  Roads  60
S1  Roofs  40
S2  Grass  100

[COORDINATES]
J0  0  0
J1  10  0

[Polygons]
S1  0  0
S1  2  0
S1  2  2
S1  0  2
S2  4  4
S2  6  4
";

    #[test]
    fn layers_have_wkt_features() {
        let doc = NetworkFile::parse(NET);
        let layers = build_layers(&doc).unwrap();

        assert_eq!(
            layers.subcatchments.lines().nth(1).unwrap(),
            "S1|POLYGON((0 0,2 0,2 2,0 2))|Roads,Roofs"
        );
        assert_eq!(layers.nodes.lines().count(), 3);
        assert_eq!(layers.manholes, "id|features\nJ1|POINT((10 0))\n");
        assert_eq!(layers.links.lines().nth(1).unwrap(), "C1|LINESTRING((0 0,10 0))");

        let outlets: Vec<&str> = layers.subcatchment_outlets.lines().collect();
        assert_eq!(outlets[1], "S1|LINESTRING((1 1,10 0))");
        assert_eq!(outlets[2], "S2|LINESTRING((5 4,1 1))");
    }

    #[test]
    fn missing_position_is_reported() {
        let doc = NetworkFile::parse("[CONDUITS]\nC1  J0  J9  10\n\n[COORDINATES]\nJ0  0  0\n");
        let err = build_layers(&doc).unwrap_err();
        assert_eq!(err, NetworkError::MissingGeometry { id: "J9".into() });
    }
}
