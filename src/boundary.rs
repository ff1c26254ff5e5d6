use crate::error::{Error, Result};
use crate::model::Point;
use log::info;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

pub const PORT_VERTICES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    Port,
    Bridge,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundarySegment {
    pub start: Point,
    pub end: Point,
}

#[derive(Debug, Clone)]
pub struct Boundary {
    name: Arc<str>,
    kind: BoundaryKind,
    segments: Vec<BoundarySegment>,
}

impl Boundary {
    /// Builds a port from its closed ring of vertices, the last repeating the first.
    pub fn port(name: &str, vertices: &[Point]) -> Result<Boundary> {
        if vertices.len() != PORT_VERTICES {
            return Err(invalid(
                name,
                format!(
                    "a port needs exactly {} vertices, got {}",
                    PORT_VERTICES,
                    vertices.len()
                ),
            ));
        }
        if vertices[0] != vertices[PORT_VERTICES - 1] {
            return Err(invalid(name, "port ring is not closed".to_string()));
        }

        let segments = vertices
            .windows(2)
            .map(|w| BoundarySegment {
                start: w[0],
                end: w[1],
            })
            .collect();

        Ok(Boundary {
            name: name.into(),
            kind: BoundaryKind::Port,
            segments,
        })
    }

    /// Builds a bridge from its centre line. Intermediate curvature points are dropped.
    pub fn bridge(name: &str, vertices: &[Point]) -> Result<Boundary> {
        match (vertices.first(), vertices.last()) {
            (Some(start), Some(end)) if vertices.len() >= 2 => Ok(Boundary {
                name: name.into(),
                kind: BoundaryKind::Bridge,
                segments: vec![BoundarySegment {
                    start: *start,
                    end: *end,
                }],
            }),
            _ => Err(invalid(
                name,
                format!("a bridge needs at least 2 vertices, got {}", vertices.len()),
            )),
        }
    }

    pub fn new(name: &str, kind: BoundaryKind, vertices: &[Point]) -> Result<Boundary> {
        match kind {
            BoundaryKind::Port => Boundary::port(name, vertices),
            BoundaryKind::Bridge => Boundary::bridge(name, vertices),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shared_name(&self) -> Arc<str> {
        self.name.clone()
    }

    pub fn kind(&self) -> BoundaryKind {
        self.kind
    }

    pub fn segments(&self) -> &[BoundarySegment] {
        &self.segments
    }
}

fn invalid(name: &str, reason: String) -> Error {
    Error::Boundary {
        name: name.to_string(),
        reason,
    }
}

/// Immutable set of named boundaries, shared read-only by every worker.
#[derive(Debug, Clone, Default)]
pub struct BoundaryRegistry {
    boundaries: Vec<Boundary>,
}

#[derive(Debug, serde::Deserialize)]
struct VertexRow {
    name: String,
    kind: BoundaryKind,
    lon: f64,
    lat: f64,
}

impl BoundaryRegistry {
    pub fn new(boundaries: Vec<Boundary>) -> Result<BoundaryRegistry> {
        let mut seen = HashSet::new();
        for b in &boundaries {
            if !seen.insert(b.name()) {
                return Err(invalid(b.name(), "duplicate boundary name".to_string()));
            }
        }
        Ok(BoundaryRegistry { boundaries })
    }

    pub fn from_path(path: &Path) -> Result<BoundaryRegistry> {
        let file = std::fs::File::open(path)?;
        let registry = Self::from_reader(file)?;
        info!(
            "loaded {} boundaries from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Reads `name,kind,lon,lat` rows, one vertex per row, each boundary's rows contiguous.
    pub fn from_reader<R: Read>(reader: R) -> Result<BoundaryRegistry> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut boundaries = Vec::new();
        let mut current: Option<(String, BoundaryKind, Vec<Point>)> = None;

        for result in rdr.deserialize() {
            let row: VertexRow = result?;
            match current.as_mut() {
                Some((name, kind, vertices)) if *name == row.name => {
                    if *kind != row.kind {
                        return Err(invalid(name, "mixed boundary kinds".to_string()));
                    }
                    vertices.push(Point::new(row.lon, row.lat));
                }
                _ => {
                    if let Some((name, kind, vertices)) = current.take() {
                        boundaries.push(Boundary::new(&name, kind, &vertices)?);
                    }
                    current = Some((row.name, row.kind, vec![Point::new(row.lon, row.lat)]));
                }
            }
        }
        if let Some((name, kind, vertices)) = current {
            boundaries.push(Boundary::new(&name, kind, &vertices)?);
        }

        Self::new(boundaries)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Boundary> {
        self.boundaries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.boundaries.iter().map(|b| b.name())
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}
