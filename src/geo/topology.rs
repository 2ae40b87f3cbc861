//! TopoJSON encoding of a GeoJSON feature collection.
//!
//! Positions are quantized onto a `q x q` grid. Lines and polygon rings are
//! cut at junctions (points reached from more than one set of neighbours, plus
//! line endpoints) and every resulting arc is stored once; a geometry that
//! walks an arc backwards references it as `!i` (that is `-i - 1`). Arcs are
//! delta-encoded, points keep absolute quantized coordinates.

use geojson::{Feature, FeatureCollection, Geometry, Value as GeoValue};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};

/// Name of the single object in the output topology.
pub const OBJECT_NAME: &str = "output";

type Point = (i64, i64);

#[derive(Clone, Copy, Debug, PartialEq)]
struct Transform {
    kx: f64,
    ky: f64,
    x0: f64,
    y0: f64,
}

impl Transform {
    fn fit(bbox: [f64; 4], quantization: u32) -> Self {
        let [x0, y0, x1, y1] = bbox;
        let steps = f64::from(quantization.max(2) - 1);
        Self {
            kx: if x1 > x0 { (x1 - x0) / steps } else { 1.0 },
            ky: if y1 > y0 { (y1 - y0) / steps } else { 1.0 },
            x0,
            y0,
        }
    }

    fn quantize(&self, position: &[f64]) -> Point {
        let x = position.first().copied().unwrap_or(0.0);
        let y = position.get(1).copied().unwrap_or(0.0);
        (
            ((x - self.x0) / self.kx).round() as i64,
            ((y - self.y0) / self.ky).round() as i64,
        )
    }
}

/// Geometry with its lines replaced by indices into the builder's line table.
enum Shape {
    Empty,
    Point(Point),
    MultiPoint(Vec<Point>),
    LineString(usize),
    MultiLineString(Vec<usize>),
    Polygon(Vec<usize>),
    MultiPolygon(Vec<Vec<usize>>),
    Collection(Vec<Shape>),
}

struct Line {
    points: Vec<Point>,
    ring: bool,
}

struct LineTable {
    transform: Transform,
    lines: Vec<Line>,
}

impl LineTable {
    fn shape(&mut self, geometry: Option<&Geometry>) -> Shape {
        let Some(geometry) = geometry else {
            return Shape::Empty;
        };
        match &geometry.value {
            GeoValue::Point(p) => Shape::Point(self.transform.quantize(p)),
            GeoValue::MultiPoint(ps) => {
                Shape::MultiPoint(ps.iter().map(|p| self.transform.quantize(p)).collect())
            }
            GeoValue::LineString(ls) => Shape::LineString(self.line(ls, false)),
            GeoValue::MultiLineString(mls) => {
                Shape::MultiLineString(mls.iter().map(|ls| self.line(ls, false)).collect())
            }
            GeoValue::Polygon(rings) => Shape::Polygon(self.rings(rings)),
            GeoValue::MultiPolygon(polygons) => {
                Shape::MultiPolygon(polygons.iter().map(|rings| self.rings(rings)).collect())
            }
            GeoValue::GeometryCollection(geometries) => {
                Shape::Collection(geometries.iter().map(|g| self.shape(Some(g))).collect())
            }
        }
    }

    fn rings(&mut self, rings: &[Vec<Vec<f64>>]) -> Vec<usize> {
        rings.iter().map(|ring| self.line(ring, true)).collect()
    }

    fn line(&mut self, positions: &[Vec<f64>], ring: bool) -> usize {
        let mut points: Vec<Point> = Vec::with_capacity(positions.len());
        for p in positions {
            let q = self.transform.quantize(p);
            if points.last() != Some(&q) {
                points.push(q);
            }
        }
        if let Some(&first) = points.first() {
            if points.len() == 1 || (ring && points.last() != Some(&first)) {
                points.push(first);
            }
        }
        self.lines.push(Line { points, ring });
        self.lines.len() - 1
    }
}

/// Points where arcs must start or end.
fn junctions(lines: &[Line]) -> HashSet<Point> {
    let mut seen: HashMap<Point, (Point, Point)> = HashMap::new();
    let mut junctions = HashSet::new();

    let mut visit = |p: Point, a: Point, b: Point| {
        let pair = if a <= b { (a, b) } else { (b, a) };
        match seen.get(&p) {
            Some(prev) if *prev != pair => {
                junctions.insert(p);
            }
            Some(_) => {}
            None => {
                seen.insert(p, pair);
            }
        }
    };

    let mut endpoints = Vec::new();
    for line in lines {
        let pts = &line.points;
        if pts.len() < 2 {
            continue;
        }
        if line.ring {
            let m = pts.len() - 1;
            for i in 0..m {
                visit(pts[i], pts[(i + m - 1) % m], pts[(i + 1) % m]);
            }
        } else {
            endpoints.push(pts[0]);
            endpoints.push(pts[pts.len() - 1]);
            for i in 1..pts.len() - 1 {
                visit(pts[i], pts[i - 1], pts[i + 1]);
            }
        }
    }
    junctions.extend(endpoints);
    junctions
}

fn split(points: &[Point], junctions: &HashSet<Point>) -> Vec<Vec<Point>> {
    let mut arcs = Vec::new();
    let mut from = 0;
    for i in 1..points.len() - 1 {
        if junctions.contains(&points[i]) {
            arcs.push(points[from..=i].to_vec());
            from = i;
        }
    }
    arcs.push(points[from..].to_vec());
    arcs
}

fn cut(line: &Line, junctions: &HashSet<Point>) -> Vec<Vec<Point>> {
    let pts = &line.points;
    if pts.len() < 2 {
        return Vec::new();
    }
    if !line.ring {
        return split(pts, junctions);
    }
    let open = &pts[..pts.len() - 1];
    let start = open
        .iter()
        .position(|p| junctions.contains(p))
        // A ring touching nothing starts at its smallest point so equal rings compare equal.
        .or_else(|| open.iter().enumerate().min_by_key(|(_, p)| **p).map(|(i, _)| i))
        .unwrap_or(0);
    let mut rotated: Vec<Point> = open[start..].iter().chain(open[..start].iter()).copied().collect();
    rotated.push(open[start]);
    split(&rotated, junctions)
}

#[derive(Default)]
struct ArcIndex {
    arcs: Vec<Vec<Point>>,
    by_points: HashMap<Vec<Point>, usize>,
}

impl ArcIndex {
    fn intern(&mut self, arc: Vec<Point>) -> i64 {
        if let Some(&i) = self.by_points.get(&arc) {
            return i as i64;
        }
        let reversed: Vec<Point> = arc.iter().rev().copied().collect();
        if let Some(&i) = self.by_points.get(&reversed) {
            return !(i as i64);
        }
        let i = self.arcs.len();
        self.by_points.insert(arc.clone(), i);
        self.arcs.push(arc);
        i as i64
    }

    fn delta_encoded(&self) -> Vec<Vec<[i64; 2]>> {
        self.arcs
            .iter()
            .map(|arc| {
                let mut prev = (0, 0);
                arc.iter()
                    .map(|&(x, y)| {
                        let d = [x - prev.0, y - prev.1];
                        prev = (x, y);
                        d
                    })
                    .collect()
            })
            .collect()
    }
}

fn for_each_position(value: &GeoValue, f: &mut impl FnMut(&[f64])) {
    match value {
        GeoValue::Point(p) => f(p.as_slice()),
        GeoValue::MultiPoint(ps) | GeoValue::LineString(ps) => ps.iter().for_each(|p| f(p.as_slice())),
        GeoValue::MultiLineString(lines) | GeoValue::Polygon(lines) => {
            lines.iter().flatten().for_each(|p| f(p.as_slice()))
        }
        GeoValue::MultiPolygon(polygons) => polygons.iter().flatten().flatten().for_each(|p| f(p.as_slice())),
        GeoValue::GeometryCollection(geometries) => {
            geometries.iter().for_each(|g| for_each_position(&g.value, f))
        }
    }
}

fn bbox(collection: &FeatureCollection) -> Option<[f64; 4]> {
    let mut bbox: Option<[f64; 4]> = None;
    let mut extend = |p: &[f64]| {
        let (Some(&x), Some(&y)) = (p.first(), p.get(1)) else {
            return;
        };
        bbox = Some(match bbox {
            None => [x, y, x, y],
            Some([x0, y0, x1, y1]) => [x0.min(x), y0.min(y), x1.max(x), y1.max(y)],
        });
    };
    for feature in &collection.features {
        if let Some(geometry) = &feature.geometry {
            for_each_position(&geometry.value, &mut extend);
        }
    }
    bbox
}

fn encode_shape(shape: &Shape, line_arcs: &[Vec<i64>]) -> Map<String, Value> {
    let mut out = Map::new();
    match shape {
        Shape::Empty => {
            out.insert("type".into(), Value::Null);
        }
        Shape::Point((x, y)) => {
            out.insert("type".into(), json!("Point"));
            out.insert("coordinates".into(), json!([x, y]));
        }
        Shape::MultiPoint(points) => {
            out.insert("type".into(), json!("MultiPoint"));
            let coordinates: Vec<[i64; 2]> = points.iter().map(|&(x, y)| [x, y]).collect();
            out.insert("coordinates".into(), json!(coordinates));
        }
        Shape::LineString(i) => {
            out.insert("type".into(), json!("LineString"));
            out.insert("arcs".into(), json!(line_arcs[*i]));
        }
        Shape::MultiLineString(lines) => {
            out.insert("type".into(), json!("MultiLineString"));
            let arcs: Vec<&Vec<i64>> = lines.iter().map(|i| &line_arcs[*i]).collect();
            out.insert("arcs".into(), json!(arcs));
        }
        Shape::Polygon(rings) => {
            out.insert("type".into(), json!("Polygon"));
            let arcs: Vec<&Vec<i64>> = rings.iter().map(|i| &line_arcs[*i]).collect();
            out.insert("arcs".into(), json!(arcs));
        }
        Shape::MultiPolygon(polygons) => {
            out.insert("type".into(), json!("MultiPolygon"));
            let arcs: Vec<Vec<&Vec<i64>>> = polygons
                .iter()
                .map(|rings| rings.iter().map(|i| &line_arcs[*i]).collect())
                .collect();
            out.insert("arcs".into(), json!(arcs));
        }
        Shape::Collection(shapes) => {
            out.insert("type".into(), json!("GeometryCollection"));
            let geometries: Vec<Value> = shapes
                .iter()
                .map(|s| Value::Object(encode_shape(s, line_arcs)))
                .collect();
            out.insert("geometries".into(), Value::Array(geometries));
        }
    }
    out
}

fn encode_feature(feature: &Feature, shape: &Shape, line_arcs: &[Vec<i64>]) -> Value {
    let mut out = encode_shape(shape, line_arcs);
    if let Some(id) = &feature.id {
        out.insert("id".into(), serde_json::to_value(id).unwrap_or(Value::Null));
    }
    out.insert(
        "properties".into(),
        Value::Object(feature.properties.clone().unwrap_or_default()),
    );
    Value::Object(out)
}

/// Encode a feature collection as a TopoJSON topology with one object, [`OBJECT_NAME`].
pub fn encode(collection: &FeatureCollection, quantization: u32) -> Value {
    let bbox = bbox(collection).unwrap_or([0.0; 4]);
    let transform = Transform::fit(bbox, quantization);

    let mut table = LineTable {
        transform,
        lines: Vec::new(),
    };
    let shapes: Vec<Shape> = collection
        .features
        .iter()
        .map(|f| table.shape(f.geometry.as_ref()))
        .collect();

    let junctions = junctions(&table.lines);
    let mut index = ArcIndex::default();
    let line_arcs: Vec<Vec<i64>> = table
        .lines
        .iter()
        .map(|line| {
            cut(line, &junctions)
                .into_iter()
                .map(|arc| index.intern(arc))
                .collect()
        })
        .collect();

    let geometries: Vec<Value> = collection
        .features
        .iter()
        .zip(&shapes)
        .map(|(feature, shape)| encode_feature(feature, shape, &line_arcs))
        .collect();

    let mut objects = Map::new();
    objects.insert(
        OBJECT_NAME.to_string(),
        json!({ "type": "GeometryCollection", "geometries": geometries }),
    );

    json!({
        "type": "Topology",
        "bbox": bbox,
        "transform": {
            "scale": [transform.kx, transform.ky],
            "translate": [transform.x0, transform.y0]
        },
        "objects": objects,
        "arcs": index.delta_encoded()
    })
}
