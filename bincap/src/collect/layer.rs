use anyhow::{Context, Result};
use geo::Geometry;
use geojson::{GeoJson, JsonObject};
use log::{debug, warn};
use serde_json::Value;
use std::path::Path;

use crate::error::CaseStudyError;

/// One input record: geometry plus its attribute table row
#[derive(Debug, Clone)]
pub struct LayerFeature {
    /// Row position in the source file, kept as the record's identity
    pub index: usize,
    pub geometry: Geometry<f64>,
    pub properties: JsonObject,
}

impl LayerFeature {
    pub fn new(index: usize, geometry: Geometry<f64>, properties: JsonObject) -> Self {
        LayerFeature {
            index,
            geometry,
            properties,
        }
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// A vector layer read from disk, before any domain interpretation
#[derive(Debug, Clone)]
pub struct Layer {
    /// Layer name used in error messages ("parcels", "structures")
    pub name: String,
    pub features: Vec<LayerFeature>,
    /// EPSG code declared by the source, if any
    pub epsg: Option<i32>,
    /// Attribute table columns, when the source declares a schema (.dbf)
    pub columns: Option<Vec<String>>,
}

impl Layer {
    pub fn new(name: &str, features: Vec<LayerFeature>) -> Self {
        Layer {
            name: name.to_string(),
            features,
            epsg: None,
            columns: None,
        }
    }

    /// Read a layer, picking the reader from the file extension
    pub fn read<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase());

        let layer = match extension.as_deref() {
            Some("geojson") | Some("json") => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("Failed to read GeoJSON file: {:?}", path))?;
                Self::from_geojson(&bytes, name)
                    .with_context(|| format!("Failed to load layer '{}' from {:?}", name, path))?
            }
            #[cfg(feature = "shapefile")]
            Some("shp") => Self::from_shapefile(path, name)
                .with_context(|| format!("Failed to load layer '{}' from {:?}", name, path))?,
            _ => return Err(CaseStudyError::UnsupportedFormat(path.to_path_buf()).into()),
        };

        debug!(
            "Read {} features from {:?} (layer '{}')",
            layer.features.len(),
            path,
            name
        );
        Ok(layer)
    }

    /// Load a layer from GeoJSON bytes (FeatureCollection, Feature or bare Geometry)
    pub fn from_geojson(geojson_data: &[u8], name: &str) -> Result<Self> {
        let geojson_str =
            std::str::from_utf8(geojson_data).context("GeoJSON data is not valid UTF-8")?;
        let geojson: GeoJson = geojson_str.parse().context("Failed to parse GeoJSON")?;

        let mut epsg = None;
        let raw_features = match geojson {
            GeoJson::FeatureCollection(fc) => {
                epsg = fc
                    .foreign_members
                    .as_ref()
                    .and_then(|members| members.get("crs"))
                    .and_then(epsg_from_crs_member);
                fc.features
            }
            GeoJson::Feature(f) => vec![f],
            GeoJson::Geometry(g) => vec![geojson::Feature::from(g)],
        };

        let mut features = Vec::with_capacity(raw_features.len());
        for (index, feature) in raw_features.into_iter().enumerate() {
            let Some(geometry) = feature.geometry.as_ref() else {
                warn!("Layer '{}': feature {} has no geometry, skipped", name, index);
                continue;
            };
            let geo_geom: Geometry<f64> = geometry.try_into().with_context(|| {
                format!(
                    "Layer '{}': failed to convert geometry of feature {}",
                    name, index
                )
            })?;
            features.push(LayerFeature::new(
                index,
                geo_geom,
                feature.properties.unwrap_or_default(),
            ));
        }

        let mut layer = Layer::new(name, features);
        layer.epsg = epsg;
        Ok(layer)
    }

    /// Load a layer from an ESRI Shapefile and its .dbf attribute table
    #[cfg(feature = "shapefile")]
    pub fn from_shapefile<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let path = path.as_ref();
        let table = shp::read_shapefile(path, name)?;

        let mut features = Vec::with_capacity(table.rows.len());
        for (index, (shape, record)) in table.rows.into_iter().enumerate() {
            let Some(geometry) = shp::shape_to_geometry(shape, name, index)? else {
                warn!("Layer '{}': feature {} has a null shape, skipped", name, index);
                continue;
            };
            features.push(LayerFeature::new(
                index,
                geometry,
                shp::record_to_properties(record),
            ));
        }

        let mut layer = Layer::new(name, features);
        layer.epsg = shp::epsg_from_prj(&path.with_extension("prj"), name);
        layer.columns = Some(table.columns);
        Ok(layer)
    }

    /// Fail loudly when the declared schema or any feature lacks one of `fields`.
    /// The schema check also catches an empty layer with the wrong columns.
    pub fn require_fields(&self, fields: &[&str]) -> Result<()> {
        if let Some(columns) = &self.columns {
            let missing = fields
                .iter()
                .find(|f| !columns.iter().any(|c| c.as_str() == **f));
            if let Some(field) = missing {
                return Err(CaseStudyError::MissingColumn {
                    layer: self.name.clone(),
                    field: field.to_string(),
                }
                .into());
            }
        }
        for feature in &self.features {
            for field in fields {
                if !feature.properties.contains_key(*field) {
                    return Err(CaseStudyError::MissingField {
                        layer: self.name.clone(),
                        field: field.to_string(),
                        index: feature.index,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Parse the EPSG code out of a legacy GeoJSON `crs` member
fn epsg_from_crs_member(crs: &Value) -> Option<i32> {
    let name = crs.get("properties")?.get("name")?.as_str()?;
    if name.contains("CRS84") {
        return Some(crate::geo_core::WGS84_EPSG);
    }
    name.rsplit(':').next()?.trim().parse().ok()
}

#[cfg(feature = "shapefile")]
mod shp {
    use anyhow::{Context, Result};
    use geo::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
    use geojson::JsonObject;
    use log::debug;
    use serde_json::{Number, Value};
    use shapefile::dbase::{self, FieldValue, Record};
    use shapefile::{PolygonRing, Reader, Shape};
    use std::path::Path;

    use crate::error::CaseStudyError;

    /// Shape/row pairs of a shapefile and the column names of its .dbf
    pub(super) struct ShapefileTable {
        pub rows: Vec<(Shape, Record)>,
        pub columns: Vec<String>,
    }

    pub(super) fn read_shapefile(path: &Path, layer: &str) -> Result<ShapefileTable> {
        let dbf_path = path.with_extension("dbf");
        let columns = dbase::Reader::from_path(&dbf_path)
            .with_context(|| {
                format!("Layer '{}': cannot open attribute table {:?}", layer, dbf_path)
            })?
            .fields()
            .iter()
            .map(|field| field.name().to_string())
            .collect();

        let mut reader = Reader::from_path(path)
            .with_context(|| format!("Layer '{}': cannot open shapefile {:?}", layer, path))?;
        let rows = reader
            .iter_shapes_and_records()
            .enumerate()
            .map(|(index, row)| {
                row.with_context(|| format!("Layer '{}': cannot read shape {}", layer, index))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ShapefileTable { rows, columns })
    }

    /// Convert a shape to a geo geometry; None for null shapes
    pub(super) fn shape_to_geometry(
        shape: Shape,
        layer: &str,
        index: usize,
    ) -> Result<Option<Geometry<f64>>> {
        let geometry = match shape {
            Shape::NullShape => return Ok(None),
            Shape::Point(p) => Point::new(p.x, p.y).into(),
            Shape::PointM(p) => Point::new(p.x, p.y).into(),
            Shape::PointZ(p) => Point::new(p.x, p.y).into(),
            Shape::Polygon(p) => rings_to_geometry(p.rings(), |pt| (pt.x, pt.y)),
            Shape::PolygonM(p) => rings_to_geometry(p.rings(), |pt| (pt.x, pt.y)),
            Shape::PolygonZ(p) => rings_to_geometry(p.rings(), |pt| (pt.x, pt.y)),
            other => {
                return Err(CaseStudyError::UnsupportedGeometry {
                    layer: layer.to_string(),
                    kind: format!("{:?}", other.shapetype()),
                    index,
                }
                .into())
            }
        };
        Ok(Some(geometry))
    }

    /// Group rings into polygons: each outer ring owns the inner rings that follow it
    fn rings_to_geometry<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> (f64, f64)) -> Geometry<f64> {
        fn to_line_string<P>(points: &[P], xy: &impl Fn(&P) -> (f64, f64)) -> LineString<f64> {
            let mut coords: Vec<Coord<f64>> = points
                .iter()
                .map(|pt| {
                    let (x, y) = xy(pt);
                    Coord { x, y }
                })
                .collect();
            if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
                if first != last {
                    coords.push(first);
                }
            }
            LineString(coords)
        }

        let mut polys: Vec<Polygon<f64>> = Vec::new();
        let mut current_exterior: Option<LineString<f64>> = None;
        let mut current_holes: Vec<LineString<f64>> = Vec::new();

        for ring in rings {
            match ring {
                PolygonRing::Outer(points) => {
                    if let Some(ext) = current_exterior.take() {
                        polys.push(Polygon::new(ext, std::mem::take(&mut current_holes)));
                    }
                    current_exterior = Some(to_line_string(points, &xy));
                }
                PolygonRing::Inner(points) => current_holes.push(to_line_string(points, &xy)),
            }
        }
        if let Some(ext) = current_exterior {
            polys.push(Polygon::new(ext, current_holes));
        }

        if polys.len() == 1 {
            Geometry::Polygon(polys.remove(0))
        } else {
            Geometry::MultiPolygon(MultiPolygon(polys))
        }
    }

    /// Convert a .dbf record to GeoJSON-style properties
    pub(super) fn record_to_properties(record: Record) -> JsonObject {
        fn number(n: f64) -> Value {
            Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
        }

        let mut properties = JsonObject::new();
        for (field, value) in record {
            let json = match value {
                FieldValue::Character(Some(s)) => Value::String(s.trim().to_string()),
                FieldValue::Memo(s) => Value::String(s),
                FieldValue::Numeric(Some(n)) => number(n),
                FieldValue::Float(Some(f)) => number(f as f64),
                FieldValue::Double(d) => number(d),
                FieldValue::Currency(c) => number(c),
                FieldValue::Integer(i) => Value::from(i),
                FieldValue::Logical(Some(b)) => Value::Bool(b),
                _ => Value::Null,
            };
            properties.insert(field, json);
        }
        properties
    }

    /// EPSG code of the .prj next to a shapefile, if it names one
    pub(super) fn epsg_from_prj(prj_path: &Path, layer: &str) -> Option<i32> {
        let wkt = std::fs::read_to_string(prj_path).ok()?;
        let code = authority_code(&wkt);
        if code.is_none() {
            // ESRI-style WKT carries no AUTHORITY element
            debug!(
                "Layer '{}': no EPSG authority in {:?}, CRS check skipped",
                layer, prj_path
            );
        }
        code
    }

    /// Outermost `AUTHORITY["EPSG","<code>"]` of a WKT string
    fn authority_code(wkt: &str) -> Option<i32> {
        let marker = "AUTHORITY[\"EPSG\",\"";
        let start = wkt.rfind(marker)? + marker.len();
        let end = wkt[start..].find('"')? + start;
        wkt[start..end].parse().ok()
    }

}
