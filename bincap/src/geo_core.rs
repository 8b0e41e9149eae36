use geo::{BoundingRect, Geometry, Rect};
use serde_json::{json, Value};

/// WGS 84, the CRS GeoJSON assumes when no `crs` member is present
pub const WGS84_EPSG: i32 = 4326;

/// Base struct for geospatial datasets
/// Carries the CRS (EPSG code) and the extent of the data being written
#[derive(Debug, Clone)]
pub struct GeoCore {
    /// EPSG code of every geometry in the dataset
    pub epsg: i32,
    /// Bounding box of the dataset, once computed
    pub bbox: Option<BoundingBox>,
}

impl GeoCore {
    /// Create a new GeoCore with EPSG
    pub fn new(epsg: i32) -> Self {
        GeoCore { epsg, bbox: None }
    }

    /// Get EPSG code
    pub fn get_epsg(&self) -> i32 {
        self.epsg
    }

    /// Get bounding box
    pub fn get_bbox(&self) -> Option<BoundingBox> {
        self.bbox
    }

    /// Set bounding box
    pub fn set_bbox(&mut self, bbox: Option<BoundingBox>) {
        self.bbox = bbox;
    }

    /// Copy of this GeoCore whose bbox covers `geometries`
    pub fn with_extent<'a, I>(&self, geometries: I) -> GeoCore
    where
        I: IntoIterator<Item = &'a Geometry<f64>>,
    {
        let mut geo_core = self.clone();
        geo_core.set_bbox(BoundingBox::from_geometries(geometries));
        geo_core
    }

    /// Legacy named `crs` member for GeoJSON output.
    /// Returns None for WGS 84, which GeoJSON readers assume anyway.
    pub fn crs_member(&self) -> Option<Value> {
        if self.epsg == WGS84_EPSG {
            return None;
        }
        Some(json!({
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", self.epsg) }
        }))
    }
}

impl Default for GeoCore {
    fn default() -> Self {
        GeoCore::new(WGS84_EPSG)
    }
}

/// Bounding box structure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_rect(rect: Rect<f64>) -> Self {
        BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }

    /// Smallest box covering every geometry; None when nothing has extent
    pub fn from_geometries<'a, I>(geometries: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Geometry<f64>>,
    {
        geometries
            .into_iter()
            .filter_map(|g| g.bounding_rect())
            .map(BoundingBox::from_rect)
            .reduce(|a, b| a.union(&b))
    }

    pub fn union(&self, other: &BoundingBox) -> Self {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Envelope corners in the layout `rstar` expects
    pub fn corners(&self) -> ([f64; 2], [f64; 2]) {
        ([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}
