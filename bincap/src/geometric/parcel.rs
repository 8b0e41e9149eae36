use anyhow::Result;
use geo::{Geometry, MultiPolygon};
use geojson::JsonObject;
use log::debug;

use crate::collect::global_variables::{FARM_ACRES_FIELD, OWNER_FIELD};
use crate::collect::layer::Layer;
use crate::commons::basic_functions::{numeric_property, text_property};
use crate::error::CaseStudyError;
use crate::geo_core::GeoCore;
use crate::geometric::ownership::is_municipal;

/// One land ownership unit
#[derive(Debug, Clone)]
pub struct Parcel {
    /// Row position in the parcel layer
    pub index: usize,
    /// Parcel boundary; always a Polygon or MultiPolygon
    pub geometry: Geometry<f64>,
    /// Owner name, empty when the source had none
    pub owner: String,
    pub farm_acres: f64,
    /// Derived from `owner` by the name heuristic
    pub muni: bool,
    /// Every source attribute, as read
    pub properties: JsonObject,
}

impl Parcel {
    pub fn new(index: usize, geometry: Geometry<f64>, owner: &str, farm_acres: f64) -> Self {
        let mut properties = JsonObject::new();
        properties.insert(OWNER_FIELD.to_string(), owner.into());
        properties.insert(FARM_ACRES_FIELD.to_string(), farm_acres.into());
        Parcel {
            index,
            geometry,
            owner: owner.to_string(),
            farm_acres,
            muni: is_municipal(owner),
            properties,
        }
    }

    /// True when the parcel carries farm acreage
    pub fn is_agricultural(&self) -> bool {
        self.farm_acres > 0.0
    }

    /// Boundary as a MultiPolygon, the shape dissolve works on
    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        match &self.geometry {
            Geometry::Polygon(p) => MultiPolygon(vec![p.clone()]),
            Geometry::MultiPolygon(mp) => mp.clone(),
            _ => MultiPolygon(Vec::new()),
        }
    }
}

/// Parcel layer with ownership labels
#[derive(Debug, Clone)]
pub struct ParcelCollection {
    pub parcels: Vec<Parcel>,
    pub geo_core: GeoCore,
}

impl ParcelCollection {
    pub fn new(parcels: Vec<Parcel>, geo_core: GeoCore) -> Self {
        ParcelCollection { parcels, geo_core }
    }

    /// Interpret a raw layer as parcels, labelling each one municipal or private.
    /// OWNER and FARM_ACRES must be present on every feature; null OWNER reads
    /// as empty and null FARM_ACRES as zero.
    pub fn from_layer(layer: &Layer, geo_core: GeoCore) -> Result<Self> {
        layer.require_fields(&[OWNER_FIELD, FARM_ACRES_FIELD])?;

        let mut parcels = Vec::with_capacity(layer.len());
        for feature in &layer.features {
            match &feature.geometry {
                Geometry::Polygon(_) | Geometry::MultiPolygon(_) => {}
                other => {
                    return Err(CaseStudyError::UnsupportedGeometry {
                        layer: layer.name.clone(),
                        kind: geometry_kind(other).to_string(),
                        index: feature.index,
                    }
                    .into())
                }
            }

            let owner = text_property(feature, OWNER_FIELD);
            let farm_acres = numeric_property(&layer.name, feature, FARM_ACRES_FIELD, Some(0.0))?;
            parcels.push(Parcel {
                index: feature.index,
                geometry: feature.geometry.clone(),
                muni: is_municipal(&owner),
                owner,
                farm_acres,
                properties: feature.properties.clone(),
            });
        }

        let collection = ParcelCollection::new(parcels, geo_core);
        debug!(
            "Labelled {} parcels: {} municipal",
            collection.len(),
            collection.municipal_count()
        );
        Ok(collection)
    }

    /// Parcels with `FARM_ACRES > 0`; geometry untouched
    pub fn agricultural(&self) -> ParcelCollection {
        ParcelCollection::new(
            self.parcels
                .iter()
                .filter(|p| p.is_agricultural())
                .cloned()
                .collect(),
            self.geo_core.clone(),
        )
    }

    pub fn municipal_count(&self) -> usize {
        self.parcels.iter().filter(|p| p.muni).count()
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }
}

/// GeoJSON-style type name of a geometry
pub fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon};

    const PARCELS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "OWNER": "CITY OF PETERSBURG", "FARM_ACRES": 0, "PIN": "01" },
                "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]] }
            },
            {
                "type": "Feature",
                "properties": { "OWNER": null, "FARM_ACRES": "12.5", "PIN": "02" },
                "geometry": { "type": "MultiPolygon", "coordinates": [[[[2, 0], [3, 0], [3, 1], [2, 1], [2, 0]]]] }
            },
            {
                "type": "Feature",
                "properties": { "OWNER": "SMITH FARMS LLC", "FARM_ACRES": null, "PIN": "03" },
                "geometry": { "type": "Polygon", "coordinates": [[[4, 0], [5, 0], [5, 1], [4, 1], [4, 0]]] }
            }
        ]
    }"#;

    #[test]
    fn test_from_layer_labels_ownership() {
        let layer = Layer::from_geojson(PARCELS.as_bytes(), "parcels").unwrap();
        let parcels = ParcelCollection::from_layer(&layer, GeoCore::default()).unwrap();

        assert_eq!(parcels.len(), 3);
        assert!(parcels.parcels[0].muni);
        assert_eq!(parcels.parcels[1].owner, "");
        assert!(!parcels.parcels[1].muni);
        assert_eq!(parcels.parcels[1].farm_acres, 12.5);
        assert_eq!(parcels.parcels[2].farm_acres, 0.0);
        assert!(!parcels.parcels[2].muni);
        assert_eq!(parcels.municipal_count(), 1);
        assert_eq!(parcels.parcels[2].properties["PIN"], "03");
    }

    #[test]
    fn test_agricultural_drops_zero_and_negative_acreage() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        let parcels = ParcelCollection::new(
            vec![
                Parcel::new(0, square.clone().into(), "A", 10.0),
                Parcel::new(1, square.clone().into(), "B", 0.0),
                Parcel::new(2, square.clone().into(), "C", -3.0),
                Parcel::new(3, square.into(), "D", 0.01),
            ],
            GeoCore::default(),
        );
        let agri = parcels.agricultural();
        let kept: Vec<usize> = agri.parcels.iter().map(|p| p.index).collect();
        assert_eq!(kept, vec![0, 3]);
        // the source collection is left as it was
        assert_eq!(parcels.len(), 4);
    }

    #[test]
    fn test_from_layer_rejects_point_parcels() {
        let layer = Layer::new(
            "parcels",
            vec![crate::collect::layer::LayerFeature::new(
                7,
                point!(x: 0.0, y: 0.0).into(),
                serde_json::json!({ "OWNER": "A", "FARM_ACRES": 1 })
                    .as_object()
                    .cloned()
                    .unwrap(),
            )],
        );
        let err = ParcelCollection::from_layer(&layer, GeoCore::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CaseStudyError>(),
            Some(&CaseStudyError::UnsupportedGeometry {
                layer: "parcels".to_string(),
                kind: "Point".to_string(),
                index: 7,
            })
        );
    }

    #[test]
    fn test_from_layer_requires_farm_acres() {
        let layer = Layer::from_geojson(
            br#"{"type": "Feature", "properties": {"OWNER": "A"}, "geometry": {"type": "Point", "coordinates": [0, 0]}}"#,
            "parcels",
        )
        .unwrap();
        let err = ParcelCollection::from_layer(&layer, GeoCore::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaseStudyError>(),
            Some(CaseStudyError::MissingField { field, .. }) if field == "FARM_ACRES"
        ));
    }
}
