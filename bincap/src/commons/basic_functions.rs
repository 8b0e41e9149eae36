use anyhow::{Context, Result};
use geo::Geometry;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, Value as GeometryValue};
use serde_json::{Number, Value};
use std::path::Path;

use crate::collect::layer::LayerFeature;
use crate::error::CaseStudyError;
use crate::geo_core::GeoCore;

/// Text attribute; missing or null reads as the empty string
pub fn text_property(feature: &LayerFeature, field: &str) -> String {
    match feature.property(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Numeric attribute. Numeric strings are accepted (shapefile exports often
/// carry them); null reads as `null_default` when one is given.
pub fn numeric_property(
    layer: &str,
    feature: &LayerFeature,
    field: &str,
    null_default: Option<f64>,
) -> Result<f64> {
    let missing = || CaseStudyError::MissingField {
        layer: layer.to_string(),
        field: field.to_string(),
        index: feature.index,
    };
    let not_numeric = |value: &Value| CaseStudyError::NotNumeric {
        layer: layer.to_string(),
        field: field.to_string(),
        index: feature.index,
        value: value.to_string(),
    };

    match feature.property(field) {
        None => Err(missing().into()),
        Some(Value::Null) => null_default.ok_or_else(|| missing().into()),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| not_numeric(&Value::Number(n.clone())).into()),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return null_default.ok_or_else(|| missing().into());
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| not_numeric(&Value::String(s.clone())).into())
        }
        Some(other) => Err(not_numeric(other).into()),
    }
}

/// JSON number for a float; NaN and infinities become null
pub fn json_number(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Build a GeoJSON feature from a geo geometry and its properties
pub fn to_feature(geometry: &Geometry<f64>, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(GeometryValue::from(geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Write features as a GeoJSON FeatureCollection, tagging the CRS when it is
/// not WGS 84 and the extent when `geo_core` carries one
pub fn write_feature_collection<P: AsRef<Path>>(
    output_file: P,
    features: Vec<Feature>,
    geo_core: &GeoCore,
) -> Result<()> {
    let output_file = output_file.as_ref();
    let foreign_members = geo_core.crs_member().map(|crs| {
        let mut members = JsonObject::new();
        members.insert("crs".to_string(), crs);
        members
    });

    let feature_collection = FeatureCollection {
        bbox: geo_core
            .get_bbox()
            .map(|b| vec![b.min_x, b.min_y, b.max_x, b.max_y]),
        features,
        foreign_members,
    };

    let geojson_str = GeoJson::from(feature_collection).to_string();
    std::fs::write(output_file, geojson_str)
        .context(format!("Failed to write GeoJSON file: {:?}", output_file))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;
    use serde_json::json;

    fn feature(properties: Value) -> LayerFeature {
        let properties = match properties {
            Value::Object(map) => map,
            _ => JsonObject::new(),
        };
        LayerFeature::new(3, point!(x: 0.0, y: 0.0).into(), properties)
    }

    #[test]
    fn test_text_property_defaults_to_empty() {
        let f = feature(json!({ "OWNER": null, "NAME": "SMITH", "CODE": 12 }));
        assert_eq!(text_property(&f, "OWNER"), "");
        assert_eq!(text_property(&f, "MISSING"), "");
        assert_eq!(text_property(&f, "NAME"), "SMITH");
        assert_eq!(text_property(&f, "CODE"), "12");
    }

    #[test]
    fn test_numeric_property() {
        let f = feature(json!({ "A": 2.5, "B": " 7 ", "C": null, "D": "abc", "E": true }));
        assert_eq!(numeric_property("l", &f, "A", None).unwrap(), 2.5);
        assert_eq!(numeric_property("l", &f, "B", None).unwrap(), 7.0);
        assert_eq!(numeric_property("l", &f, "C", Some(0.0)).unwrap(), 0.0);
        assert!(numeric_property("l", &f, "C", None).is_err());

        let err = numeric_property("l", &f, "D", None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaseStudyError>(),
            Some(CaseStudyError::NotNumeric { index: 3, .. })
        ));
        assert!(numeric_property("l", &f, "E", None).is_err());

        let err = numeric_property("l", &f, "Z", Some(0.0)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaseStudyError>(),
            Some(CaseStudyError::MissingField { .. })
        ));
    }

    #[test]
    fn test_json_number_rejects_nan() {
        assert_eq!(json_number(1.5), json!(1.5));
        assert!(json_number(f64::NAN).is_null());
    }

    #[test]
    fn test_write_feature_collection_tags_crs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.geojson");
        let mut props = JsonObject::new();
        props.insert("UID".to_string(), json!(1));
        let features = vec![to_feature(&point!(x: 1.0, y: 2.0).into(), props)];

        let extent: Vec<Geometry<f64>> = vec![point!(x: 1.0, y: 2.0).into()];
        let geo_core = GeoCore::new(3435).with_extent(&extent);
        write_feature_collection(&path, features, &geo_core).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["type"], "FeatureCollection");
        assert_eq!(written["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::3435");
        assert_eq!(written["features"][0]["properties"]["UID"], 1);
        assert_eq!(written["features"][0]["geometry"]["type"], "Point");
        assert_eq!(written["bbox"], json!([1.0, 2.0, 1.0, 2.0]));
    }
}
