use anyhow::{Context, Result};
use geo::Geometry;
use geojson::JsonObject;
use log::{debug, info};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

use crate::collect::global_variables::DIAMETER_FIELD;
use crate::collect::layer::Layer;
use crate::commons::basic_functions::{json_number, numeric_property, to_feature, write_feature_collection};
use crate::error::CaseStudyError;
use crate::geo_core::GeoCore;
use crate::geometric::capacity::Footprint;
use crate::geometric::parcel::{geometry_kind, ParcelCollection};
use crate::geometric::spatial_join::intersects_join;

/// A grain bin or silo
#[derive(Debug, Clone)]
pub struct GrainBin {
    /// Row position in the structure layer (`UID`)
    pub uid: usize,
    /// Point or polygon footprint
    pub geometry: Geometry<f64>,
    /// Diameter in metres
    pub diameter_m: f64,
    /// Radius and area derived from the diameter, in feet
    pub footprint: Footprint,
    /// Every source attribute, as read
    pub properties: JsonObject,
}

impl GrainBin {
    pub fn new(uid: usize, geometry: Geometry<f64>, diameter_m: f64) -> Self {
        let mut properties = JsonObject::new();
        properties.insert(DIAMETER_FIELD.to_string(), json_number(diameter_m));
        GrainBin {
            uid,
            geometry,
            diameter_m,
            footprint: Footprint::from_diameter(diameter_m),
            properties,
        }
    }

    /// Source attributes plus UID, radius and area
    pub fn output_properties(&self) -> JsonObject {
        let mut props = self.properties.clone();
        props.insert("UID".to_string(), self.uid.into());
        props.insert("radius".to_string(), json_number(self.footprint.radius_ft));
        props.insert("area".to_string(), json_number(self.footprint.area_sqft));
        props
    }
}

/// Collection of grain bins with processing capabilities
#[derive(Debug, Clone)]
pub struct GrainBinCollection {
    pub bins: Vec<GrainBin>,
    pub geo_core: GeoCore,
}

impl GrainBinCollection {
    pub fn new(bins: Vec<GrainBin>, geo_core: GeoCore) -> Self {
        GrainBinCollection { bins, geo_core }
    }

    /// Interpret a raw layer as grain bins; DIAMETER is required and must be numeric
    pub fn from_layer(layer: &Layer, geo_core: GeoCore) -> Result<Self> {
        layer.require_fields(&[DIAMETER_FIELD])?;

        let mut bins = Vec::with_capacity(layer.len());
        for feature in &layer.features {
            match &feature.geometry {
                Geometry::Point(_)
                | Geometry::MultiPoint(_)
                | Geometry::Polygon(_)
                | Geometry::MultiPolygon(_) => {}
                other => {
                    return Err(CaseStudyError::UnsupportedGeometry {
                        layer: layer.name.clone(),
                        kind: geometry_kind(other).to_string(),
                        index: feature.index,
                    }
                    .into())
                }
            }

            let diameter_m = numeric_property(&layer.name, feature, DIAMETER_FIELD, None)?;
            bins.push(GrainBin {
                uid: feature.index,
                geometry: feature.geometry.clone(),
                diameter_m,
                footprint: Footprint::from_diameter(diameter_m),
                properties: feature.properties.clone(),
            });
        }

        Ok(GrainBinCollection::new(bins, geo_core))
    }

    /// Drop every bin that touches a municipal parcel.
    ///
    /// Bins are joined to all parcels they intersect and the municipal flag is
    /// max-aggregated per UID, so one municipal overlap excludes the whole bin.
    /// Bins intersecting no parcel count as private and are kept. Order and
    /// attributes are preserved; each bin appears at most once.
    pub fn remove_municipal(&self, parcels: &ParcelCollection) -> GrainBinCollection {
        let pairs = intersects_join(&self.bins, &parcels.parcels, |b| &b.geometry, |p| &p.geometry);

        let mut muni_by_uid: BTreeMap<usize, bool> = BTreeMap::new();
        for (b, p) in pairs {
            let flag = muni_by_uid.entry(self.bins[b].uid).or_insert(false);
            *flag = *flag || parcels.parcels[p].muni;
        }

        let kept: Vec<GrainBin> = self
            .bins
            .iter()
            .filter(|bin| !muni_by_uid.get(&bin.uid).copied().unwrap_or(false))
            .cloned()
            .collect();

        debug!(
            "{} of {} bins intersect at least one parcel",
            muni_by_uid.len(),
            self.bins.len()
        );
        info!(
            "Removed {} bins on municipal parcels, {} remain",
            self.bins.len() - kept.len(),
            kept.len()
        );

        GrainBinCollection::new(kept, self.geo_core.clone())
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Save as a GeoJSON FeatureCollection
    pub fn to_geojson<P: AsRef<Path>>(&self, output_file: P) -> Result<()> {
        let features = self
            .bins
            .iter()
            .map(|bin| to_feature(&bin.geometry, bin.output_properties()))
            .collect();
        let geo_core = self.geo_core.with_extent(self.bins.iter().map(|b| &b.geometry));
        write_feature_collection(output_file.as_ref(), features, &geo_core)?;
        info!("Grain bins saved to: {:?}", output_file.as_ref());
        Ok(())
    }

    /// Convert to a Polars DataFrame (attributes only)
    pub fn to_polars_df(&self) -> Result<DataFrame> {
        let uid_vec: Vec<u64> = self.bins.iter().map(|b| b.uid as u64).collect();
        let diameter_vec: Vec<f64> = self.bins.iter().map(|b| b.diameter_m).collect();
        let radius_vec: Vec<f64> = self.bins.iter().map(|b| b.footprint.radius_ft).collect();
        let area_vec: Vec<f64> = self.bins.iter().map(|b| b.footprint.area_sqft).collect();

        let df = df! [
            "UID" => uid_vec,
            "DIAMETER" => diameter_vec,
            "radius" => radius_vec,
            "area" => area_vec,
        ]
        .context("Failed to create DataFrame")?;

        Ok(df)
    }
}
