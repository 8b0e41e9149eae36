use anyhow::{Context, Result};
use geo::{Area, BooleanOps, Geometry, MultiPolygon, Polygon};
use geojson::JsonObject;
use log::{debug, info};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

use crate::collect::global_variables::{MUNI_FIELD, OWNER_COPY_FIELD};
use crate::commons::basic_functions::{to_feature, write_feature_collection};
use crate::geo_core::GeoCore;
use crate::geometric::parcel::{Parcel, ParcelCollection};

/// Every agricultural parcel of one owner, unioned
#[derive(Debug, Clone)]
pub struct OwnerHolding {
    pub owner: String,
    /// FARM_ACRES of the first parcel in the group
    pub farm_acres: f64,
    /// Number of parcels dissolved into this holding
    pub parcel_count: usize,
    /// Municipal label of the first parcel in the group
    pub muni: bool,
    /// Attributes of the first parcel in the group
    pub properties: JsonObject,
    pub geometry: MultiPolygon<f64>,
}

impl OwnerHolding {
    fn from_group(owner: &str, group: &[&Parcel]) -> Option<Self> {
        let (first, rest) = group.split_first()?;
        let geometry = rest
            .iter()
            .fold(first.to_multi_polygon(), |acc, parcel| {
                acc.union(&parcel.to_multi_polygon())
            });
        Some(OwnerHolding {
            owner: owner.to_string(),
            farm_acres: first.farm_acres,
            parcel_count: group.len(),
            muni: first.muni,
            properties: first.properties.clone(),
            geometry,
        })
    }
}

/// Group parcels by owner and union each group.
///
/// Groups come out sorted by owner name; the non-geometry attributes of a
/// holding are those of the first parcel of its group in input order.
pub fn dissolve_by_owner(parcels: &ParcelCollection) -> Vec<OwnerHolding> {
    let mut groups: BTreeMap<&str, Vec<&Parcel>> = BTreeMap::new();
    for parcel in &parcels.parcels {
        groups.entry(parcel.owner.as_str()).or_default().push(parcel);
    }

    groups
        .iter()
        .filter_map(|(owner, group)| OwnerHolding::from_group(owner, group))
        .collect()
}

/// One contiguous agricultural land unit under one owner
#[derive(Debug, Clone)]
pub struct OwnerPolygon {
    /// Sequential id, from 0, across all owners
    pub index: usize,
    pub owner: String,
    pub farm_acres: f64,
    pub parcel_count: usize,
    pub muni: bool,
    pub properties: JsonObject,
    pub geometry: Geometry<f64>,
}

impl OwnerPolygon {
    fn new(index: usize, holding: &OwnerHolding, polygon: Polygon<f64>) -> Self {
        OwnerPolygon {
            index,
            owner: holding.owner.clone(),
            farm_acres: holding.farm_acres,
            parcel_count: holding.parcel_count,
            muni: holding.muni,
            properties: holding.properties.clone(),
            geometry: Geometry::Polygon(polygon),
        }
    }

    /// Holding attributes plus `OWNER_copy`, `muni`, `parcel_count` and `index`.
    /// The web viewer reads the owner from `OWNER_copy`.
    pub fn output_properties(&self) -> JsonObject {
        let mut props = self.properties.clone();
        props.insert(OWNER_COPY_FIELD.to_string(), self.owner.clone().into());
        props.insert(MUNI_FIELD.to_string(), u8::from(self.muni).into());
        props.insert("parcel_count".to_string(), self.parcel_count.into());
        props.insert("index".to_string(), self.index.into());
        props
    }
}

/// Split holdings into single polygons and number them sequentially
pub fn explode(holdings: &[OwnerHolding]) -> Vec<OwnerPolygon> {
    holdings
        .iter()
        .flat_map(|holding| {
            holding
                .geometry
                .0
                .iter()
                .cloned()
                .map(move |polygon| (holding, polygon))
        })
        .enumerate()
        .map(|(index, (holding, polygon))| OwnerPolygon::new(index, holding, polygon))
        .collect()
}

/// Agricultural land dissolved by owner and exploded into simple polygons
#[derive(Debug, Clone)]
pub struct OwnerPolygonCollection {
    pub polygons: Vec<OwnerPolygon>,
    /// Number of distinct owners before exploding
    pub owner_count: usize,
    pub geo_core: GeoCore,
}

impl OwnerPolygonCollection {
    /// Dissolve then explode the given (already agricultural) parcels
    pub fn from_parcels(parcels: &ParcelCollection) -> Self {
        let holdings = dissolve_by_owner(parcels);
        let polygons = explode(&holdings);
        debug!(
            "Dissolved {} parcels into {} owners, {} polygons",
            parcels.len(),
            holdings.len(),
            polygons.len()
        );
        OwnerPolygonCollection {
            polygons,
            owner_count: holdings.len(),
            geo_core: parcels.geo_core.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Save as a GeoJSON FeatureCollection
    pub fn to_geojson<P: AsRef<Path>>(&self, output_file: P) -> Result<()> {
        let features = self
            .polygons
            .iter()
            .map(|p| to_feature(&p.geometry, p.output_properties()))
            .collect();
        let geo_core = self.geo_core.with_extent(self.polygons.iter().map(|p| &p.geometry));
        write_feature_collection(output_file.as_ref(), features, &geo_core)?;
        info!("Owner polygons saved to: {:?}", output_file.as_ref());
        Ok(())
    }

    /// Convert to a Polars DataFrame (attributes and planar area)
    pub fn to_polars_df(&self) -> Result<DataFrame> {
        let index_vec: Vec<u64> = self.polygons.iter().map(|p| p.index as u64).collect();
        let owner_vec: Vec<String> = self.polygons.iter().map(|p| p.owner.clone()).collect();
        let acres_vec: Vec<f64> = self.polygons.iter().map(|p| p.farm_acres).collect();
        let count_vec: Vec<u64> = self.polygons.iter().map(|p| p.parcel_count as u64).collect();
        let area_vec: Vec<f64> = self
            .polygons
            .iter()
            .map(|p| p.geometry.unsigned_area())
            .collect();

        let df = df! [
            "index" => index_vec,
            "OWNER" => owner_vec,
            "FARM_ACRES" => acres_vec,
            "parcel_count" => count_vec,
            "shape_area" => area_vec,
        ]
        .context("Failed to create DataFrame")?;

        Ok(df)
    }
}
