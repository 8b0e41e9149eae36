use anyhow::{Context, Result};
use geo::Geometry;
use geojson::JsonObject;
use log::{debug, info};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

use crate::collect::global_variables::{DIAMETER_FIELD, FARM_ACRES_FIELD, OWNER_FIELD};
use crate::commons::basic_functions::{json_number, to_feature, write_feature_collection};
use crate::error::CaseStudyError;
use crate::geo_core::GeoCore;
use crate::geometric::capacity::{Capacity, HeightCapacity};
use crate::geometric::grain_bin::{GrainBin, GrainBinCollection};
use crate::geometric::owner_polygon::{OwnerPolygon, OwnerPolygonCollection};
use crate::geometric::spatial_join::intersects_join;

/// Footprint total and capacity of one owner-polygon
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonCapacity {
    pub index: usize,
    pub owner: String,
    pub bin_count: usize,
    pub capacity: Capacity,
}

/// One (owner-polygon, grain bin) pair carrying the polygon's capacity
#[derive(Debug, Clone)]
pub struct ParcelBinRecord {
    /// Owner-polygon id
    pub index: usize,
    /// Grain bin id
    pub uid: usize,
    pub owner: String,
    pub farm_acres: f64,
    pub diameter_m: f64,
    pub radius_ft: f64,
    /// Footprint of this bin alone
    pub area_sqft: f64,
    /// Owner-polygon boundary
    pub geometry: Geometry<f64>,
    /// Polygon and bin attributes merged
    pub properties: JsonObject,
}

/// Owner-polygons joined to the grain bins they hold, with capacity per polygon
#[derive(Debug, Clone)]
pub struct CapacityJoin {
    pub heights: Vec<u32>,
    pub records: Vec<ParcelBinRecord>,
    pub polygons: BTreeMap<usize, PolygonCapacity>,
    pub geo_core: GeoCore,
}

impl CapacityJoin {
    /// Inner-join polygons to bins on intersection, sum bin footprints per
    /// polygon and derive volume and bushels at every height from that sum.
    /// A bin touching two polygons counts in full toward both.
    pub fn new(
        polygons: &OwnerPolygonCollection,
        bins: &GrainBinCollection,
        heights: &[u32],
    ) -> Self {
        let pairs = intersects_join(
            &polygons.polygons,
            &bins.bins,
            |p| &p.geometry,
            |b| &b.geometry,
        );

        let mut sums: BTreeMap<usize, (&OwnerPolygon, usize, f64)> = BTreeMap::new();
        for &(p, b) in &pairs {
            let polygon = &polygons.polygons[p];
            let entry = sums.entry(polygon.index).or_insert((polygon, 0, 0.0));
            entry.1 += 1;
            entry.2 += bins.bins[b].footprint.area_sqft;
        }

        let aggregates: BTreeMap<usize, PolygonCapacity> = sums
            .into_iter()
            .map(|(index, (polygon, bin_count, area_sum))| {
                (
                    index,
                    PolygonCapacity {
                        index,
                        owner: polygon.owner.clone(),
                        bin_count,
                        capacity: Capacity::from_area(area_sum, heights),
                    },
                )
            })
            .collect();

        let records: Vec<ParcelBinRecord> = pairs
            .iter()
            .map(|&(p, b)| {
                let polygon = &polygons.polygons[p];
                let bin = &bins.bins[b];
                ParcelBinRecord {
                    index: polygon.index,
                    uid: bin.uid,
                    owner: polygon.owner.clone(),
                    farm_acres: polygon.farm_acres,
                    diameter_m: bin.diameter_m,
                    radius_ft: bin.footprint.radius_ft,
                    area_sqft: bin.footprint.area_sqft,
                    geometry: polygon.geometry.clone(),
                    properties: merge_properties(polygon, bin),
                }
            })
            .collect();

        debug!(
            "Joined {} polygons to {} bins: {} pairs, {} polygons with bins",
            polygons.len(),
            bins.len(),
            records.len(),
            aggregates.len()
        );

        CapacityJoin {
            heights: heights.to_vec(),
            records,
            polygons: aggregates,
            geo_core: polygons.geo_core.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Capacity of the polygon a record belongs to
    pub fn polygon_capacity(&self, record: &ParcelBinRecord) -> Option<&PolygonCapacity> {
        self.polygons.get(&record.index)
    }

    /// Every column name `column_value` understands, in export order
    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec![
            OWNER_FIELD.to_string(),
            FARM_ACRES_FIELD.to_string(),
            DIAMETER_FIELD.to_string(),
            "radius".to_string(),
            "area".to_string(),
            "area_sum".to_string(),
        ];
        names.extend(Capacity::column_names(&self.heights));
        names
    }

    /// Numeric value of `column` for one record; `None` for unknown or
    /// non-numeric columns
    pub fn column_value(&self, record: &ParcelBinRecord, column: &str) -> Option<f64> {
        match column {
            FARM_ACRES_FIELD => Some(record.farm_acres),
            DIAMETER_FIELD => Some(record.diameter_m),
            "radius" => Some(record.radius_ft),
            "area" => Some(record.area_sqft),
            "area_sum" => self.polygon_capacity(record).map(|c| c.capacity.area_sqft),
            _ => self
                .polygon_capacity(record)
                .and_then(|c| c.capacity.column(column)),
        }
    }

    /// One value per record for a numeric column
    pub fn column(&self, column: &str) -> Result<Vec<f64>> {
        let known = self.column_names();
        if column == OWNER_FIELD || !known.iter().any(|c| c == column) {
            return Err(CaseStudyError::UnknownColumn(column.to_string()).into());
        }
        self.records
            .iter()
            .map(|record| {
                self.column_value(record, column)
                    .ok_or_else(|| CaseStudyError::UnknownColumn(column.to_string()).into())
            })
            .collect()
    }

    /// County-wide volume and bushels per height
    pub fn totals(&self) -> Vec<HeightCapacity> {
        let area: f64 = self.polygons.values().map(|c| c.capacity.area_sqft).sum();
        Capacity::from_area(area, &self.heights).scenarios
    }

    /// Capacity per owner, summed over that owner's polygons
    pub fn owner_totals(&self) -> BTreeMap<String, Capacity> {
        let mut areas: BTreeMap<String, f64> = BTreeMap::new();
        for polygon in self.polygons.values() {
            *areas.entry(polygon.owner.clone()).or_insert(0.0) += polygon.capacity.area_sqft;
        }
        areas
            .into_iter()
            .map(|(owner, area)| (owner, Capacity::from_area(area, &self.heights)))
            .collect()
    }

    /// Merged attributes of a record plus `area_sum`, volumes and bushels
    pub fn output_properties(&self, record: &ParcelBinRecord) -> JsonObject {
        let mut props = record.properties.clone();
        if let Some(polygon) = self.polygon_capacity(record) {
            props.insert("area_sum".to_string(), json_number(polygon.capacity.area_sqft));
            for s in &polygon.capacity.scenarios {
                props.insert(s.volume_column(), json_number(s.volume_cuft));
            }
            for s in &polygon.capacity.scenarios {
                props.insert(s.bushels_column(), json_number(s.bushels));
            }
        }
        props
    }

    /// Save the joined records as a GeoJSON FeatureCollection
    pub fn to_geojson<P: AsRef<Path>>(&self, output_file: P) -> Result<()> {
        let features = self
            .records
            .iter()
            .map(|r| to_feature(&r.geometry, self.output_properties(r)))
            .collect();
        let geo_core = self.geo_core.with_extent(self.records.iter().map(|r| &r.geometry));
        write_feature_collection(output_file.as_ref(), features, &geo_core)?;
        info!("Parcel bins saved to: {:?}", output_file.as_ref());
        Ok(())
    }

    fn summary_header(&self) -> Vec<String> {
        let mut header = vec![
            "index".to_string(),
            OWNER_FIELD.to_string(),
            "bin_count".to_string(),
            "area_sum".to_string(),
        ];
        header.extend(Capacity::column_names(&self.heights));
        header
    }

    /// Write one row per polygon holding bins, ordered by polygon id
    pub fn write_summary_csv<P: AsRef<Path>>(&self, output_file: P) -> Result<()> {
        let output_file = output_file.as_ref();
        let mut writer = csv::Writer::from_path(output_file)
            .with_context(|| format!("Failed to create CSV file: {:?}", output_file))?;

        writer
            .write_record(self.summary_header())
            .context("Failed to write CSV header")?;

        for polygon in self.polygons.values() {
            let mut row = vec![
                polygon.index.to_string(),
                polygon.owner.clone(),
                polygon.bin_count.to_string(),
                polygon.capacity.area_sqft.to_string(),
            ];
            row.extend(polygon.capacity.scenarios.iter().map(|s| s.volume_cuft.to_string()));
            row.extend(polygon.capacity.scenarios.iter().map(|s| s.bushels.to_string()));
            writer
                .write_record(&row)
                .with_context(|| format!("Failed to write CSV row for polygon {}", polygon.index))?;
        }

        writer.flush().context("Failed to flush CSV file")?;
        info!("Capacity summary saved to: {:?}", output_file);
        Ok(())
    }

    /// Per-polygon summary as a Polars DataFrame, same layout as the CSV
    pub fn to_polars_df(&self) -> Result<DataFrame> {
        let values = || self.polygons.values();

        let mut columns: Vec<Column> = vec![
            Column::new(
                "index".into(),
                values().map(|p| p.index as u64).collect::<Vec<u64>>(),
            ),
            Column::new(
                OWNER_FIELD.into(),
                values().map(|p| p.owner.clone()).collect::<Vec<String>>(),
            ),
            Column::new(
                "bin_count".into(),
                values().map(|p| p.bin_count as u64).collect::<Vec<u64>>(),
            ),
            Column::new(
                "area_sum".into(),
                values().map(|p| p.capacity.area_sqft).collect::<Vec<f64>>(),
            ),
        ];
        for name in Capacity::column_names(&self.heights) {
            let series: Vec<f64> = values()
                .map(|p| p.capacity.column(&name).unwrap_or(f64::NAN))
                .collect();
            columns.push(Column::new(name.as_str().into(), series));
        }

        DataFrame::new(columns).context("Failed to create DataFrame")
    }
}

/// Polygon attributes then bin attributes; keys present on both sides are
/// kept twice with `_left` and `_right` suffixes
fn merge_properties(polygon: &OwnerPolygon, bin: &GrainBin) -> JsonObject {
    let left = polygon.output_properties();
    let right = bin.output_properties();

    let mut merged = JsonObject::new();
    for (key, value) in &left {
        if right.contains_key(key) {
            merged.insert(format!("{}_left", key), value.clone());
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in &right {
        if left.contains_key(key) {
            merged.insert(format!("{}_right", key), value.clone());
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometric::capacity::{bushels, DEFAULT_HEIGHTS_FT};
    use crate::geometric::parcel::{Parcel, ParcelCollection};
    use geo::{point, polygon};

    fn square(x0: f64, y0: f64, size: f64) -> Geometry<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]
        .into()
    }

    fn county() -> (OwnerPolygonCollection, GrainBinCollection) {
        let parcels = ParcelCollection::new(
            vec![
                Parcel::new(0, square(0.0, 0.0, 10.0), "JOHN SMITH", 40.0),
                Parcel::new(1, square(100.0, 0.0, 10.0), "JOHN SMITH", 20.0),
                Parcel::new(2, square(200.0, 0.0, 10.0), "MARY JONES", 80.0),
                Parcel::new(3, square(300.0, 0.0, 10.0), "IDLE LAND TRUST", 0.0),
            ],
            GeoCore::default(),
        );
        let polygons = OwnerPolygonCollection::from_parcels(&parcels.agricultural());

        let bins = GrainBinCollection::new(
            vec![
                GrainBin::new(0, point!(x: 2.0, y: 2.0).into(), 10.0),
                GrainBin::new(1, point!(x: 5.0, y: 5.0).into(), 8.0),
                GrainBin::new(2, point!(x: 105.0, y: 5.0).into(), 12.0),
                GrainBin::new(3, point!(x: 205.0, y: 5.0).into(), 6.0),
                // on the non-agricultural parcel
                GrainBin::new(4, point!(x: 305.0, y: 5.0).into(), 20.0),
            ],
            GeoCore::default(),
        );
        (polygons, bins)
    }

    #[test]
    fn test_area_summed_per_polygon() {
        let (polygons, bins) = county();
        let join = CapacityJoin::new(&polygons, &bins, &DEFAULT_HEIGHTS_FT);

        assert_eq!(join.len(), 4);
        assert_eq!(join.polygons.len(), 3);

        // part order out of a union is not fixed, so look the west polygon up
        let west = join.records.iter().find(|r| r.uid == 0).unwrap().index;
        let first = &join.polygons[&west];
        let expected = bins.bins[0].footprint.area_sqft + bins.bins[1].footprint.area_sqft;
        assert_eq!(first.bin_count, 2);
        assert!((first.capacity.area_sqft - expected).abs() < 1e-9);
        assert!(
            (first.capacity.at_height(54).unwrap().bushels - bushels(expected * 54.0)).abs()
                < 1e-6
        );

        // both records of the west polygon carry the same aggregate
        let values: Vec<f64> = join.column("bushels_54").unwrap();
        let positions: Vec<usize> = join
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.index == west)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(positions.len(), 2);
        assert_eq!(values[positions[0]], values[positions[1]]);
    }

    #[test]
    fn test_non_agricultural_parcels_get_no_capacity() {
        let (polygons, bins) = county();
        let join = CapacityJoin::new(&polygons, &bins, &DEFAULT_HEIGHTS_FT);
        assert!(join.records.iter().all(|r| r.uid != 4));
        assert!(join.polygons.values().all(|p| p.owner != "IDLE LAND TRUST"));
    }

    #[test]
    fn test_owner_total_equals_sum_over_polygons() {
        let (polygons, bins) = county();
        let join = CapacityJoin::new(&polygons, &bins, &DEFAULT_HEIGHTS_FT);

        let per_polygon: f64 = join
            .polygons
            .values()
            .filter(|p| p.owner == "JOHN SMITH")
            .map(|p| p.capacity.column("bushels_54").unwrap())
            .sum();
        let footprints: f64 = bins.bins[..3].iter().map(|b| b.footprint.area_sqft).sum();

        assert!((per_polygon - bushels(footprints * 54.0)).abs() < 1e-6);
        let owner = &join.owner_totals()["JOHN SMITH"];
        assert!((owner.at_height(54).unwrap().bushels - per_polygon).abs() < 1e-6);
    }

    #[test]
    fn test_straddling_bin_counts_toward_both_polygons() {
        let parcels = ParcelCollection::new(
            vec![
                Parcel::new(0, square(0.0, 0.0, 10.0), "A", 1.0),
                Parcel::new(1, square(10.0, 0.0, 10.0), "B", 1.0),
            ],
            GeoCore::default(),
        );
        let polygons = OwnerPolygonCollection::from_parcels(&parcels);
        let bins = GrainBinCollection::new(
            vec![GrainBin::new(0, square(9.0, 4.0, 2.0), 10.0)],
            GeoCore::default(),
        );
        let join = CapacityJoin::new(&polygons, &bins, &[15]);
        assert_eq!(join.len(), 2);
        let area = bins.bins[0].footprint.area_sqft;
        assert!(join
            .polygons
            .values()
            .all(|p| (p.capacity.area_sqft - area).abs() < 1e-9));
        let total = join.totals();
        assert!((total[0].volume_cuft - 2.0 * area * 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_column_rejects_unknown_names() {
        let (polygons, bins) = county();
        let join = CapacityJoin::new(&polygons, &bins, &DEFAULT_HEIGHTS_FT);
        for bad in ["bushels_20", "OWNER", "nonsense"] {
            let err = join.column(bad).unwrap_err();
            assert_eq!(
                err.downcast_ref::<CaseStudyError>(),
                Some(&CaseStudyError::UnknownColumn(bad.to_string()))
            );
        }
        assert_eq!(join.column("area_sum").unwrap().len(), 4);
        assert_eq!(join.column("FARM_ACRES").unwrap()[0], 40.0);
    }

    #[test]
    fn test_output_properties() {
        let (polygons, bins) = county();
        let join = CapacityJoin::new(&polygons, &bins, &DEFAULT_HEIGHTS_FT);
        let props = join.output_properties(&join.records[0]);
        assert_eq!(props["OWNER"], "JOHN SMITH");
        assert_eq!(props["UID"], join.records[0].uid);
        assert_eq!(props["index"], 0);
        assert_eq!(props["OWNER_copy"], "JOHN SMITH");
        assert_eq!(props["muni"], 0);
        for key in [
            "radius",
            "area",
            "area_sum",
            "volume_15",
            "volume_54",
            "bushels_15",
            "bushels_54",
        ] {
            assert!(props.contains_key(key), "missing {}", key);
        }
    }

    #[test]
    fn test_merge_properties_suffixes_shared_keys() {
        let parcels = ParcelCollection::new(
            vec![Parcel::new(0, square(0.0, 0.0, 10.0), "A", 1.0)],
            GeoCore::default(),
        );
        let polygons = OwnerPolygonCollection::from_parcels(&parcels);
        let mut bin = GrainBin::new(0, point!(x: 1.0, y: 1.0).into(), 10.0);
        bin.properties.insert("OWNER".to_string(), "B".into());

        let merged = merge_properties(&polygons.polygons[0], &bin);
        assert_eq!(merged["OWNER_left"], "A");
        assert_eq!(merged["OWNER_right"], "B");
        assert!(!merged.contains_key("OWNER"));
        // the copy survives a clash on OWNER
        assert_eq!(merged["OWNER_copy"], "A");
        assert_eq!(merged["DIAMETER"], 10.0);
    }

    #[test]
    fn test_summary_csv_and_dataframe() {
        let (polygons, bins) = county();
        let join = CapacityJoin::new(&polygons, &bins, &DEFAULT_HEIGHTS_FT);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        join.write_summary_csv(&path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(
            header,
            vec![
                "index",
                "OWNER",
                "bin_count",
                "area_sum",
                "volume_15",
                "volume_54",
                "bushels_15",
                "bushels_54"
            ]
        );
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        let ids: Vec<&str> = rows.iter().map(|r| &r[0]).collect();
        assert_eq!(ids, vec!["0", "1", "2"]);
        let bin_counts: usize = rows.iter().map(|r| r[2].parse::<usize>().unwrap()).sum();
        assert_eq!(bin_counts, 4);

        let df = join.to_polars_df().unwrap();
        assert_eq!(df.shape(), (3, 8));
    }
}
