use anyhow::{Context, Result};
use log::{info, warn};
use std::path::PathBuf;

use crate::collect::layer::Layer;
use crate::config::CaseStudyConfig;
use crate::geo_core::GeoCore;
use crate::geometric::capacity::HeightCapacity;
use crate::geometric::grain_bin::GrainBinCollection;
use crate::geometric::owner_polygon::OwnerPolygonCollection;
use crate::geometric::parcel::ParcelCollection;
use crate::geometric::parcel_bins::CapacityJoin;
use crate::render::choropleth::Choropleth;

/// Every intermediate product of one run
#[derive(Debug, Clone)]
pub struct CaseStudyResult {
    /// All parcels with their municipal label
    pub parcels: ParcelCollection,
    /// Number of grain bins read, before filtering
    pub structures_read: usize,
    /// Grain bins clear of municipal land
    pub grain_bins: GrainBinCollection,
    /// Parcels with farm acreage
    pub agricultural: ParcelCollection,
    /// Agricultural land dissolved by owner and exploded
    pub owner_polygons: OwnerPolygonCollection,
    pub join: CapacityJoin,
}

/// Paths of the files an export produced
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFiles {
    pub map: PathBuf,
    pub parcels_bins: PathBuf,
    pub parcels_agri: PathBuf,
    pub grainbins: PathBuf,
    pub summary: PathBuf,
}

/// Run every analysis stage on two loaded layers. Nothing is written.
pub fn analyze(
    parcels_layer: &Layer,
    structures_layer: &Layer,
    heights: &[u32],
    geo_core: &GeoCore,
) -> Result<CaseStudyResult> {
    info!("Data preparation and wrangling...");
    let parcels = ParcelCollection::from_layer(parcels_layer, geo_core.clone())?;
    let structures = GrainBinCollection::from_layer(structures_layer, geo_core.clone())?;
    let grain_bins = structures.remove_municipal(&parcels);
    let agricultural = parcels.agricultural();

    info!("Spatial Analysis...");
    let owner_polygons = OwnerPolygonCollection::from_parcels(&agricultural);
    let join = CapacityJoin::new(&owner_polygons, &grain_bins, heights);

    Ok(CaseStudyResult {
        parcels,
        structures_read: structures.len(),
        grain_bins,
        agricultural,
        owner_polygons,
        join,
    })
}

impl CaseStudyResult {
    /// County-wide capacity per height
    pub fn totals(&self) -> Vec<HeightCapacity> {
        self.join.totals()
    }

    pub fn log_summary(&self) {
        info!(
            "Parcels: {} read, {} municipal, {} agricultural",
            self.parcels.len(),
            self.parcels.municipal_count(),
            self.agricultural.len()
        );
        info!(
            "Grain bins: {} read, {} on municipal land, {} kept",
            self.structures_read,
            self.structures_read - self.grain_bins.len(),
            self.grain_bins.len()
        );
        info!(
            "Owners: {}, owner polygons: {}, polygons with bins: {}",
            self.owner_polygons.owner_count,
            self.owner_polygons.len(),
            self.join.polygons.len()
        );
        for total in self.totals() {
            info!(
                "At {} ft: {:.0} cu ft, {:.0} bushels",
                total.height_ft, total.volume_cuft, total.bushels
            );
        }
    }

    /// Write the map, the three GeoJSON datasets and the CSV summary
    pub fn export(&self, config: &CaseStudyConfig) -> Result<ExportedFiles> {
        let output_dir = &config.output.dir;
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

        let files = ExportedFiles {
            map: config.output_file(&config.output.map),
            parcels_bins: config.output_file(&config.output.parcels_bins),
            parcels_agri: config.output_file(&config.output.parcels_agri),
            grainbins: config.output_file(&config.output.grainbins),
            summary: config.output_file(&config.output.summary),
        };

        info!("Export the map...");
        Choropleth::new(&config.map.column, config.map.figure)
            .save(&self.join, &files.map)
            .context("Failed to render capacity map")?;

        info!("Export the data...");
        self.join.to_geojson(&files.parcels_bins)?;
        self.owner_polygons.to_geojson(&files.parcels_agri)?;
        self.grain_bins.to_geojson(&files.grainbins)?;
        self.join.write_summary_csv(&files.summary)?;

        Ok(files)
    }
}

/// The case study as configured: load, analyse, export
pub struct CaseStudy {
    pub config: CaseStudyConfig,
    pub geo_core: GeoCore,
}

impl CaseStudy {
    pub fn new(config: CaseStudyConfig) -> Result<Self> {
        config.validate()?;
        let geo_core = GeoCore::new(config.analysis.epsg);
        Ok(CaseStudy { config, geo_core })
    }

    /// Read both input layers
    pub fn load_layers(&self) -> Result<(Layer, Layer)> {
        let parcels = Layer::read(self.config.parcels_path(), "parcels")?;
        let structures = Layer::read(self.config.structures_path(), "structures")?;

        for layer in [&parcels, &structures] {
            if let Some(epsg) = layer.epsg {
                if epsg != self.geo_core.get_epsg() {
                    warn!(
                        "Layer '{}' declares EPSG:{} but EPSG:{} is configured; no reprojection is done",
                        layer.name,
                        epsg,
                        self.geo_core.get_epsg()
                    );
                }
            }
        }
        info!(
            "Loaded {} parcels and {} structures",
            parcels.len(),
            structures.len()
        );
        Ok((parcels, structures))
    }

    /// Run the whole case study and write every output
    pub fn run(&self) -> Result<CaseStudyResult> {
        let (parcels, structures) = self.load_layers()?;
        let result = analyze(
            &parcels,
            &structures,
            &self.config.analysis.heights,
            &self.geo_core,
        )?;
        result.log_summary();
        result.export(&self.config)?;
        Ok(result)
    }
}
