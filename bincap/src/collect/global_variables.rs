use std::path::PathBuf;

pub const TEMP_PATH: &str = "./temp";

/// Default input layers, resolved against the configured input directory
pub const PARCELS_FILE: &str = "parcels_ilmenard.shp";
pub const STRUCTURES_FILE: &str = "silos_ilmenard.shp";

/// Default output names, resolved against the configured output directory
pub const MAP_FILE: &str = "Max_Capacity_Map.png";
pub const PARCELS_BINS_FILE: &str = "parcels_bins.geojson";
pub const PARCELS_AGRI_FILE: &str = "parcels_agri.geojson";
pub const GRAINBINS_FILE: &str = "grainbins.geojson";
pub const SUMMARY_FILE: &str = "capacity_summary.csv";

/// Required attribute names of the input layers
pub const OWNER_FIELD: &str = "OWNER";
pub const FARM_ACRES_FIELD: &str = "FARM_ACRES";
pub const DIAMETER_FIELD: &str = "DIAMETER";

/// Derived attribute names written to the outputs
pub const OWNER_COPY_FIELD: &str = "OWNER_copy";
pub const MUNI_FIELD: &str = "muni";

pub fn get_temp_path() -> PathBuf {
    PathBuf::from(TEMP_PATH)
}
