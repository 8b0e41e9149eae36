use std::path::PathBuf;

use bincap::config::CaseStudyConfig;
use bincap::geometric::capacity::{bushels_column, Capacity};

/// Grain storage capacity case study (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "bincap", version, about)]
pub struct Cli {
    /// TOML configuration file; flags below override its values
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Directory holding the parcel and structure layers, defaults to "."
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub input_dir: Option<PathBuf>,

    /// Output directory, defaults to "./temp"
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output_dir: Option<PathBuf>,

    /// Parcel layer file name (.shp, .geojson or .json)
    #[arg(long)]
    pub parcels: Option<String>,

    /// Grain bin layer file name (.shp, .geojson or .json)
    #[arg(long)]
    pub structures: Option<String>,

    /// Column shading the map, e.g. bushels_54, volume_15, area_sum
    #[arg(long)]
    pub column: Option<String>,

    /// Assumed storage height in feet; repeat for several scenarios
    #[arg(long = "height", value_name = "FT")]
    pub heights: Vec<u32>,

    /// EPSG code of the input layers
    #[arg(long)]
    pub epsg: Option<i32>,

    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Layer the flags over a base configuration
    pub fn apply(&self, mut config: CaseStudyConfig) -> CaseStudyConfig {
        if let Some(dir) = &self.input_dir {
            config.input.dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if let Some(parcels) = &self.parcels {
            config.input.parcels = parcels.clone();
        }
        if let Some(structures) = &self.structures {
            config.input.structures = structures.clone();
        }
        if let Some(column) = &self.column {
            config.map.column = column.clone();
        }
        if !self.heights.is_empty() {
            config.analysis.heights = self.heights.clone();
            // keep the default map column in step with the new heights
            let column = &config.map.column;
            let is_capacity = column.starts_with("volume_") || column.starts_with("bushels_");
            let names = Capacity::column_names(&self.heights);
            if self.column.is_none() && is_capacity && !names.contains(column) {
                if let Some(&highest) = self.heights.iter().max() {
                    config.map.column = bushels_column(highest);
                }
            }
        }
        if let Some(epsg) = self.epsg {
            config.analysis.epsg = epsg;
        }
        config
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Warn;
        }
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
