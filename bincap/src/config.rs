//! Case study configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then CLI
//! flags. Every section may be omitted from the file:
//!
//! ```toml
//! [input]
//! dir = "data/menard"
//! parcels = "parcels_ilmenard.shp"
//! structures = "silos_ilmenard.shp"
//!
//! [output]
//! dir = "./temp"
//!
//! [analysis]
//! epsg = 3435
//! heights = [15, 54]
//!
//! [map]
//! column = "bushels_54"
//! figure = { width_in = 15.0, height_in = 9.0, dpi = 100.0 }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::collect::global_variables::{
    get_temp_path, GRAINBINS_FILE, MAP_FILE, PARCELS_AGRI_FILE, PARCELS_BINS_FILE,
    PARCELS_FILE, STRUCTURES_FILE, SUMMARY_FILE,
};
use crate::error::CaseStudyError;
use crate::geo_core::WGS84_EPSG;
use crate::geometric::capacity::{Capacity, DEFAULT_HEIGHTS_FT};
use crate::render::choropleth::FigureSize;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseStudyConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub analysis: AnalysisConfig,
    pub map: MapConfig,
}

/// Where the two input layers live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub dir: PathBuf,
    /// Parcel layer file name, relative to `dir`
    pub parcels: String,
    /// Grain bin layer file name, relative to `dir`
    pub structures: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig {
            dir: PathBuf::from("."),
            parcels: PARCELS_FILE.to_string(),
            structures: STRUCTURES_FILE.to_string(),
        }
    }
}

/// Output directory and file names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub map: String,
    pub parcels_bins: String,
    pub parcels_agri: String,
    pub grainbins: String,
    pub summary: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: get_temp_path(),
            map: MAP_FILE.to_string(),
            parcels_bins: PARCELS_BINS_FILE.to_string(),
            parcels_agri: PARCELS_AGRI_FILE.to_string(),
            grainbins: GRAINBINS_FILE.to_string(),
            summary: SUMMARY_FILE.to_string(),
        }
    }
}

/// Analysis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// EPSG code of both layers, used to tag the GeoJSON output
    pub epsg: i32,
    /// Assumed storage heights in feet
    pub heights: Vec<u32>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            epsg: WGS84_EPSG,
            heights: DEFAULT_HEIGHTS_FT.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Column shading the choropleth
    pub column: String,
    pub figure: FigureSize,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            column: "bushels_54".to_string(),
            figure: FigureSize::default(),
        }
    }
}

impl CaseStudyConfig {
    /// Parse a TOML document and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CaseStudyConfig =
            toml::from_str(content).context("Failed to parse configuration TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {:?}", path))?;
        CaseStudyConfig::from_toml_str(&content)
            .with_context(|| format!("Invalid configuration file: {:?}", path))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).context("Failed to serialize configuration")
    }

    /// Checks:
    /// - at least one height, all positive and distinct
    /// - a finite, positive figure size
    /// - a plotted `volume_<h>`/`bushels_<h>` column names a configured height
    /// - no empty file names
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(CaseStudyError::InvalidConfig(msg).into()) };

        let heights = &self.analysis.heights;
        if heights.is_empty() {
            return invalid("at least one storage height is required".to_string());
        }
        if heights.contains(&0) {
            return invalid("storage heights must be positive".to_string());
        }
        if heights.iter().collect::<BTreeSet<_>>().len() != heights.len() {
            return invalid(format!("storage heights must be distinct, got {:?}", heights));
        }

        let figure = &self.map.figure;
        for (name, value) in [
            ("width_in", figure.width_in),
            ("height_in", figure.height_in),
            ("dpi", figure.dpi),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("figure {} must be positive, got {}", name, value));
            }
        }

        let column = &self.map.column;
        if column.is_empty() {
            return invalid("map column cannot be empty".to_string());
        }
        if (column.starts_with("volume_") || column.starts_with("bushels_"))
            && !Capacity::column_names(heights).contains(column)
        {
            return invalid(format!(
                "map column '{}' does not match any configured height {:?}",
                column, heights
            ));
        }

        for (name, value) in [
            ("input.parcels", &self.input.parcels),
            ("input.structures", &self.input.structures),
            ("output.map", &self.output.map),
            ("output.parcels_bins", &self.output.parcels_bins),
            ("output.parcels_agri", &self.output.parcels_agri),
            ("output.grainbins", &self.output.grainbins),
            ("output.summary", &self.output.summary),
        ] {
            if value.is_empty() {
                return invalid(format!("{} cannot be empty", name));
            }
        }

        Ok(())
    }

    pub fn parcels_path(&self) -> PathBuf {
        self.input.dir.join(&self.input.parcels)
    }

    pub fn structures_path(&self) -> PathBuf {
        self.input.dir.join(&self.input.structures)
    }

    /// `name` inside the output directory
    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output.dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CaseStudyConfig::default();
        assert_eq!(config.analysis.heights, vec![15, 54]);
        assert_eq!(config.map.column, "bushels_54");
        assert_eq!(config.map.figure.pixels(), (1500, 900));
        assert_eq!(config.parcels_path(), PathBuf::from("./parcels_ilmenard.shp"));
        assert_eq!(
            config.output_file(&config.output.map),
            PathBuf::from("./temp/Max_Capacity_Map.png")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = CaseStudyConfig::from_toml_str(
            r#"
            [input]
            dir = "data/menard"

            [analysis]
            heights = [20]

            [map]
            column = "volume_20"
            "#,
        )
        .unwrap();
        assert_eq!(config.input.dir, PathBuf::from("data/menard"));
        assert_eq!(config.input.parcels, PARCELS_FILE);
        assert_eq!(config.analysis.epsg, 4326);
        assert_eq!(config.analysis.heights, vec![20]);
        assert_eq!(config.map.figure, FigureSize::default());
    }

    #[test]
    fn test_round_trip() {
        let config = CaseStudyConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(CaseStudyConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_values() {
        let cases = [
            "[analysis]\nheights = []",
            "[analysis]\nheights = [0, 15]",
            "[analysis]\nheights = [15, 15]",
            "[map]\ncolumn = \"bushels_20\"",
            "[map]\nfigure = { width_in = 0.0, height_in = 9.0, dpi = 100.0 }",
            "[output]\nsummary = \"\"",
        ];
        for case in cases {
            let err = CaseStudyConfig::from_toml_str(case).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<CaseStudyError>(),
                    Some(CaseStudyError::InvalidConfig(_))
                ),
                "{} -> {}",
                case,
                err
            );
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bincap.toml");
        std::fs::write(&path, "[analysis]\nepsg = 3435\n").unwrap();
        let config = CaseStudyConfig::load_from(&path).unwrap();
        assert_eq!(config.analysis.epsg, 3435);

        assert!(CaseStudyConfig::load_from(dir.path().join("missing.toml")).is_err());
    }
}
