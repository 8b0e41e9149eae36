//! Volumetric capacity of cylindrical grain bins.
//!
//! Diameters come in metres, everything downstream is in feet. The bushel
//! estimate applies a fill fraction of 0.85 to the full cylinder, which models
//! a non-peaked, non-stiffened bin. Two storage heights (15 ft and 54 ft) bound
//! the low and high scenarios; heights are scenario parameters, never measured
//! per structure.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Feet per metre
pub const FEET_PER_METER: f64 = 3.28084;
/// Practical fill fraction of a cylindrical bin
pub const BUSHEL_FILL_FACTOR: f64 = 0.85;
/// Default storage height scenarios, in feet
pub const DEFAULT_HEIGHTS_FT: [u32; 2] = [15, 54];

/// Radius in feet from a diameter in metres
pub fn radius_ft(diameter_m: f64) -> f64 {
    (diameter_m * FEET_PER_METER) / 2.0
}

/// Circular footprint area in square feet
pub fn area_sqft(radius_ft: f64) -> f64 {
    PI * radius_ft * radius_ft
}

/// Cylinder volume in cubic feet for a footprint and an assumed height
pub fn volume_cuft(area_sqft: f64, height_ft: u32) -> f64 {
    area_sqft * height_ft as f64
}

/// Estimated bushels held by a given volume
pub fn bushels(volume_cuft: f64) -> f64 {
    volume_cuft * BUSHEL_FILL_FACTOR
}

/// Radius and footprint of one structure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub radius_ft: f64,
    pub area_sqft: f64,
}

impl Footprint {
    pub fn from_diameter(diameter_m: f64) -> Self {
        let radius_ft = radius_ft(diameter_m);
        Footprint {
            radius_ft,
            area_sqft: area_sqft(radius_ft),
        }
    }
}

/// Volume and bushels at one assumed height; always produced together
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightCapacity {
    pub height_ft: u32,
    pub volume_cuft: f64,
    pub bushels: f64,
}

impl HeightCapacity {
    pub fn volume_column(&self) -> String {
        volume_column(self.height_ft)
    }

    pub fn bushels_column(&self) -> String {
        bushels_column(self.height_ft)
    }
}

pub fn volume_column(height_ft: u32) -> String {
    format!("volume_{}", height_ft)
}

pub fn bushels_column(height_ft: u32) -> String {
    format!("bushels_{}", height_ft)
}

/// Capacity figures for a summed footprint area under every height scenario.
/// The area is summed first and multiplied by height afterwards, so each
/// volume/bushel pair stays consistent with the area it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capacity {
    pub area_sqft: f64,
    pub scenarios: Vec<HeightCapacity>,
}

impl Capacity {
    pub fn from_area(area_sqft: f64, heights_ft: &[u32]) -> Self {
        let scenarios = heights_ft
            .iter()
            .map(|&height_ft| {
                let volume_cuft = volume_cuft(area_sqft, height_ft);
                HeightCapacity {
                    height_ft,
                    volume_cuft,
                    bushels: bushels(volume_cuft),
                }
            })
            .collect();
        Capacity {
            area_sqft,
            scenarios,
        }
    }

    pub fn at_height(&self, height_ft: u32) -> Option<&HeightCapacity> {
        self.scenarios.iter().find(|s| s.height_ft == height_ft)
    }

    /// Look up `volume_<h>` / `bushels_<h>` by column name
    pub fn column(&self, name: &str) -> Option<f64> {
        if let Some(h) = name.strip_prefix("volume_") {
            let h: u32 = h.parse().ok()?;
            return self.at_height(h).map(|s| s.volume_cuft);
        }
        if let Some(h) = name.strip_prefix("bushels_") {
            let h: u32 = h.parse().ok()?;
            return self.at_height(h).map(|s| s.bushels);
        }
        None
    }

    /// Column names in output order: every volume, then every bushel figure
    pub fn column_names(heights_ft: &[u32]) -> Vec<String> {
        heights_ft
            .iter()
            .map(|&h| volume_column(h))
            .chain(heights_ft.iter().map(|&h| bushels_column(h)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn test_radius_and_area() {
        let fp = Footprint::from_diameter(10.0);
        assert!(close(fp.radius_ft, 16.4042));
        assert!(close(fp.area_sqft, PI * 16.4042 * 16.4042));
    }

    #[test]
    fn test_bushels_for_ten_meter_bin() {
        let fp = Footprint::from_diameter(10.0);
        let cap = Capacity::from_area(fp.area_sqft, &DEFAULT_HEIGHTS_FT);

        let expected_15 = PI * (10.0 * 3.28084 / 2.0_f64).powi(2) * 15.0 * 0.85;
        let expected_54 = PI * (10.0 * 3.28084 / 2.0_f64).powi(2) * 54.0 * 0.85;
        assert!(close(cap.at_height(15).unwrap().bushels, expected_15));
        assert!(close(cap.at_height(54).unwrap().bushels, expected_54));
        // 845.3956 sq ft footprint
        assert!((expected_15 - 10778.794).abs() < 1e-3);
        assert!((expected_54 - 38803.658).abs() < 1e-3);
    }

    #[test]
    fn test_volume_and_bushels_are_paired() {
        let cap = Capacity::from_area(100.0, &[15, 54]);
        assert_eq!(cap.scenarios.len(), 2);
        for s in &cap.scenarios {
            assert_eq!(s.volume_cuft, 100.0 * s.height_ft as f64);
            assert_eq!(s.bushels, s.volume_cuft * 0.85);
        }
    }

    #[test]
    fn test_column_lookup() {
        let cap = Capacity::from_area(10.0, &[15, 54]);
        assert_eq!(cap.column("volume_15"), Some(150.0));
        assert_eq!(cap.column("bushels_54"), Some(540.0 * 0.85));
        assert_eq!(cap.column("bushels_20"), None);
        assert_eq!(cap.column("area"), None);
        assert_eq!(
            Capacity::column_names(&[15, 54]),
            vec!["volume_15", "volume_54", "bushels_15", "bushels_54"]
        );
    }
}
