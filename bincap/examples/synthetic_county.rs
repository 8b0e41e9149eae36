use anyhow::Result;
use bincap::collect::layer::{Layer, LayerFeature};
use bincap::geo_core::GeoCore;
use bincap::geometric::capacity::{Capacity, Footprint, DEFAULT_HEIGHTS_FT};
use bincap::geometric::ownership::muni_flag;
use geo::{point, polygon, Geometry};
use serde_json::json;

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Grain bin capacity usage example ===\n");

    // Example 1: Ownership heuristic
    println!("1. Classifying owner names:");
    example_ownership();

    // Example 2: Capacity of a single bin
    println!("\n2. Capacity of a 10 m bin:");
    example_capacity();

    // Example 3: Whole analysis on an in-memory county
    println!("\n3. Analysing a synthetic county:");
    example_analysis()?;

    Ok(())
}

/// Example 1: municipal or private
fn example_ownership() {
    for owner in [
        "CITY OF SPRINGFIELD",
        "JOHN SMITH",
        "COUNTY ROAD DEPT",
        "CITY FARMS LLC",
    ] {
        println!("  - {:<22} muni = {}", owner, muni_flag(owner));
    }
}

/// Example 2: radius, area, volume and bushels
fn example_capacity() {
    let footprint = Footprint::from_diameter(10.0);
    println!("  - Radius: {:.2} ft", footprint.radius_ft);
    println!("  - Area: {:.2} sq ft", footprint.area_sqft);
    let capacity = Capacity::from_area(footprint.area_sqft, &DEFAULT_HEIGHTS_FT);
    for s in &capacity.scenarios {
        println!(
            "  - At {} ft: {:.0} cu ft, {:.0} bushels",
            s.height_ft, s.volume_cuft, s.bushels
        );
    }
}

fn feature(index: usize, geometry: Geometry<f64>, properties: serde_json::Value) -> LayerFeature {
    let properties = properties.as_object().cloned().unwrap_or_default();
    LayerFeature::new(index, geometry, properties)
}

/// Example 3: every stage, nothing written to disk
fn example_analysis() -> Result<()> {
    let farm = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0)];
    let town = polygon![(x: 10.0, y: 0.0), (x: 20.0, y: 0.0), (x: 20.0, y: 10.0), (x: 10.0, y: 10.0), (x: 10.0, y: 0.0)];

    let parcels = Layer::new(
        "parcels",
        vec![
            feature(0, farm.into(), json!({ "OWNER": "JOHN SMITH", "FARM_ACRES": 40 })),
            feature(1, town.into(), json!({ "OWNER": "CITY OF PETERSBURG", "FARM_ACRES": 0 })),
        ],
    );
    let structures = Layer::new(
        "structures",
        vec![
            feature(0, point!(x: 3.0, y: 3.0).into(), json!({ "DIAMETER": 10 })),
            feature(1, point!(x: 7.0, y: 7.0).into(), json!({ "DIAMETER": 8 })),
            feature(2, point!(x: 15.0, y: 5.0).into(), json!({ "DIAMETER": 12 })),
        ],
    );

    let result = bincap::analyze(&parcels, &structures, &DEFAULT_HEIGHTS_FT, &GeoCore::default())?;
    println!(
        "  - Bins kept after the municipal filter: {} of {}",
        result.grain_bins.len(),
        result.structures_read
    );
    println!("  - Owner polygons: {}", result.owner_polygons.len());
    for total in result.totals() {
        println!("  - County total at {} ft: {:.0} bushels", total.height_ft, total.bushels);
    }
    println!("\n{}", result.join.to_polars_df()?);

    Ok(())
}
