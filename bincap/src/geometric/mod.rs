pub mod capacity;
pub mod grain_bin;
pub mod owner_polygon;
pub mod ownership;
pub mod parcel;
pub mod parcel_bins;
pub mod spatial_join;
