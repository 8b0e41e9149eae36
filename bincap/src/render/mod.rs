pub mod choropleth;
pub mod color;
