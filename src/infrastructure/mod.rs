pub mod arcgis;
pub mod config;
pub mod memory;
