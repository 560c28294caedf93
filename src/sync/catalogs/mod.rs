pub use landsat::LandsatScenes;

mod landsat;
