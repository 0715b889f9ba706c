pub mod color_resolver;
pub mod models;
pub mod overlap;
pub mod palette;
pub mod store;
pub mod time_grid;
