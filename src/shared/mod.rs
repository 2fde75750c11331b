pub mod migration;
pub mod models;
pub mod state;
pub mod utils;
