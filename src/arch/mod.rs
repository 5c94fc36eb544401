//! CPU models from `mapfile.csv` and per-model metric sources.

pub mod cstate;
pub mod mapfile;
pub mod model;

pub use cstate::cstate_metrics;
pub use mapfile::{names_from_path, parse_mapfile};
pub use model::Model;
