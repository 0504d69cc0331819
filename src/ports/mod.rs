//! Port traits at the collaborator seams.

pub mod config_port;
pub mod data_port;
pub mod engine_port;
pub mod results_port;
