//! Aviatrix Terraform Provider
//!
//! Resources for the Aviatrix controller, served over a line-delimited JSON
//! rendition of the Terraform provider protocol.

pub mod config;
pub mod protocol;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod state;

pub use provider::AviatrixProvider;
