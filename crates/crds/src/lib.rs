//! Fleet Importer CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the fleet importer.

pub mod fleet_agent;
pub mod managed_cluster_intent;

pub use fleet_agent::*;
pub use managed_cluster_intent::*;
