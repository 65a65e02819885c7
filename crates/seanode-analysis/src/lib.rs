//! # Seanode Analysis
//!
//! Reports over a [`seanode_core::session::Session`] and verification of
//! its type lattice.
//!
//! ## Modules
//!
//! - **[`metrics`]** - Node, liveness, call-edge and intern-table counts
//! - **[`callgraph`]** - Functions and call sites as a petgraph graph
//! - **[`verify`]** - Lattice laws checked on QuickCheck-generated types
//!
//! ## Quick Start
//!
//! ```rust
//! use seanode_analysis::prelude::*;
//! use seanode_core::prelude::*;
//!
//! let mut s = Session::new();
//! s.gcp().unwrap();
//!
//! let metrics = MetricsCollector::new().collect(&s).unwrap();
//! assert_eq!(metrics.mode, "opto");
//!
//! let results = LatticeVerifier::new().with_samples(10).verify_all();
//! assert!(results.iter().all(|r| r.holds()));
//! ```

pub mod callgraph;
pub mod metrics;
pub mod verify;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::callgraph::{enclosing_fun, CallGraph, CallGraphNode};
    pub use crate::metrics::{CallMetrics, GraphMetrics, InternMetrics, MetricsCollector};
    pub use crate::verify::{LatticeVerifier, PropertyStatus, TypeCtx, TypeSpec, VerificationResult};
}

pub use callgraph::CallGraph;
pub use metrics::{GraphMetrics, MetricsCollector};
pub use verify::{LatticeVerifier, PropertyStatus, VerificationResult};
