//! Dynamic-controllability checking for conditional temporal networks.
//!
//! `dycop_core` decides whether a Conditional Simple Temporal Network
//! (CSTN), optionally with contingent links (CSTNU), admits a dynamic
//! execution strategy: one that satisfies every constraint no matter how
//! observations and uncertain durations turn out at run time.
//!
//! The decision procedure is a constraint-rewriting fixpoint. Each edge
//! carries a self-minimizing map from propositional labels (scenarios) to
//! distance bounds; the engine repeatedly applies the propagation rules --
//! R0 and R3 for observation reasoning, labeled-value propagation for path
//! composition, and the Morris upper/lower-case rules for contingent links
//! -- until nothing changes (controllable) or a negative self-loop appears
//! (not controllable).
//!
//! # Entry point
//!
//! Build a [`TemporalNetwork`](graph::TemporalNetwork), then call
//! [`check()`], which rewrites the network in place and returns a
//! [`CheckStatus`](controllability::CheckStatus) with the verdict, the
//! rule-firing counters, and the elapsed time.
//!
//! ```rust,ignore
//! use dycop_core::{check, CheckOptions};
//!
//! let status = check(&mut network, &CheckOptions::default())?;
//! match status.controllable() {
//!     Some(true) => println!("controllable in {:?}", status.elapsed),
//!     Some(false) => println!("negative loop: {:?}", status.negative_loop),
//!     None => println!("budget exhausted after {} iterations", status.iterations),
//! }
//! ```
//!
//! # Crate features
//!
//! - **`serde`** -- `Serialize`/`Deserialize` on labels, statuses, and the
//!   [`graph::data`] instance format exchanged with the CLI and generator.
//! - **`schemars`** -- JSON Schema derivation for the instance format.

pub mod controllability;
pub mod graph;
pub mod heap;
pub mod label;

pub use controllability::{check, CheckOptions, CheckState, CheckStatus};
pub use graph::TemporalNetwork;
pub use label::Label;
