//! # knxha-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `ProjectSource` — scan a project archive into raw records
//!   - `ProgressSink` — receive import progress events
//! - Assemble raw scan records into a **Catalog** plus a parse report
//! - Classify a catalog into Home Assistant entities through an ordered list
//!   of aggregation **strategies**, folded by the **router**
//! - Orchestrate a whole import in `ImportService`
//!
//! ## Dependency rule
//! Depends on `knxha-domain` only.
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod assembler;
pub mod classify;
pub mod ports;
pub mod router;
pub mod services;
