//! # knxha-domain
//!
//! Pure domain model for turning a KNX project into a Home Assistant
//! configuration.
//!
//! ## Responsibilities
//! - Foundational types: group addresses, datapoint types, flags, errors
//! - Define the **raw scan records** (addresses, links, devices, ranges)
//! - Define the **Catalog** (devices → channels → com objects → bindings,
//!   address tree, indexes, statistics)
//! - Define the **entities** classification produces, per Home Assistant domain
//! - Define the **parse report**, **progress events** and **snapshot** envelope
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;

pub mod address;
pub mod catalog;
pub mod dpt;
pub mod entity;
pub mod flags;
pub mod progress;
pub mod record;
pub mod report;
pub mod snapshot;
