//! # KPI Test Utilities
//!
//! Shared test utilities for the KPI metrics library.
//!
//! This crate provides:
//! - KPI catalog fixtures (JSON sources, on-disk catalog files)
//! - A context builder that loads and registers a catalog in one step
//! - Custom assertions (`StatusAssertions`, `ExpositionAssertions`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kpi_test_utils::*;
//!
//! #[test]
//! fn test_example() {
//!     let ctx = TestContextBuilder::new().namespace("testns").build();
//!     ctx.increment(AMF_SUBSCRIBERS, &amf_labels()).unwrap();
//!
//!     ctx.render_text()
//!         .unwrap()
//!         .assert_has_series("testns_mean_registered_subscribers_amf", 1.0);
//! }
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;

// Re-export commonly used items
pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
