//! Slot availability
//!
//! Derives bookable slots from a fixed daily catalog and the intervals
//! already held by blocking sessions:
//! - `SlotCatalog`: canonical wall-clock start times plus slot duration
//! - `AvailabilityEngine`: per-day and multi-day availability, conflict lookup

mod availability;
mod catalog;

pub use availability::{AvailabilityEngine, DayAvailability, SlotAvailability, Unavailable};
pub use catalog::{CatalogTime, SlotCatalog};
