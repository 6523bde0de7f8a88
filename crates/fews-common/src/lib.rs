//! Common types and utilities shared across the FEWS JDBC crates.

pub mod bbox;
pub mod error;
pub mod model;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{FewsError, FewsResult};
pub use model::{Event, FilterNode, Location, Parameter, ValueSeries};
pub use time::{DateRange, DateRangeInput, DateRangeResolver};
