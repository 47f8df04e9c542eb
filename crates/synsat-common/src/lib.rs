//! Common types and utilities shared across the synsat workspace.
//!
//! - [`Field`] / [`Dataset`]: named-dimension arrays, the substrate every
//!   source adapter reads into and the canonical atmospheric state is built on
//! - [`time`]: packed `YYYYMMDD.fraction` timestamps, CF time units, rounding
//! - [`Extent`]: longitude/latitude selection box

pub mod dataset;
pub mod error;
pub mod extent;
pub mod time;

pub use dataset::{Dataset, Field};
pub use error::{CommonError, CommonResult};
pub use extent::Extent;
