pub use errors::*;
pub use model::*;
pub use options::*;
pub use registry::*;
pub use service::*;

pub use vitals_metrics::{
    Counter, Gauge, Histogram, Measurement, MeasurementSource, Meter,
};

mod errors;
mod model;
mod options;
mod registry;
mod service;
