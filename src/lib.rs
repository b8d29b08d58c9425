pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod notify;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod prepare;
pub mod record;
pub mod store;

pub use error::{PipelineError, Result};
pub use normalize::normalize;
pub use prepare::{Prepared, Selection, prepare};
pub use record::{Measurement, WeatherRecord, WeatherSeries};
