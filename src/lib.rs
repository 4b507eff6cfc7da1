pub mod args;
pub mod error;
pub mod filter;
pub mod geo;
pub mod loader;
pub mod rank;
pub mod report;
pub mod request;
pub mod stats;
pub mod utils;

pub use args::Args;
pub use error::{ConfigError, LoadError, MalformedLine};
pub use filter::PageFilter;
pub use geo::{GeoIpResolver, GeoResolver, Location, StaticResolver};
pub use loader::{LoadResult, LoaderConfig, LogLoader, ParseErrorPolicy};
pub use rank::{top_locations, top_page, RankedLocation, TopPage};
pub use report::Report;
pub use request::{parse_line, Request};
pub use stats::{AggregationStore, LocationStats, PageStats, RunStats};
