//! Evaluation results explorer.
//!
//! Turns bucketed evaluation results into chart series and drives the
//! drill-down from a chart bar to the examples behind it.

pub mod client;
pub mod config;
pub mod error;
pub mod explorer;
pub mod fetcher;
pub mod logging;
pub mod results;
pub mod selection;
pub mod table;

pub use client::{DataProvider, ExampleRecord, HttpProvider, OutputRecord, OutputsPage};
pub use config::Config;
pub use error::{ExplorerError, FetchError};
pub use explorer::{ChartProps, ResultsExplorer, TableProps};
pub use results::{ComparisonReport, SampleId};
pub use selection::{Phase, Selection, SelectionEvent, SelectionState, Transition};
