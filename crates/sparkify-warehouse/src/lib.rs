//! Execution of the query catalog
//!
//! This crate provides the [`Warehouse`] trait that runs catalog statements,
//! the [`EtlPipeline`] driver that sequences them, and [`MemoryWarehouse`],
//! an in-memory warehouse with the Redshift behaviour the catalog relies on.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sparkify_sql::QueryCatalog;
//! use sparkify_warehouse::{EtlPipeline, MemoryWarehouse, RunMode};
//!
//! let warehouse = MemoryWarehouse::new();
//! let pipeline = EtlPipeline::new(QueryCatalog::build(&config));
//! let report = pipeline.run(&warehouse, RunMode::Full).await?;
//! ```

pub mod adapter;
pub mod calendar;
pub mod eval;
pub mod loader;
pub mod memory;
pub mod pipeline;
pub mod value;

pub use adapter::{ExecError, ExecOutcome, Warehouse};
pub use loader::{JsonPaths, ObjectStore};
pub use memory::MemoryWarehouse;
pub use pipeline::{EtlPipeline, PipelineError, RunMode, RunReport, StepReport};
pub use value::{Row, Value};
