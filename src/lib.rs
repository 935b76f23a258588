//! tabform: typed validator and reformatter for TSV data packages
//!
//! This library ingests tab-separated data organized as packages, checks
//! every cell against its declared column type, rewrites each file in a
//! canonical form, and exports the typed dataset in several formats. The
//! core is the type registry: a type-specification language, a parser
//! factory compiling each spec into a cell parser and comparator, and a
//! strict subtyping relation used for record inheritance and type tags.

pub mod config;
pub mod export;
pub mod exploded;
pub mod join;
pub mod literal;
pub mod manifest;
pub mod pipeline;
pub mod predicates;
pub mod registry;
pub mod report;
pub mod serialize;
pub mod spec;
pub mod tsv;
pub mod validator;
pub mod value;

// Re-export commonly used types
pub use config::Config;
pub use pipeline::{Pipeline, PipelineOptions, PipelineResult};
pub use registry::{ParseContext, ParserEntry, Registry, TypeSpecRow};
pub use report::{BadVal, Severity};
pub use value::{Table, Value};
