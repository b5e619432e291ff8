//! DocxGen Core - Document Template Expansion
//!
//! # Tag language
//! - `{name}` / `{$customer.name}`: variable substitution
//! - `{$name|upper}` / `{upper $name}`: filters, chained with `|`
//! - `{foreach items as item}` ... `{/foreach}`: repeat a block per item
//! - `*literal*` arguments, `\*` for a literal asterisk
//!
//! # Flow
//! 1. Load a template tree (`DocxDocument::open`)
//! 2. `Generator::expand` unrolls loops, then substitutes tags
//! 3. Save the result, optionally convert it, or package a batch (`Batch`)

pub mod archive;
pub mod config;
pub mod context;
pub mod convert;
pub mod document;
pub mod error;
pub mod expression;
pub mod filters;
pub mod generator;
pub mod pipeline;
pub mod tree;
pub mod unroll;

pub use archive::{Batch, BatchError, BatchReport, SkippedItem};
pub use config::{FailurePolicy, GeneratorConfig, StructureNames};
pub use context::Context;
pub use convert::{ConvertError, Converter, SofficeConverter};
pub use document::{DocumentError, DocxDocument, TemplateDocument};
pub use error::ParseError;
pub use expression::{Argument, Expression, Segment};
pub use filters::{Filter, FilterError, FilterRegistry};
pub use generator::{Generator, TagKind, TagReport};
pub use tree::{Node, NodePath};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
