//! # ronin-compiler
//!
//! Compiles RONIN's JSON query language into parameterised SQLite statements
//! and reshapes the driver's rows back into nested records.
//!
//! ## Pipeline
//!
//! - [`query`] parses the wire JSON into [`query::Query`].
//! - [`model`] holds the model/field/index/trigger/preset schema and its
//!   defaulting rules.
//! - [`instructions`] compiles each instruction (`with`, `to`, `including`,
//!   `orderedBy`, `before`/`after`, `limitedTo`, `using`) into an SQL
//!   fragment.
//! - [`ddl`] lowers `create`/`alter`/`drop` meta-queries into DML against the
//!   root model plus dependency statements.
//! - [`compose`] orchestrates the above into one [`compose::Statement`] per
//!   query.
//! - [`transaction`] runs a whole query batch, threading a single mutable
//!   model list through it, and [`reshape`] turns the driver's rows back
//!   into records, folding joins and attaching pagination cursors built by
//!   [`pagination`].
//!
//! [`case`], [`clock`], [`flatten`], [`ident`], [`idgen`], and [`symbol`] are
//! the shared utilities the pipeline above is built from.

pub mod case;
pub mod clock;
pub mod compose;
pub mod ddl;
pub mod error;
pub mod flatten;
pub mod ident;
pub mod idgen;
pub mod instructions;
pub mod model;
pub mod pagination;
pub mod query;
pub mod reshape;
pub mod symbol;
pub mod transaction;
pub mod value;

pub use clock::ClockSource;
pub use compose::{CompiledQuery, Statement, TransactionOptions};
pub use error::{CompileError, CompileResult};
pub use query::{Query, QueryKind};
pub use reshape::format_results;
pub use transaction::Transaction;
pub use value::Value;
