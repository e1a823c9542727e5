//! Switch Visual Studio solution references between NuGet packages and
//! local projects, and keep the solution consistent.
//!
//! A solution that consumes a library as a package can temporarily reference
//! that library's source instead: [`engine`] swaps the package reference for a
//! project reference, registers the project in the `.sln`, and remembers
//! enough to undo the swap byte for byte later.
//!
//! # Architecture
//!
//! ## Documents
//!
//! - [`solution`]: Parse, edit and write `.sln` files, preserving layout
//! - [`project`]: MSBuild project files on top of `xml-doc-core`
//! - [`packages`]: `packages.config` manifests
//! - [`storage`]: Reads, atomic writes and deletes with path-carrying errors
//!
//! ## Conversion
//!
//! - [`scanner`]: Discover candidate projects under a folder
//! - [`graph`]: Project reference graph and cycle checks
//! - [`engine`]: to-project, to-package and dry-run planning
//!
//! ## Maintenance
//!
//! - [`consistency`]: Dangling references, orphan entries, undeclared files
//! - [`inspect`]: Hierarchy and by-type views
//!
//! ## Plumbing
//!
//! - [`config`]: `refswitch.toml` loading with defaults
//! - [`operation`]: The operation dispatcher the CLI drives
//! - [`report`]: Terminal rendering of operation outcomes
//! - [`issues`]: Coded warnings and errors carried in reports
//! - [`paths`]: Windows-style relative path handling
//!
//! # Examples
//!
//! ```ignore
//! use refswitch::config::Config;
//! use refswitch::operation::{run, Operation};
//!
//! let outcome = run(
//!     "Legacy.sln".as_ref(),
//!     &Operation::ToProject { folder: "../mixin".into() },
//!     &Config::default(),
//! )?;
//! assert!(!outcome.has_failures());
//! ```

pub mod config;
pub mod consistency;
pub mod engine;
pub mod graph;
pub mod inspect;
pub mod issues;
pub mod operation;
pub mod packages;
pub mod paths;
pub mod project;
pub mod report;
pub mod scanner;
pub mod solution;
pub mod storage;

#[cfg(test)]
mod test_support;
