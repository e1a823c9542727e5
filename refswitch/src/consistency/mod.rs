//! Reference and file hygiene for a loaded solution.
//!
//! Both checks report first. Repairs ([`ConsistencyScanner::cleanup_references`]
//! and [`ConsistencyScanner::clean_files`]) act only on what a scan in the
//! same invocation found.

mod files;
mod references;

pub use files::{CleanFilesReport, FileScanReport, OrphanFile, SkippedProject};
pub use references::{
    CleanupReport, DanglingReason, DanglingReference, MissingMapping, OrphanEntry, OrphanReason,
    ReferenceReport,
};

use crate::config::Config;

/// Hygiene checks driven by an explicit configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConsistencyScanner<'a> {
    config: &'a Config,
}

impl<'a> ConsistencyScanner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }
}
