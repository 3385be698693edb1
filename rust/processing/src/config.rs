// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline configuration loaded from environment variables.

use std::path::PathBuf;

use crate::writer::WriterOptions;

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Shared parts directory scanned next to a `.pc` (default: sibling `common/`).
    pub common_dir: Option<PathBuf>,
    /// Decimal places for element-row floats when writing. `None` (the
    /// default) writes them exactly.
    pub float_precision: Option<usize>,
    /// Spaces per nesting level when writing.
    pub indent: usize,
    /// Parse discovered `.jbeam` files on the rayon pool.
    pub parallel_load: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            common_dir: std::env::var("JBEAM_COMMON_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            float_precision: std::env::var("JBEAM_FLOAT_PRECISION")
                .ok()
                .and_then(|v| v.trim().parse().ok()),
            indent: std::env::var("JBEAM_INDENT")
                .unwrap_or_else(|_| "2".into())
                .parse()
                .unwrap_or(2),
            parallel_load: std::env::var("JBEAM_PARALLEL_LOAD")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
        }
    }

    /// Writer settings derived from this configuration.
    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            indent: self.indent,
            float_precision: self.float_precision,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
