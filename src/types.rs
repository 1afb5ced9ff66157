//! Common types used throughout jobads-etl
//!
//! Small enums shared across modules.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Write Disposition
// ============================================================================

/// How a pipeline run writes into its destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    /// Append new records to the table
    #[default]
    Append,
    /// Delete existing rows before writing the new load
    Replace,
}

impl fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => write!(f, "append"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

// ============================================================================
// Load Status
// ============================================================================

/// Outcome recorded in the load ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    /// All records were committed
    Loaded,
    /// The run aborted and its records were rolled back
    Failed,
}

impl LoadStatus {
    /// Ledger string for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
