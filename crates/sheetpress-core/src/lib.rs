// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sheetpress: core types, settings, and error definitions shared across all crates.

pub mod bleed;
pub mod config;
pub mod error;
pub mod human_errors;
pub mod types;

pub use bleed::EffectiveBleedSpec;
pub use config::ExportSettings;
pub use error::SheetpressError;
pub use types::*;
