// Copyright (c) 2024-2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::path::PathBuf;
use tracing_core::LevelFilter;

pub const DEFAULT_LOG_FILE: &str = "r3bl_reactor.log";

/// Where log lines go, and the level used when `RUST_LOG` is not set.
///
/// Pass it to [`try_initialize_logging()`](crate::try_initialize_logging).
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub writer_config: WriterConfig,
    pub level_filter: LevelFilter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterConfig {
    None,
    Display(DisplayPreference),
    File(PathBuf),
    DisplayAndFile(DisplayPreference, PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPreference {
    Stdout,
    Stderr,
}

impl TracingConfig {
    pub fn new_display(preferred_display: DisplayPreference) -> Self {
        Self {
            writer_config: WriterConfig::Display(preferred_display),
            level_filter: LevelFilter::INFO,
        }
    }

    /// Logs to `filename`, or [`DEFAULT_LOG_FILE`] in the current folder.
    pub fn new_file(filename: Option<PathBuf>) -> Self {
        Self {
            writer_config: WriterConfig::File(
                filename.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            ),
            level_filter: LevelFilter::DEBUG,
        }
    }

    pub fn new_file_and_display(
        filename: Option<PathBuf>,
        preferred_display: DisplayPreference,
    ) -> Self {
        Self {
            writer_config: WriterConfig::DisplayAndFile(
                preferred_display,
                filename.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            ),
            level_filter: LevelFilter::DEBUG,
        }
    }

    #[must_use]
    pub fn with_level_filter(mut self, level_filter: LevelFilter) -> Self {
        self.level_filter = level_filter;
        self
    }
}
