// Copyright (c) 2024-2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::path::Path;

/// Opens (or creates) the log file at `path`. The file never rotates.
///
/// Note that if you wrap this up in a non blocking writer, events logged right before
/// the process exits can be lost.
///
/// # Errors
///
/// Returns an error if the path has no parent directory or no file name.
pub fn try_create(path: &Path) -> miette::Result<tracing_appender::rolling::RollingFileAppender> {
    let parent = match path.parent() {
        Some(it) if it.as_os_str().is_empty() => Path::new("."),
        Some(it) => it,
        None => {
            return Err(miette::miette!(
                "Can't use {} as a log file: it has no parent folder",
                path.display()
            ));
        }
    };

    let file_name = path.file_name().ok_or_else(|| {
        miette::miette!("Can't use {} as a log file: it has no file name", path.display())
    })?;

    Ok(tracing_appender::rolling::never(parent, file_name))
}
