// Copyright (c) 2024-2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::{DisplayPreference, TracingConfig, WriterConfig, rolling_file_appender_impl};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, registry::LookupSpan,
                         util::SubscriberInitExt};

/// Type alias for a boxed layer.
pub type DynLayer<S> = dyn Layer<S> + Send + Sync + 'static;

/// Avoid gnarly type annotations by using a macro to create the `fmt` layer. Thread
/// names are on, so lines from the dispatcher thread (`r3bl-reactor-gen-N`) stand out.
macro_rules! create_fmt {
    () => {
        tracing_subscriber::fmt::layer()
            .with_thread_names(true)
            .with_target(false)
    };
}

/// Installs a global subscriber built from `tracing_config`. `RUST_LOG`, when set,
/// overrides the configured level.
///
/// Returns `Ok(false)` for [`WriterConfig::None`], without installing anything.
///
/// # Errors
///
/// Fails if the log file cannot be opened or if a global subscriber is already set.
pub fn try_initialize_logging(tracing_config: TracingConfig) -> miette::Result<bool> {
    let Some(layers) = try_create_layers(tracing_config)? else {
        return Ok(false);
    };
    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| miette::miette!("failed to install tracing subscriber: {e}"))?;
    Ok(true)
}

/// Returns the layers. This does not initialize the tracing system; see
/// [`try_initialize_logging()`] for that.
///
/// The first layer is the [`EnvFilter`], which applies to every layer after it.
///
/// # Errors
///
/// Fails if the log file cannot be opened.
pub fn try_create_layers(
    tracing_config: TracingConfig,
) -> miette::Result<Option<Vec<Box<DynLayer<tracing_subscriber::Registry>>>>> {
    if tracing_config.writer_config == WriterConfig::None {
        return Ok(None);
    }

    let mut return_it: Vec<Box<DynLayer<tracing_subscriber::Registry>>> = vec![];

    return_it.push(Box::new(
        EnvFilter::builder()
            .with_default_directive(tracing_config.level_filter.into())
            .from_env_lossy(),
    ));

    if let Some(layer) = try_create_display_layer(&tracing_config.writer_config) {
        return_it.push(layer);
    }

    if let Some(layer) = try_create_file_layer(&tracing_config.writer_config)? {
        return_it.push(layer);
    }

    Ok(Some(return_it))
}

pub fn try_create_display_layer<S>(writer_config: &WriterConfig) -> Option<Box<DynLayer<S>>>
where
    S: tracing_core::Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let fmt_layer = create_fmt!();
    match writer_config {
        WriterConfig::Display(display_pref) | WriterConfig::DisplayAndFile(display_pref, _) => {
            let layer: Box<DynLayer<S>> = match display_pref {
                DisplayPreference::Stdout => Box::new(fmt_layer.with_writer(std::io::stdout)),
                DisplayPreference::Stderr => Box::new(fmt_layer.with_writer(std::io::stderr)),
            };
            Some(layer)
        }
        _ => None,
    }
}

/// # Errors
///
/// Fails if the log file cannot be opened.
pub fn try_create_file_layer<S>(
    writer_config: &WriterConfig,
) -> miette::Result<Option<Box<DynLayer<S>>>>
where
    S: tracing_core::Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    Ok(match writer_config {
        WriterConfig::File(path) | WriterConfig::DisplayAndFile(_, path) => {
            let file = rolling_file_appender_impl::try_create(path)?;
            Some(Box::new(create_fmt!().with_ansi(false).with_writer(file)))
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tracing_core::LevelFilter;

    fn temp_log_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("r3bl_reactor_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn test_no_writer_no_layers() {
        let config = TracingConfig {
            writer_config: WriterConfig::None,
            level_filter: LevelFilter::DEBUG,
        };
        assert!(try_create_layers(config).unwrap().is_none());
    }

    #[test]
    fn test_display_layers() {
        let config = TracingConfig::new_display(DisplayPreference::Stderr);
        let layers = try_create_layers(config).unwrap().unwrap();
        assert_eq!(layers.len(), 2);
    }

    #[test]
    fn test_file_and_display_layers() {
        let path = temp_log_file("file_and_display.log");
        let config = TracingConfig::new_file_and_display(
            Some(path.clone()),
            DisplayPreference::Stdout,
        )
        .with_level_filter(LevelFilter::TRACE);
        let layers = try_create_layers(config).unwrap().unwrap();
        assert_eq!(layers.len(), 3);
        assert!(path.exists());
    }

    #[test]
    fn test_file_without_name_is_rejected() {
        let result = rolling_file_appender_impl::try_create(std::path::Path::new("/"));
        assert!(result.is_err());
    }
}
