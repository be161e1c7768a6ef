//! Pipeline assembly from a [`LoggingConfig`] and the process-wide default
//!
//! [`LoggingPipeline`] is an explicit value: build it, hand out loggers,
//! shut it down (or drop it). For programs that want one shared pipeline,
//! [`setup`], [`get_logger`] and [`shutdown`] manage a single global
//! instance.

use crate::config::LoggingConfig;
use crate::core::{
    stderr_fallback, FallbackHandler, Logger, LoggerError, PipelineMetrics, Result, Sink,
    ROOT_LOGGER,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

/// Every sink, filter, formatter and listener described by one configuration
///
/// # Example
///
/// ```
/// use rust_json_logger::config::LoggingConfig;
/// use rust_json_logger::pipeline::LoggingPipeline;
///
/// let config = LoggingConfig::from_json_str(r#"{
///     "sinks": [{ "name": "stderr", "medium": { "type": "stderr" }, "level": "ERROR" }],
///     "queues": [{ "name": "main", "sinks": ["stderr"] }]
/// }"#)?;
///
/// let pipeline = LoggingPipeline::from_config(&config)?;
/// let logger = pipeline.logger("app");
/// logger.info("below the sink threshold");
/// pipeline.shutdown()?;
/// # Ok::<(), rust_json_logger::LoggerError>(())
/// ```
pub struct LoggingPipeline {
    root: Logger,
    shutdown_timeout: Duration,
}

impl LoggingPipeline {
    /// Validate, build and start; diagnostics go to stderr
    pub fn from_config(config: &LoggingConfig) -> Result<Self> {
        Self::from_config_with_fallback(config, stderr_fallback())
    }

    /// Like [`LoggingPipeline::from_config`] with a custom fallback channel
    pub fn from_config_with_fallback(config: &LoggingConfig, fallback: FallbackHandler) -> Result<Self> {
        config.validate()?;

        let formatters: HashMap<&str, _> = config
            .formatters
            .iter()
            .map(|(name, f)| (name.as_str(), f.build()))
            .collect();
        let filters: HashMap<&str, _> = config
            .filters
            .iter()
            .map(|(name, f)| (name.as_str(), f.build()))
            .collect();

        let mut sinks: HashMap<&str, Sink> = HashMap::with_capacity(config.sinks.len());
        for sink_config in &config.sinks {
            let appender = sink_config.medium.open()?;
            let mut sink = Sink::from_boxed(sink_config.name.clone(), appender).with_level(sink_config.level);
            if let Some(name) = &sink_config.formatter {
                let formatter = formatters
                    .get(name.as_str())
                    .ok_or_else(|| unknown(&sink_config.name, "formatter", name))?;
                sink = sink.with_formatter(formatter.clone());
            }
            for name in &sink_config.filters {
                let filter = filters
                    .get(name.as_str())
                    .ok_or_else(|| unknown(&sink_config.name, "filter", name))?;
                sink = sink.with_shared_filter(Arc::clone(filter));
            }
            sinks.insert(sink_config.name.as_str(), sink);
        }

        let mut builder = Logger::builder()
            .name(ROOT_LOGGER)
            .min_level(config.level)
            .fallback(fallback)
            .shutdown_timeout(config.shutdown_timeout());

        let mut queued = Vec::with_capacity(config.queues.len());
        for queue in &config.queues {
            let members: Vec<Sink> = queue
                .sinks
                .iter()
                .filter_map(|name| sinks.remove(name.as_str()))
                .collect();
            queued.push((queue.settings(), members));
        }
        // Remaining sinks are written on the producer's thread, in config order
        for sink_config in &config.sinks {
            if let Some(sink) = sinks.remove(sink_config.name.as_str()) {
                builder = builder.sink(sink);
            }
        }
        for (settings, members) in queued {
            builder = builder.queue(settings, members);
        }

        Ok(Self {
            root: builder.build()?,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Handle for the named logger; all handles share this pipeline
    pub fn logger(&self, name: impl Into<String>) -> Logger {
        self.root.named(name)
    }

    pub fn root(&self) -> &Logger {
        &self.root
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        self.root.metrics()
    }

    /// Stop every listener after draining its queue
    ///
    /// Idempotent. Loggers handed out earlier keep working for direct sinks;
    /// records for queued sinks are rejected and reported.
    pub fn shutdown(&self) -> Result<()> {
        self.root.shutdown(self.shutdown_timeout)
    }
}

fn unknown(sink: &str, kind: &str, name: &str) -> LoggerError {
    LoggerError::config(format!("sink '{}'", sink), format!("unknown {} '{}'", kind, name))
}

impl Drop for LoggingPipeline {
    fn drop(&mut self) {
        // Failures were already reported on the fallback channel
        let _ = self.shutdown();
    }
}

/// The installed pipeline and the number of live guards for it
struct Installed {
    pipeline: Arc<LoggingPipeline>,
    guards: usize,
}

static GLOBAL: RwLock<Option<Installed>> = parking_lot::const_rwlock(None);

static LAST_RESORT: OnceLock<Logger> = OnceLock::new();

/// Keeps the global pipeline installed
///
/// The pipeline shuts down when the last guard handed out for it drops.
/// A guard outliving an explicit [`shutdown`] does nothing, even if a new
/// pipeline was set up since.
#[must_use = "dropping the last guard shuts the global pipeline down"]
#[derive(Debug)]
pub struct GlobalGuard {
    pipeline: Weak<LoggingPipeline>,
}

impl Drop for GlobalGuard {
    fn drop(&mut self) {
        let pipeline = {
            let mut global = GLOBAL.write();
            let last = match global.as_mut() {
                Some(installed) if self.pipeline.as_ptr() == Arc::as_ptr(&installed.pipeline) => {
                    installed.guards -= 1;
                    installed.guards == 0
                }
                _ => false,
            };
            if last {
                global.take().map(|installed| installed.pipeline)
            } else {
                None
            }
        };
        if let Some(pipeline) = pipeline {
            // Failures were already reported on the fallback channel
            let _ = pipeline.shutdown();
        }
    }
}

/// Configure the process-wide pipeline
///
/// Idempotent: once a pipeline is installed, later calls leave the existing
/// configuration in place and return another guard for it. The pipeline
/// shuts down when the last guard drops or on an explicit [`shutdown`].
///
/// ```no_run
/// use rust_json_logger::config::LoggingConfig;
/// use rust_json_logger::pipeline;
///
/// let config = LoggingConfig::load_from_file("logging.json")?;
/// let _guard = pipeline::setup(&config)?;
///
/// pipeline::get_logger("app").info("Started application");
/// # Ok::<(), rust_json_logger::LoggerError>(())
/// ```
pub fn setup(config: &LoggingConfig) -> Result<GlobalGuard> {
    let mut global = GLOBAL.write();
    let mut installed = match global.take() {
        Some(installed) => installed,
        None => Installed {
            pipeline: Arc::new(LoggingPipeline::from_config(config)?),
            guards: 0,
        },
    };
    installed.guards += 1;
    let guard = GlobalGuard {
        pipeline: Arc::downgrade(&installed.pipeline),
    };
    *global = Some(installed);
    Ok(guard)
}

/// Logger from the global pipeline
///
/// Before [`setup`] (or after [`shutdown`]) this returns a logger that only
/// writes WARNING and above to stderr.
pub fn get_logger(name: impl Into<String>) -> Logger {
    match GLOBAL.read().as_ref() {
        Some(installed) => installed.pipeline.logger(name),
        None => LAST_RESORT.get_or_init(|| Logger::last_resort(ROOT_LOGGER)).named(name),
    }
}

pub fn is_configured() -> bool {
    GLOBAL.read().is_some()
}

/// Shut the global pipeline down and uninstall it
///
/// Outstanding guards are released. A no-op when nothing is installed.
pub fn shutdown() -> Result<()> {
    let installed = GLOBAL.write().take();
    match installed {
        Some(installed) => installed.pipeline.shutdown(),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;

    #[test]
    fn test_rejects_invalid_config() {
        let config = LoggingConfig::from_json_str(
            r#"{ "sinks": [{ "name": "s", "medium": { "type": "stderr" }, "formatter": "nope" }] }"#,
        )
        .unwrap();
        assert!(matches!(
            LoggingPipeline::from_config(&config),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_queued_and_direct_split() {
        let config = LoggingConfig::from_json_str(
            r#"{
                "level": "INFO",
                "sinks": [
                    { "name": "a", "medium": { "type": "stdout" }, "level": "CRITICAL" },
                    { "name": "b", "medium": { "type": "stderr" }, "level": "CRITICAL" }
                ],
                "queues": [{ "name": "q", "sinks": ["b"] }]
            }"#,
        )
        .unwrap();
        let pipeline = LoggingPipeline::from_config(&config).unwrap();

        assert_eq!(pipeline.root().min_level(), LogLevel::Info);
        assert_eq!(pipeline.root().bridges().len(), 1);
        assert_eq!(pipeline.root().bridges()[0].dispatcher().sinks()[0].name(), "b");
        assert_eq!(pipeline.logger("app.web").name(), "app.web");

        pipeline.shutdown().unwrap();
        pipeline.shutdown().unwrap();
    }

    #[test]
    fn test_last_resort_logger() {
        let logger = Logger::last_resort("early");
        assert_eq!(logger.min_level(), LogLevel::Warning);
        assert!(!logger.is_enabled_for(LogLevel::Info));
        assert!(logger.bridges().is_empty());
    }
}
