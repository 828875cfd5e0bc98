use std::fmt;

/// Severity of a pipeline log record.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured key/value context attached to a log record.
pub type Fields<'a> = &'a [(&'static str, String)];

/// Logging capability injected into the request pipeline.
pub trait RequestLogger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, fields: Fields<'_>);
}

/// Discards every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl RequestLogger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: &str, _fields: Fields<'_>) {}
}

/// Forwards records to `tracing` under the `storage_api_http` target.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

#[cfg(feature = "tracing")]
impl RequestLogger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, fields: Fields<'_>) {
        let fields = DisplayFields(fields);
        match level {
            LogLevel::Debug => tracing::debug!(target: "storage_api_http", %fields, "{message}"),
            LogLevel::Info => tracing::info!(target: "storage_api_http", %fields, "{message}"),
            LogLevel::Warn => tracing::warn!(target: "storage_api_http", %fields, "{message}"),
            LogLevel::Error => tracing::error!(target: "storage_api_http", %fields, "{message}"),
        }
    }
}

/// Logger used when none is injected.
pub fn default_logger() -> std::sync::Arc<dyn RequestLogger> {
    #[cfg(feature = "tracing")]
    {
        std::sync::Arc::new(TracingLogger)
    }
    #[cfg(not(feature = "tracing"))]
    {
        std::sync::Arc::new(NoopLogger)
    }
}

#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
struct DisplayFields<'a>(Fields<'a>);

impl fmt::Display for DisplayFields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (key, value)) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}
