// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Global `tracing` subscriber setup.
//!
//! One call to [`init_global_logging`] installs:
//!
//! - a stdout layer (text or JSON),
//! - an hourly rolling file layer when [`LoggingOptions::dir`] is set,
//! - an error-only rolling file next to it,
//! - a reloadable [`Targets`](filter::Targets) filter reachable through
//!   [`RELOAD_HANDLE`],
//! - the `log` → `tracing` bridge for crates that still use `log`.

use std::{
    env,
    io::IsTerminal,
    sync::{Mutex, Once},
};

use bon::Builder;
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use tracing::Subscriber;
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter, layer::SubscriberExt, registry::LookupSpan,
};

/// Deserializes a string value, using `Default::default()` if the string is
/// empty.
///
/// Lets config files write `log_format = ""` and get the default format
/// instead of a parse error.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(T::default())
    } else {
        T::deserialize(de::value::StrDeserializer::new(&s)).map_err(|e: de::value::Error| {
            de::Error::custom(format!("invalid value, expect empty string, err: {e}"))
        })
    }
}

/// Default directory for log files when file logging is enabled.
pub const DEFAULT_LOGGING_DIR: &str = "logs";

/// Fallback filter when neither [`LoggingOptions::level`] nor `RUST_LOG` is
/// set.
const DEFAULT_LOG_TARGETS: &str = "info";

/// Handle for changing the active filter at runtime.
///
/// Populated by [`init_global_logging`]; `None` before that.
pub static RELOAD_HANDLE: OnceCell<tracing_subscriber::reload::Handle<filter::Targets, Registry>> =
    OnceCell::new();

/// Configuration options for the logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for rolling log files. Empty disables file logging.
    #[default = ""]
    #[builder(default)]
    pub dir: String,

    /// Filter string such as `"info"` or `"info,lineq_sync=debug"`. Falls
    /// back to `RUST_LOG`, then to `info`.
    pub level: Option<String>,

    /// Output format for every layer.
    #[serde(default, deserialize_with = "empty_string_as_default")]
    #[builder(default)]
    pub log_format: LogFormat,

    /// Number of rotated (hourly) files to keep, per file kind.
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    /// Also write to stdout.
    #[default = true]
    #[builder(default = true)]
    pub append_stdout: bool,
}

/// Available log output formats.
#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per event, with the current span and span list.
    Json,

    /// Human-readable lines.
    #[default]
    Text,
}

/// Installs stdout-only text logging with default options.
///
/// The returned guards must be kept alive; dropping them stops the background
/// writer threads.
#[must_use]
pub fn init_tracing_subscriber(app_name: &str) -> Vec<WorkerGuard> {
    init_global_logging(app_name, &LoggingOptions::default())
}

/// Initialize logging for unit tests.
///
/// Safe to call from every test: only the first call installs the
/// subscriber. Honors `UNITTEST_LOG_DIR` and `UNITTEST_LOG_LEVEL`.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let dir = env::var("UNITTEST_LOG_DIR")
            .unwrap_or_else(|_| "/tmp/__lineq_unittest_logs".to_string());

        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| {
            "debug,hyper=warn,hyper_util=warn,tower=warn,reqwest=warn,h2=info".to_string()
        });
        let opts = LoggingOptions {
            dir: dir.clone(),
            level: Some(level),
            ..Default::default()
        };
        let guards = init_global_logging("unittest", &opts);
        if let Ok(mut slot) = GLOBAL_UT_LOG_GUARD.lock() {
            *slot = Some(guards);
        }

        tracing::info!("logs dir = {}", dir);
    });
}

/// Keeps the unit-test writer guards alive for the whole test binary.
static GLOBAL_UT_LOG_GUARD: Lazy<Mutex<Option<Vec<WorkerGuard>>>> = Lazy::new(|| Mutex::new(None));

/// Builds one formatting layer over `writer`.
fn fmt_layer<S>(writer: NonBlocking, format: LogFormat, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .boxed(),
    }
}

fn rolling_appender(dir: &str, prefix: &str, max_files: usize) -> RollingFileAppender {
    RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(max_files)
        .build(dir)
        .unwrap_or_else(|e| panic!("initializing rolling file appender at {dir} failed: {e}"))
}

/// Installs the global subscriber described by `opts`.
///
/// Only the first call has any effect; later calls return no guards. File
/// names are prefixed with `app_name` (`<app>.<hour>` and `<app>-err.<hour>`).
///
/// # Panics
///
/// On an unusable log directory or an unparsable filter string, so a broken
/// logging setup is caught at startup.
pub fn init_global_logging(app_name: &str, opts: &LoggingOptions) -> Vec<WorkerGuard> {
    static START: Once = Once::new();
    let mut guards = vec![];

    START.call_once(|| {
        LogTracer::init().expect("log tracer must be valid");

        let stdout_logging_layer = opts.append_stdout.then(|| {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            guards.push(guard);
            fmt_layer(writer, opts.log_format, std::io::stdout().is_terminal())
        });

        let file_logging_layer = (!opts.dir.is_empty()).then(|| {
            let appender = rolling_appender(&opts.dir, app_name, opts.max_log_files);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            fmt_layer(writer, opts.log_format, false)
        });

        let err_file_logging_layer = (!opts.dir.is_empty()).then(|| {
            let appender =
                rolling_appender(&opts.dir, &format!("{app_name}-err"), opts.max_log_files);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            fmt_layer(writer, opts.log_format, false).with_filter(filter::LevelFilter::ERROR)
        });

        let filter = opts
            .level
            .as_deref()
            .or(env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
            .unwrap_or(DEFAULT_LOG_TARGETS)
            .parse::<filter::Targets>()
            .expect("error parsing log level string");

        let (dyn_filter, reload_handle) = tracing_subscriber::reload::Layer::new(filter);

        RELOAD_HANDLE
            .set(reload_handle)
            .expect("reload handle already set, maybe init_global_logging get called twice?");

        let subscriber = Registry::default()
            .with(dyn_filter)
            .with(stdout_logging_layer)
            .with(file_logging_layer)
            .with(err_file_logging_layer);

        tracing::subscriber::set_global_default(subscriber)
            .expect("error setting global tracing subscriber");
    });

    guards
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = LoggingOptions::default();
        assert!(opts.dir.is_empty());
        assert!(opts.level.is_none());
        assert_eq!(opts.log_format, LogFormat::Text);
        assert_eq!(opts.max_log_files, 720);
        assert!(opts.append_stdout);
    }

    #[test]
    fn test_empty_log_format_uses_default() {
        let opts: LoggingOptions =
            serde_json::from_str(r#"{"log_format": "", "level": "debug"}"#).unwrap();
        assert_eq!(opts.log_format, LogFormat::Text);
        assert_eq!(opts.level.as_deref(), Some("debug"));
        assert!(opts.append_stdout);
    }

    #[test]
    fn test_json_log_format() {
        let opts: LoggingOptions = serde_json::from_str(r#"{"log_format": "json"}"#).unwrap();
        assert_eq!(opts.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let result = serde_json::from_str::<LoggingOptions>(r#"{"log_format": "xml"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let built = LoggingOptions::builder().build();
        assert_eq!(built, LoggingOptions::default());
    }
}
