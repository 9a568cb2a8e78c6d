//! Log and span wiring for the `hloop` binary.
//!
//! Coordinator crates log under the `humanloop` and `hloop` target prefixes.
//! Dependencies (sqlx, hyper, reqwest) stay at `warn` unless `RUST_LOG`
//! overrides the whole filter. Log lines go to stderr so command output on
//! stdout (`--json`) stays machine-readable.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Target prefixes owned by this workspace.
const OWN_TARGETS: [&str; 2] = ["humanloop", "hloop"];

/// How the process wants its diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// `-v` count from the command line.
    pub verbosity: u8,
    pub quiet: bool,
    /// Export spans (pause, submit, sweep) through OpenTelemetry.
    pub export_spans: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "hloop".to_string(),
            verbosity: 0,
            quiet: false,
            export_spans: false,
        }
    }
}

impl TelemetryConfig {
    pub fn new(verbosity: u8, quiet: bool) -> Self {
        Self {
            verbosity,
            quiet,
            ..Default::default()
        }
    }

    pub fn with_span_export(mut self, enabled: bool) -> Self {
        self.export_spans = enabled;
        self
    }

    /// Filter directives used when `RUST_LOG` is unset.
    pub fn directives(&self) -> String {
        let own = match (self.quiet, self.verbosity) {
            (true, 0) => return "error".to_string(),
            (_, 0) => "info",
            (_, 1) => "debug",
            _ => "trace",
        };
        let deps = if self.verbosity >= 2 { "debug" } else { "warn" };
        let mut directives = vec![deps.to_string()];
        directives.extend(OWN_TARGETS.iter().map(|target| format!("{target}={own}")));
        if self.verbosity >= 1 {
            directives.push("tower_http=debug".to_string());
        }
        directives.join(",")
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }
}

/// Keeps the span exporter alive. Dropping it flushes and stops export.
#[must_use = "dropping the guard stops span export"]
#[derive(Debug, Default)]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    pub fn exporting(&self) -> bool {
        self.provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Warning: span exporter shutdown failed: {e}");
            }
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(
    config: &TelemetryConfig,
) -> Result<TelemetryGuard, Box<dyn std::error::Error>> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);
    let registry = tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer);

    if !config.export_spans {
        registry.try_init()?;
        return Ok(TelemetryGuard::default());
    }

    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .build();
    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build();
    let tracer = provider.tracer(config.service_name.clone());
    registry
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init()?;
    opentelemetry::global::set_tracer_provider(provider.clone());

    Ok(TelemetryGuard {
        provider: Some(provider),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_logs_coordinator_at_info_and_deps_at_warn() {
        assert_eq!(
            TelemetryConfig::default().directives(),
            "warn,humanloop=info,hloop=info"
        );
    }

    #[test]
    fn quiet_only_reports_errors() {
        assert_eq!(TelemetryConfig::new(0, true).directives(), "error");
    }

    #[test]
    fn verbose_overrides_quiet() {
        let directives = TelemetryConfig::new(1, true).directives();
        assert_eq!(directives, "warn,humanloop=debug,hloop=debug,tower_http=debug");
    }

    #[test]
    fn very_verbose_opens_dependencies() {
        let directives = TelemetryConfig::new(3, false).directives();
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("humanloop=trace"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn disabled_export_guard_is_inert() {
        let config = TelemetryConfig::new(0, false).with_span_export(false);
        assert!(!config.export_spans);
        let guard = TelemetryGuard::default();
        assert!(!guard.exporting());
        drop(guard);
    }
}
