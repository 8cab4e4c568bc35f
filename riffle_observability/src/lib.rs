//! Logging and metrics setup shared by the riffle binaries.
//!
//! Logs always go to stdout, either in a compact human format or as JSON
//! when `RUST_LOG_FORMAT=json`. Traces and metrics are exported over OTLP
//! only when `OTEL_SDK_DISABLED=false` is set explicitly.
use std::borrow::Cow;
use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{InstrumentationScope, global};
use opentelemetry_otlp::{ExporterBuildError, MetricExporter, SpanExporter};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;
use snafu::{ResultExt, Snafu};
use tracing::Subscriber;
use tracing_opentelemetry::MetricsLayer;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::{prelude::*, registry::LookupSpan};

pub use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

use crate::format::RiffleFormat;

mod format;

const OTEL_SDK_DISABLED: &str = "OTEL_SDK_DISABLED";
const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(10);

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

#[derive(Debug, Snafu)]
pub enum ObservabilityError {
    #[snafu(display("Failed to build OTLP exporter"))]
    Exporter { source: ExporterBuildError },
}

/// Keeps the OTLP providers alive and flushes them when dropped.
#[derive(Default)]
pub struct ObservabilityGuard {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

pub fn meter(name: &'static str) -> Meter {
    global::meter(name)
}

/// Installs the global tracing subscriber.
///
/// Must be called at most once per process.
pub fn init_observability(
    package_name: impl Into<Cow<'static, str>>,
    package_version: impl Into<Cow<'static, str>>,
) -> Result<ObservabilityGuard, ObservabilityError> {
    // Unlike the OTel SDK default, export stays off unless explicitly enabled.
    let otel_enabled = std::env::var(OTEL_SDK_DISABLED)
        .map(|v| v == "false")
        .unwrap_or(false);

    let mut layers = vec![stdout()];
    let mut guard = ObservabilityGuard::default();

    if otel_enabled {
        let (layer, tracer_provider, meter_provider) = otel(package_name, package_version)?;
        layers.push(layer);
        guard.tracer_provider = Some(tracer_provider);
        guard.meter_provider = Some(meter_provider);
    }

    tracing_subscriber::registry().with(layers).init();

    Ok(guard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn stdout<S>() -> BoxedLayer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let json_fmt = std::env::var("RUST_LOG_FORMAT")
        .map(|val| val == "json")
        .unwrap_or(false);

    if json_fmt {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(env_filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .event_format(RiffleFormat::default())
            .fmt_fields(RiffleFormat::default())
            .with_filter(env_filter())
            .boxed()
    }
}

fn otel<S>(
    package_name: impl Into<Cow<'static, str>>,
    version: impl Into<Cow<'static, str>>,
) -> Result<(BoxedLayer<S>, SdkTracerProvider, SdkMeterProvider), ObservabilityError>
where
    S: Subscriber + Send + Sync,
    for<'a> S: LookupSpan<'a>,
{
    let resource = Resource::builder().build();

    let scope = InstrumentationScope::builder(package_name.into())
        .with_version(version.into())
        .build();

    let span_exporter = SpanExporter::builder()
        .with_tonic()
        .build()
        .context(ExporterSnafu {})?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_resource(resource.clone())
        .with_batch_exporter(span_exporter)
        .build();
    let tracer = tracer_provider.tracer_with_scope(scope);

    let metric_exporter = MetricExporter::builder()
        .with_tonic()
        .build()
        .context(ExporterSnafu {})?;

    let meter_provider = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(
            PeriodicReader::builder(metric_exporter)
                .with_interval(METRICS_EXPORT_INTERVAL)
                .build(),
        )
        .build();

    global::set_meter_provider(meter_provider.clone());

    let layer = env_filter()
        .and_then(MetricsLayer::new(meter_provider.clone()))
        .and_then(tracing_opentelemetry::layer().with_tracer(tracer))
        .boxed();

    Ok((layer, tracer_provider, meter_provider))
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.meter_provider.take() {
            let _ = provider.shutdown();
        }

        if let Some(provider) = self.tracer_provider.take() {
            let _ = provider.shutdown();
        }
    }
}
