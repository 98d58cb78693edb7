use tracing_subscriber::{
    filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Fmt Layer for console output.
pub enum FmtLayer {
    /// Output traces to stdout.
    Stdout,
    /// Output traces to stderr.
    Stderr,
    /// Don't output traces to console.
    None,
}

/// Tracing telemetry style.
#[derive(Debug, Clone, Copy, strum_macros::EnumString, strum_macros::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum FmtStyle {
    /// Compact style.
    Compact,
    /// Pretty Style.
    Pretty,
    /// JSON Style.
    Json,
}

/// Tracing telemetry builder.
pub struct TracingTelemetry {
    writer: FmtLayer,
    style: FmtStyle,
    colours: bool,
    timestamps: bool,
    targets: bool,
    default_filter: String,
}

impl TracingTelemetry {
    /// Tracing telemetry default builder.
    pub fn builder() -> Self {
        Self {
            writer: FmtLayer::Stderr,
            style: FmtStyle::Compact,
            colours: true,
            timestamps: true,
            targets: true,
            default_filter: crate::DEFAULT_LOG_FILTER.to_string(),
        }
    }
    /// Specify writer stream.
    pub fn with_writer(self, writer: FmtLayer) -> TracingTelemetry {
        TracingTelemetry { writer, ..self }
    }
    /// Specify style.
    pub fn with_style(self, style: FmtStyle) -> TracingTelemetry {
        TracingTelemetry { style, ..self }
    }
    /// Specify whether colour is needed or not.
    pub fn with_colours(self, colours: bool) -> TracingTelemetry {
        TracingTelemetry { colours, ..self }
    }
    /// Specify whether each line carries a timestamp.
    pub fn with_timestamps(self, timestamps: bool) -> TracingTelemetry {
        TracingTelemetry { timestamps, ..self }
    }
    /// Specify whether each line carries the event's target.
    pub fn with_targets(self, targets: bool) -> TracingTelemetry {
        TracingTelemetry { targets, ..self }
    }
    /// Filter used when `RUST_LOG` is not set.
    pub fn with_default_filter(self, default_filter: impl Into<String>) -> TracingTelemetry {
        TracingTelemetry {
            default_filter: default_filter.into(),
            ..self
        }
    }

    /// The `RUST_LOG` filter, or the default one if it's unset or invalid.
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.default_filter))
            .unwrap_or_else(|_| EnvFilter::new(crate::DEFAULT_LOG_FILTER))
    }

    /// Initialize the telemetry instance.
    /// Does nothing if a global subscriber has already been set.
    pub fn init(self) {
        let subscriber = Registry::default().with(self.env_filter());

        macro_rules! fmt_layer {
            ($writer:expr) => {
                tracing_subscriber::fmt::layer()
                    .with_writer($writer)
                    .with_ansi(self.colours)
                    .with_target(self.targets)
            };
        }

        // Timers change the layer's type, hence the duplication below.
        let result = match (self.writer, self.style, self.timestamps) {
            (FmtLayer::None, _, _) => subscriber.try_init(),
            (FmtLayer::Stderr, FmtStyle::Compact, true) => subscriber
                .with(fmt_layer!(std::io::stderr).compact())
                .try_init(),
            (FmtLayer::Stderr, FmtStyle::Compact, false) => subscriber
                .with(fmt_layer!(std::io::stderr).without_time().compact())
                .try_init(),
            (FmtLayer::Stderr, FmtStyle::Pretty, true) => subscriber
                .with(fmt_layer!(std::io::stderr).pretty())
                .try_init(),
            (FmtLayer::Stderr, FmtStyle::Pretty, false) => subscriber
                .with(fmt_layer!(std::io::stderr).without_time().pretty())
                .try_init(),
            (FmtLayer::Stderr, FmtStyle::Json, _) => subscriber
                .with(fmt_layer!(std::io::stderr).json())
                .try_init(),
            (FmtLayer::Stdout, FmtStyle::Compact, true) => subscriber
                .with(fmt_layer!(std::io::stdout).compact())
                .try_init(),
            (FmtLayer::Stdout, FmtStyle::Compact, false) => subscriber
                .with(fmt_layer!(std::io::stdout).without_time().compact())
                .try_init(),
            (FmtLayer::Stdout, FmtStyle::Pretty, true) => subscriber
                .with(fmt_layer!(std::io::stdout).pretty())
                .try_init(),
            (FmtLayer::Stdout, FmtStyle::Pretty, false) => subscriber
                .with(fmt_layer!(std::io::stdout).without_time().pretty())
                .try_init(),
            (FmtLayer::Stdout, FmtStyle::Json, _) => subscriber
                .with(fmt_layer!(std::io::stdout).json())
                .try_init(),
        };
        if let Err(error) = result {
            eprintln!("Failed to initialise tracing: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn style_from_str() {
        assert!(matches!(FmtStyle::from_str("json"), Ok(FmtStyle::Json)));
        assert!(matches!(FmtStyle::from_str("compact"), Ok(FmtStyle::Compact)));
        assert!(FmtStyle::from_str("fancy").is_err());
        assert_eq!(FmtStyle::Pretty.as_ref(), "pretty");
    }
}
