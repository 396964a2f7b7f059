//! Usage events, sent fire-and-forget.
//!
//! A failed delivery is logged and otherwise ignored; it never changes or
//! delays a response.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::classify::Operation;
use crate::render::MediaType;

#[cfg(feature = "remote")]
use std::time::Duration;

pub const APPLICATION: &str = "specdiff-service";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Platform reported when the request carries no `User-Agent`.
pub const UNKNOWN_PLATFORM: &str = "na";

#[cfg(feature = "remote")]
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// One operation invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryEvent {
    pub time: String,
    pub application: String,
    pub application_version: String,
    pub command: String,
    /// Identifiers of the two compared sources.
    pub args: Vec<String>,
    pub flags: BTreeMap<String, String>,
    pub tenant_id: String,
    pub platform: String,
    pub runtime: String,
}

impl TelemetryEvent {
    pub fn new(
        operation: Operation,
        args: Vec<String>,
        format: MediaType,
        tenant_id: &str,
        user_agent: Option<&str>,
    ) -> Self {
        Self {
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            application: APPLICATION.to_string(),
            application_version: VERSION.to_string(),
            command: operation.command().to_string(),
            args,
            flags: BTreeMap::from([("format".to_string(), format.format_flag().to_string())]),
            tenant_id: tenant_id.to_string(),
            platform: user_agent
                .filter(|agent| !agent.is_empty())
                .unwrap_or(UNKNOWN_PLATFORM)
                .to_string(),
            runtime: std::env::consts::OS.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[cfg(feature = "remote")]
    #[error("failed to deliver telemetry to {url}: {source}")]
    Delivery {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("telemetry delivery is not supported by this build")]
    Unsupported,
}

/// Destination for telemetry events.
pub trait TelemetrySender: Send + Sync {
    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError` when delivery fails.
    fn send(&self, event: &TelemetryEvent) -> Result<(), TelemetryError>;
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

impl TelemetrySender for Disabled {
    fn send(&self, _event: &TelemetryEvent) -> Result<(), TelemetryError> {
        Ok(())
    }
}

#[derive(Serialize)]
struct Batch<'a> {
    events: [&'a TelemetryEvent; 1],
}

/// Posts events as JSON (`{"events": [...]}`) to a collector URL.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    url: String,
}

impl HttpCollector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(feature = "remote")]
impl TelemetrySender for HttpCollector {
    fn send(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        let delivery_error = |source| TelemetryError::Delivery {
            url: self.url.clone(),
            source,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(delivery_error)?;

        client
            .post(&self.url)
            .json(&Batch { events: [event] })
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(delivery_error)?;
        Ok(())
    }
}

#[cfg(not(feature = "remote"))]
impl TelemetrySender for HttpCollector {
    fn send(&self, _event: &TelemetryEvent) -> Result<(), TelemetryError> {
        Err(TelemetryError::Unsupported)
    }
}

/// Deliver an event without waiting for the outcome when a runtime is
/// available; inline otherwise.
pub fn report(sender: Arc<dyn TelemetrySender>, event: TelemetryEvent) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(move || deliver(sender.as_ref(), &event));
        }
        Err(_) => deliver(sender.as_ref(), &event),
    }
}

fn deliver(sender: &dyn TelemetrySender, event: &TelemetryEvent) {
    match sender.send(event) {
        Ok(()) => debug!(command = %event.command, "telemetry sent"),
        Err(e) => error!("failed to send telemetry '{:?}' with '{}'", event, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(user_agent: Option<&str>) -> TelemetryEvent {
        TelemetryEvent::new(
            Operation::BreakingChanges,
            vec!["base".into(), "revision".into()],
            MediaType::Yaml,
            "acme",
            user_agent,
        )
    }

    #[test]
    fn event_fields() {
        let event = event(Some("oasdiff-action/1.0"));
        assert_eq!(event.application, "specdiff-service");
        assert_eq!(event.application_version, VERSION);
        assert_eq!(event.command, "breaking");
        assert_eq!(event.flags["format"], "yaml");
        assert_eq!(event.tenant_id, "acme");
        assert_eq!(event.platform, "oasdiff-action/1.0");
    }

    #[test]
    fn missing_user_agent_is_na() {
        assert_eq!(event(None).platform, "na");
        assert_eq!(event(Some("")).platform, "na");
    }

    #[test]
    fn disabled_accepts_everything() {
        assert!(Disabled.send(&event(None)).is_ok());
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;
        use mockito::Matcher;
        use serde_json::json;

        #[test]
        fn collector_posts_batch() {
            let mut server = mockito::Server::new();
            let mock = server
                .mock("POST", "/events")
                .match_body(Matcher::PartialJson(json!({
                    "events": [{ "command": "breaking", "platform": "curl/8.0", "tenant_id": "acme" }]
                })))
                .with_status(201)
                .create();

            let collector = HttpCollector::new(format!("{}/events", server.url()));
            collector.send(&event(Some("curl/8.0"))).unwrap();
            mock.assert();
        }

        #[test]
        fn collector_reports_error_status() {
            let mut server = mockito::Server::new();
            server.mock("POST", "/events").with_status(500).create();

            let collector = HttpCollector::new(format!("{}/events", server.url()));
            let result = collector.send(&event(None));
            assert!(matches!(result, Err(TelemetryError::Delivery { .. })));
        }

        #[test]
        fn report_without_runtime_sends_inline() {
            let mut server = mockito::Server::new();
            let mock = server.mock("POST", "/events").with_status(500).create();

            // Failure is swallowed.
            report(
                Arc::new(HttpCollector::new(format!("{}/events", server.url()))),
                event(None),
            );
            mock.assert();
        }
    }
}
