use std::time::Duration;

use bb_core::config::TelemetryConfig;
use bb_core::detection::Detection;
use reqwest::header::{HeaderName, HeaderValue};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::payload::TelemetryPayload;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("telemetry is enabled but no URL is configured")]
    MissingUrl,

    #[error("invalid telemetry header {0:?}")]
    InvalidHeader(String),

    #[error("cannot build HTTP client: {0}")]
    Client(String),
}

/// What happened to one `report` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportOutcome {
    Queued,
    /// Ambient verdict and `report_ambient` is off.
    Skipped,
    /// Queue full or sender task gone.
    Dropped,
    Disabled,
}

struct Sink {
    tx: flume::Sender<TelemetryPayload>,
    config: TelemetryConfig,
}

/// Handle used by request handlers to push detections.
///
/// `report` never blocks and never fails the caller. Payloads go through a
/// bounded flume queue to a single tokio task that POSTs them one at a time;
/// when the queue is full new reports are dropped.
///
/// # Example
/// ```
/// use bb_core::detection::Detection;
/// use bb_telemetry::{ReportOutcome, TelemetryReporter};
///
/// let reporter = TelemetryReporter::disabled();
/// let d = Detection::classified(0.9, 0.7, 0.1, 3000.0);
/// assert_eq!(reporter.report(&d), ReportOutcome::Disabled);
/// ```
pub struct TelemetryReporter {
    sink: Option<Sink>,
}

impl TelemetryReporter {
    #[must_use]
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Start the sender task on the current tokio runtime.
    ///
    /// A disabled config yields a no-op reporter and no task. The task ends
    /// once the reporter is dropped and the queue is drained.
    ///
    /// # Errors
    /// Returns an error if the URL is missing, the token header is not a
    /// valid header name, or the HTTP client cannot be built.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn spawn(
        config: &TelemetryConfig,
    ) -> Result<(Self, Option<JoinHandle<()>>), TelemetryError> {
        if !config.enabled {
            log::info!("Telemetry disabled");
            return Ok((Self::disabled(), None));
        }
        if config.url.trim().is_empty() {
            return Err(TelemetryError::MissingUrl);
        }

        let auth = match &config.token {
            Some(token) => {
                let name = HeaderName::from_bytes(config.token_header.as_bytes())
                    .map_err(|_| TelemetryError::InvalidHeader(config.token_header.clone()))?;
                let value = HeaderValue::from_str(token)
                    .map_err(|_| TelemetryError::InvalidHeader("<token>".into()))?;
                Some((name, value))
            }
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TelemetryError::Client(e.to_string()))?;

        let (tx, rx) = flume::bounded::<TelemetryPayload>(config.queue_size.max(1));
        let url = config.url.clone();
        let handle = tokio::spawn(async move {
            while let Ok(payload) = rx.recv_async().await {
                post(&client, &url, auth.as_ref(), &payload).await;
            }
            log::debug!("Telemetry sender stopped");
        });

        log::info!("Telemetry enabled → {}", config.url);
        Ok((
            Self {
                sink: Some(Sink {
                    tx,
                    config: config.clone(),
                }),
            },
            Some(handle),
        ))
    }

    /// Queue a detection for delivery.
    pub fn report(&self, detection: &Detection) -> ReportOutcome {
        let Some(sink) = &self.sink else {
            return ReportOutcome::Disabled;
        };
        if !sink.config.report_ambient && !detection.verdict.is_rat() {
            return ReportOutcome::Skipped;
        }
        let payload = TelemetryPayload::from_detection(detection, &sink.config);
        match sink.tx.try_send(payload) {
            Ok(()) => ReportOutcome::Queued,
            Err(flume::TrySendError::Full(_)) => {
                log::warn!("Telemetry queue full, report dropped");
                ReportOutcome::Dropped
            }
            Err(flume::TrySendError::Disconnected(_)) => {
                log::warn!("Telemetry sender is gone, report dropped");
                ReportOutcome::Dropped
            }
        }
    }
}

async fn post(
    client: &reqwest::Client,
    url: &str,
    auth: Option<&(HeaderName, HeaderValue)>,
    payload: &TelemetryPayload,
) {
    let mut request = client.post(url).json(payload);
    if let Some((name, value)) = auth {
        request = request.header(name.clone(), value.clone());
    }
    match request.send().await {
        Ok(resp) if resp.status().is_success() => {
            log::debug!("Telemetry sent: {}={}", payload.variable, payload.value);
        }
        Ok(resp) => log::warn!("Telemetry rejected: HTTP {}", resp.status()),
        Err(e) => log::warn!("Telemetry request failed: {e}"),
    }
}
