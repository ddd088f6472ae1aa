// Fire-and-forget detection reports to an IoT telemetry endpoint.

pub mod payload;
pub mod reporter;

pub use payload::TelemetryPayload;
pub use reporter::{ReportOutcome, TelemetryError, TelemetryReporter};
