use bb_core::config::TelemetryConfig;
use bb_core::detection::Detection;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One detection as sent to the telemetry endpoint.
///
/// Serializes to the Ubidots device format, keyed by variable name:
/// `{"rat_detected": {"value": 1, "context": {"confidence": 0.93, ...}}}`.
///
/// # Example
/// ```
/// use bb_core::config::TelemetryConfig;
/// use bb_core::detection::Detection;
/// use bb_telemetry::TelemetryPayload;
///
/// let d = Detection::classified(0.9, 0.7, 0.1, 3000.0);
/// let payload = TelemetryPayload::from_detection(&d, &TelemetryConfig::default());
/// let json = serde_json::to_value(&payload).unwrap();
/// assert_eq!(json["rat_detected"]["value"], 1);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct TelemetryPayload {
    pub variable: String,
    pub value: u8,
    pub confidence: f32,
    pub stage: &'static str,
    pub device: String,
}

impl TelemetryPayload {
    #[must_use]
    pub fn from_detection(detection: &Detection, config: &TelemetryConfig) -> Self {
        Self {
            variable: config.variable.clone(),
            value: u8::from(detection.verdict.is_rat()),
            confidence: detection.confidence,
            stage: detection.stage.as_str(),
            device: config.device.clone(),
        }
    }
}

#[derive(serde::Serialize)]
struct Dot<'a> {
    value: u8,
    context: Context<'a>,
}

#[derive(serde::Serialize)]
struct Context<'a> {
    confidence: f32,
    stage: &'a str,
    device: &'a str,
}

impl Serialize for TelemetryPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(
            &self.variable,
            &Dot {
                value: self.value,
                context: Context {
                    confidence: self.confidence,
                    stage: self.stage,
                    device: &self.device,
                },
            },
        )?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bb_core::detection::Stage;
    use serde_json::json;

    #[test]
    fn gated_clip_reports_zero() {
        let config = TelemetryConfig {
            variable: "rata".into(),
            device: "granero-2".into(),
            ..TelemetryConfig::default()
        };
        let d = Detection::gated(Stage::SilenceGate, 0.0001, 0.0);
        let json = serde_json::to_value(TelemetryPayload::from_detection(&d, &config)).unwrap();
        assert_eq!(
            json,
            json!({
                "rata": {
                    "value": 0,
                    "context": {"confidence": 0.0, "stage": "silence_gate", "device": "granero-2"}
                }
            })
        );
    }

    #[test]
    fn classified_clip_carries_confidence() {
        let d = Detection::classified(0.75, 0.7, 0.2, 4000.0);
        let p = TelemetryPayload::from_detection(&d, &TelemetryConfig::default());
        assert_eq!(p.value, 1);
        assert_eq!(p.stage, "classifier");
        assert!((p.confidence - 0.75).abs() < f32::EPSILON);
    }
}
