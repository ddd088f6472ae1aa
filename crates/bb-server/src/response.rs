//! JSON bodies of `/detectar`.
//!
//! Field names are the ones the deployed ESP32 firmware parses and must not
//! change.

use bb_core::detection::{Detection, Stage, Verdict};
use serde::Serialize;

/// Successful detection.
///
/// # Example
/// ```
/// use bb_core::detection::Detection;
/// use bb_server::response::DetectResponse;
///
/// let body = DetectResponse::from(&Detection::classified(0.91, 0.7, 0.2, 3100.0));
/// assert_eq!(body.es_rata, 1);
/// assert_eq!(body.etapa, "classifier");
/// ```
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DetectResponse {
    pub status: &'static str,
    pub mensaje: &'static str,
    pub es_rata: u8,
    pub confianza: f32,
    pub etapa: &'static str,
}

impl From<&Detection> for DetectResponse {
    fn from(d: &Detection) -> Self {
        let mensaje = match (d.stage, d.verdict) {
            (Stage::SilenceGate, _) => "SILENCIO",
            (Stage::CentroidGate, _) => "RUIDO DE BAJA FRECUENCIA",
            (Stage::Classifier, Verdict::Rat) => "RATA DETECTADA",
            (Stage::Classifier, Verdict::Ambient) => "SIN RATA",
        };
        Self {
            status: "ok",
            mensaje,
            es_rata: u8::from(d.verdict.is_rat()),
            confianza: d.confidence,
            etapa: d.stage.as_str(),
        }
    }
}

/// Error body: `status` is `"error"` or `"loading"`.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub mensaje: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn error(mensaje: impl Into<String>) -> Self {
        Self {
            status: "error",
            mensaje: mensaje.into(),
        }
    }

    #[must_use]
    pub fn loading() -> Self {
        Self {
            status: "loading",
            mensaje: "MODELO CARGANDO".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gated_clips_report_their_gate() {
        let body = DetectResponse::from(&Detection::gated(Stage::CentroidGate, 0.2, 600.0));
        assert_eq!(body.es_rata, 0);
        assert_eq!(body.etapa, "centroid_gate");
        assert_eq!(body.mensaje, "RUIDO DE BAJA FRECUENCIA");
        assert_eq!(body.confianza, 0.0);
    }

    #[test]
    fn wire_field_names() {
        let body = DetectResponse::from(&Detection::classified(0.25, 0.7, 0.2, 3100.0));
        let json = serde_json::to_value(body).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["confianza", "es_rata", "etapa", "mensaje", "status"]);
        assert_eq!(json["mensaje"], "SIN RATA");
    }
}
