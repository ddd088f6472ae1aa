use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lowest sample rate accepted from config or from a WAV header.
pub const MIN_SAMPLE_RATE: u32 = 1000;
/// Highest sample rate accepted from config or from a WAV header.
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Full detector configuration.
///
/// Serializable to TOML. Every field has a sane default so an empty file (or
/// no file at all) yields a working server.
///
/// # Example
/// ```
/// use bb_core::config::DetectorConfig;
/// let config = DetectorConfig::default();
/// assert_eq!(config.server.port, 10000);
/// assert!((config.model.threshold - 0.7).abs() < f32::EPSILON);
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DetectorConfig {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub gates: GateConfig,
    pub model: ModelConfig,
    pub telemetry: TelemetryConfig,
}

/// HTTP listener settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Largest accepted clip, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 10000,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Sample layout of headerless clips sent by the microcontroller.
///
/// # Example
/// ```
/// use bb_core::config::RawFormat;
/// assert_eq!(RawFormat::S16Le.bytes_per_sample(), 2);
/// ```
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum RawFormat {
    /// Signed 16-bit little endian (ESP32 I2S default).
    #[default]
    #[serde(rename = "s16le")]
    S16Le,
    /// Signed 32-bit little endian (INMP441 style microphones).
    #[serde(rename = "s32le")]
    S32Le,
    /// Unsigned 8-bit, centered on 128.
    #[serde(rename = "u8")]
    U8,
}

impl RawFormat {
    #[must_use]
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::S16Le => 2,
            Self::S32Le => 4,
            Self::U8 => 1,
        }
    }
}

/// How the MFCC matrix is collapsed into the classifier input vector.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Pooling {
    /// Mean of each coefficient over time (`n_mfcc` values).
    #[default]
    Mean,
    /// Mean followed by standard deviation (`2 * n_mfcc` values).
    MeanStd,
}

/// Decoding and feature extraction parameters.
///
/// These must match the parameters the model was trained with.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AudioConfig {
    /// Layout of headerless (non-WAV) uploads.
    pub raw_format: RawFormat,
    /// Sample rate of headerless uploads.
    pub raw_sample_rate: u32,
    /// Rate every clip is resampled to before feature extraction.
    pub target_sample_rate: u32,
    /// Truncate or zero-pad to this duration. None keeps the clip as sent.
    pub clip_seconds: Option<f32>,
    /// FFT window size.
    pub n_fft: usize,
    /// Hop between successive frames.
    pub hop_length: usize,
    /// Number of mel bands.
    pub n_mels: usize,
    /// Number of cepstral coefficients kept.
    pub n_mfcc: usize,
    /// Lowest mel filter edge in Hz.
    pub fmin: f32,
    /// Highest mel filter edge in Hz. None = Nyquist.
    pub fmax: Option<f32>,
    /// Dynamic range of the log-mel spectrogram. None = unclipped.
    pub top_db: Option<f32>,
    /// Time pooling.
    pub pooling: Pooling,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            raw_format: RawFormat::S16Le,
            raw_sample_rate: 16_000,
            target_sample_rate: 22_050,
            clip_seconds: None,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            n_mfcc: 40,
            fmin: 0.0,
            fmax: None,
            top_db: Some(80.0),
            pooling: Pooling::Mean,
        }
    }
}

impl AudioConfig {
    /// Length of the pooled feature vector.
    ///
    /// # Example
    /// ```
    /// use bb_core::config::{AudioConfig, Pooling};
    /// let mut audio = AudioConfig::default();
    /// assert_eq!(audio.feature_len(), 40);
    /// audio.pooling = Pooling::MeanStd;
    /// assert_eq!(audio.feature_len(), 80);
    /// ```
    #[must_use]
    pub fn feature_len(&self) -> usize {
        match self.pooling {
            Pooling::Mean => self.n_mfcc,
            Pooling::MeanStd => self.n_mfcc * 2,
        }
    }
}

/// Scalar gates applied before the classifier.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct GateConfig {
    /// Minimum RMS (full scale = 1.0) for a clip to be considered at all.
    pub min_rms: f32,
    /// Enable the spectral-centroid gate.
    pub centroid_gate: bool,
    /// Minimum mean spectral centroid in Hz when the gate is on.
    pub min_centroid_hz: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_rms: 0.005,
            centroid_gate: false,
            min_centroid_hz: 1500.0,
        }
    }
}

/// Classifier artifact and decision threshold.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Path to the model artifact (`.json`, `.bin` or `.onnx`).
    pub path: PathBuf,
    /// Confidence at or above which a clip is reported as a rat.
    pub threshold: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/rat_classifier.json"),
            threshold: 0.7,
        }
    }
}

/// Third-party IoT telemetry endpoint.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Full URL the detections are POSTed to.
    pub url: String,
    /// API token, sent in `token_header`.
    pub token: Option<String>,
    pub token_header: String,
    /// Name of the telemetry variable carrying the 0/1 detection.
    pub variable: String,
    /// Device label added to every report.
    pub device: String,
    /// Also report ambient verdicts (not only rats).
    pub report_ambient: bool,
    pub timeout_secs: u64,
    /// Pending reports kept before new ones are dropped.
    pub queue_size: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            token: None,
            token_header: "X-Auth-Token".into(),
            variable: "rat_detected".into(),
            device: "bugbeats-01".into(),
            report_ambient: true,
            timeout_secs: 5,
            queue_size: 32,
        }
    }
}

impl DetectorConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization and environment overrides.
    ///
    /// NaN and infinite floats (TOML `nan`/`inf`, or `BUGBEATS_*=NaN`) fall
    /// back to the default value, since `clamp` lets NaN through.
    pub fn clamp_all(&mut self) {
        let audio_default = AudioConfig::default();
        let gates_default = GateConfig::default();

        let a = &mut self.audio;
        a.raw_sample_rate = a.raw_sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE);
        a.target_sample_rate = a.target_sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE);
        a.clip_seconds = a
            .clip_seconds
            .and_then(|s| finite("audio.clip_seconds", s))
            .map(|s| s.clamp(0.1, 60.0));
        a.n_fft = a.n_fft.max(16);
        a.hop_length = a.hop_length.clamp(1, a.n_fft);
        a.n_mels = a.n_mels.max(1);
        a.n_mfcc = a.n_mfcc.clamp(1, a.n_mels);
        a.fmin = finite("audio.fmin", a.fmin).unwrap_or(audio_default.fmin).max(0.0);
        a.fmax = a.fmax.and_then(|f| finite("audio.fmax", f));
        a.top_db = a
            .top_db
            .and_then(|db| finite("audio.top_db", db).or(audio_default.top_db))
            .map(|db| db.max(0.0));

        let g = &mut self.gates;
        g.min_rms = finite("gates.min_rms", g.min_rms)
            .unwrap_or(gates_default.min_rms)
            .clamp(0.0, 1.0);
        g.min_centroid_hz = finite("gates.min_centroid_hz", g.min_centroid_hz)
            .unwrap_or(gates_default.min_centroid_hz)
            .max(0.0);
        self.model.threshold = finite("model.threshold", self.model.threshold)
            .unwrap_or(ModelConfig::default().threshold)
            .clamp(0.0, 1.0);

        self.server.max_body_bytes = self.server.max_body_bytes.max(64);
        self.telemetry.queue_size = self.telemetry.queue_size.max(1);
        self.telemetry.timeout_secs = self.telemetry.timeout_secs.clamp(1, 120);
    }

    /// Reject settings that clamping cannot repair.
    ///
    /// # Errors
    /// `CoreError::Config` for an enabled telemetry endpoint without URL or an
    /// empty mel band range, `CoreError::UnsupportedFormat` for a model path
    /// that no backend can load.
    ///
    /// # Example
    /// ```
    /// use bb_core::config::DetectorConfig;
    /// let mut config = DetectorConfig::default();
    /// assert!(config.validate().is_ok());
    /// config.model.path = "model.pkl".into();
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.telemetry.enabled && self.telemetry.url.trim().is_empty() {
            return Err(CoreError::Config("telemetry is enabled but url is empty".into()));
        }
        if let Some(fmax) = self.audio.fmax
            && fmax <= self.audio.fmin
        {
            return Err(CoreError::Config(format!(
                "fmax ({fmax} Hz) must be above fmin ({} Hz)",
                self.audio.fmin
            )));
        }
        let ext = self
            .model
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !matches!(ext.as_str(), "json" | "bin" | "onnx") {
            return Err(CoreError::UnsupportedFormat {
                format: format!("model {}", self.model.path.display()),
            });
        }
        Ok(())
    }

    /// Overlay environment variables through `lookup`.
    ///
    /// Unparsable values are logged and ignored. Setting `TELEMETRY_URL`
    /// enables telemetry.
    ///
    /// # Example
    /// ```
    /// use bb_core::config::DetectorConfig;
    /// let mut config = DetectorConfig::default();
    /// config.apply_env(|key| match key {
    ///     "PORT" => Some("8080".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(config.server.port, 8080);
    /// ```
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = parse_env(&lookup, "PORT") {
            self.server.port = v;
        }
        if let Some(v) = lookup("BUGBEATS_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("BUGBEATS_MODEL_PATH") {
            self.model.path = PathBuf::from(v);
        }
        if let Some(v) = parse_env(&lookup, "BUGBEATS_THRESHOLD") {
            self.model.threshold = v;
        }
        if let Some(v) = parse_env(&lookup, "BUGBEATS_MIN_RMS") {
            self.gates.min_rms = v;
        }
        if let Some(v) = lookup("TELEMETRY_URL") {
            self.telemetry.url = v;
            self.telemetry.enabled = true;
        }
        if let Some(v) = lookup("TELEMETRY_TOKEN") {
            self.telemetry.token = Some(v);
        }
        if let Some(v) = lookup("TELEMETRY_DEVICE") {
            self.telemetry.device = v;
        }
        self.clamp_all();
    }

    /// Overlay the real process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }
}

/// `Some(v)` for a finite value, `None` (with a warning) otherwise.
fn finite(key: &str, v: f32) -> Option<f32> {
    if v.is_finite() {
        Some(v)
    } else {
        log::warn!("Ignoring {key} = {v}: not a finite number");
        None
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring {key}={raw:?}: not a valid value");
            None
        }
    }
}

/// Intermediate TOML structure, every section optional.
#[derive(Deserialize)]
struct ConfigFile {
    server: Option<ServerSection>,
    audio: Option<AudioSection>,
    gates: Option<GateSection>,
    model: Option<ModelSection>,
    telemetry: Option<TelemetrySection>,
}

#[derive(Deserialize)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
    max_body_bytes: Option<usize>,
}

#[derive(Deserialize)]
struct AudioSection {
    raw_format: Option<RawFormat>,
    raw_sample_rate: Option<u32>,
    target_sample_rate: Option<u32>,
    clip_seconds: Option<f32>,
    n_fft: Option<usize>,
    hop_length: Option<usize>,
    n_mels: Option<usize>,
    n_mfcc: Option<usize>,
    fmin: Option<f32>,
    fmax: Option<f32>,
    top_db: Option<f32>,
    pooling: Option<Pooling>,
}

#[derive(Deserialize)]
struct GateSection {
    min_rms: Option<f32>,
    centroid_gate: Option<bool>,
    min_centroid_hz: Option<f32>,
}

#[derive(Deserialize)]
struct ModelSection {
    path: Option<PathBuf>,
    threshold: Option<f32>,
}

#[derive(Deserialize)]
struct TelemetrySection {
    enabled: Option<bool>,
    url: Option<String>,
    token: Option<String>,
    token_header: Option<String>,
    variable: Option<String>,
    device: Option<String>,
    report_ambient: Option<bool>,
    timeout_secs: Option<u64>,
    queue_size: Option<usize>,
}

/// Parse TOML text and merge it over the defaults.
///
/// # Errors
/// Returns an error if the text is not valid TOML for this schema.
///
/// # Example
/// ```
/// use bb_core::config::parse_config;
/// let config = parse_config("[gates]\nmin_rms = 0.02\n").unwrap();
/// assert!((config.gates.min_rms - 0.02).abs() < f32::EPSILON);
/// assert_eq!(config.server.port, 10000);
/// ```
pub fn parse_config(content: &str) -> Result<DetectorConfig> {
    let file: ConfigFile = toml::from_str(content).context("TOML parse error")?;
    let mut config = DetectorConfig::default();

    if let Some(s) = file.server {
        merge(&mut config.server.host, s.host);
        merge(&mut config.server.port, s.port);
        merge(&mut config.server.max_body_bytes, s.max_body_bytes);
    }

    if let Some(a) = file.audio {
        let audio = &mut config.audio;
        merge(&mut audio.raw_format, a.raw_format);
        merge(&mut audio.raw_sample_rate, a.raw_sample_rate);
        merge(&mut audio.target_sample_rate, a.target_sample_rate);
        if a.clip_seconds.is_some() {
            audio.clip_seconds = a.clip_seconds;
        }
        merge(&mut audio.n_fft, a.n_fft);
        merge(&mut audio.hop_length, a.hop_length);
        merge(&mut audio.n_mels, a.n_mels);
        merge(&mut audio.n_mfcc, a.n_mfcc);
        merge(&mut audio.fmin, a.fmin);
        if a.fmax.is_some() {
            audio.fmax = a.fmax;
        }
        // top_db = 0 disables clipping
        if let Some(db) = a.top_db {
            audio.top_db = (db > 0.0).then_some(db);
        }
        merge(&mut audio.pooling, a.pooling);
    }

    if let Some(g) = file.gates {
        merge(&mut config.gates.min_rms, g.min_rms);
        merge(&mut config.gates.centroid_gate, g.centroid_gate);
        merge(&mut config.gates.min_centroid_hz, g.min_centroid_hz);
    }

    if let Some(m) = file.model {
        merge(&mut config.model.path, m.path);
        merge(&mut config.model.threshold, m.threshold);
    }

    if let Some(t) = file.telemetry {
        let tel = &mut config.telemetry;
        merge(&mut tel.enabled, t.enabled);
        merge(&mut tel.url, t.url);
        if t.token.is_some() {
            tel.token = t.token;
        }
        merge(&mut tel.token_header, t.token_header);
        merge(&mut tel.variable, t.variable);
        merge(&mut tel.device, t.device);
        merge(&mut tel.report_ambient, t.report_ambient);
        merge(&mut tel.timeout_secs, t.timeout_secs);
        merge(&mut tel.queue_size, t.queue_size);
    }

    config.clamp_all();
    Ok(config)
}

#[inline]
fn merge<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

/// Load a TOML file and merge it with the defaults.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
/// ```no_run
/// use bb_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<DetectorConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config in {}", path.display()))
}
