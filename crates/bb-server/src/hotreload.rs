use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use arc_swap::ArcSwap;
use bb_core::config::DetectorConfig;
use notify::{Event, EventKind, RecursiveMode, Watcher};

/// Watch the config file and publish every valid new version.
///
/// Each reload re-applies the environment and then `overrides` (the CLI
/// flags), so a reload never undoes either layer. Restart-only settings are
/// compared with the snapshot taken when the watcher starts. The returned
/// watcher must stay alive for as long as reloads are wanted.
///
/// # Errors
/// Returns an error if the watcher cannot be created or the path cannot be watched.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
/// use arc_swap::ArcSwap;
/// use bb_core::config::DetectorConfig;
/// use bb_server::hotreload::spawn_config_watcher;
///
/// let config = Arc::new(ArcSwap::from_pointee(DetectorConfig::default()));
/// let _watcher = spawn_config_watcher(Path::new("config/default.toml"), &config, |_| {});
/// ```
pub fn spawn_config_watcher<F>(
    config_path: &Path,
    config: &Arc<ArcSwap<DetectorConfig>>,
    overrides: F,
) -> Result<impl Watcher + use<F>>
where
    F: Fn(&mut DetectorConfig) + Send + 'static,
{
    let config = Arc::clone(config);
    let startup = config.load_full();
    let path = config_path.to_path_buf();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let Ok(event) = res else { return };
        if !matches!(event.kind, EventKind::Modify(_)) {
            return;
        }
        match bb_core::config::load_config(&path) {
            Ok(mut fresh) => {
                fresh.apply_process_env();
                overrides(&mut fresh);
                publish(&config, &startup, fresh);
                log::info!("Config reloaded from {}", path.display());
            }
            // Keep serving with the previous config
            Err(e) => log::warn!("Config reload failed: {e:#}"),
        }
    })?;

    watcher.watch(config_path, RecursiveMode::NonRecursive)?;
    log::info!("Watching {} for changes", config_path.display());
    Ok(watcher)
}

/// Store a new config snapshot.
///
/// Only gates and the decision threshold take effect live. The return value
/// tells whether `fresh` differs from `startup` in settings that need a
/// restart (audio framing, listener, model path, telemetry); the warning
/// repeats on every reload until the process is restarted.
pub fn publish(
    shared: &ArcSwap<DetectorConfig>,
    startup: &DetectorConfig,
    fresh: DetectorConfig,
) -> bool {
    let needs_restart = startup.audio != fresh.audio
        || startup.server.port != fresh.server.port
        || startup.server.host != fresh.server.host
        || startup.model.path != fresh.model.path
        || startup.telemetry.url != fresh.telemetry.url
        || startup.telemetry.enabled != fresh.telemetry.enabled;
    if needs_restart {
        log::warn!("Audio, server, model or telemetry settings changed: restart to apply them");
    }
    shared.store(Arc::new(fresh));
    needs_restart
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use bb_core::config::parse_config;

    #[test]
    fn gate_changes_apply_without_restart() {
        let startup = DetectorConfig::default();
        let shared = ArcSwap::from_pointee(startup.clone());
        let fresh = parse_config("[gates]\nmin_rms = 0.05\n[model]\nthreshold = 0.9\n").unwrap();
        assert!(!publish(&shared, &startup, fresh));
        let now = shared.load();
        assert!((now.gates.min_rms - 0.05).abs() < f32::EPSILON);
        assert!((now.model.threshold - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn framing_changes_warn_until_restart() {
        let startup = DetectorConfig::default();
        let shared = ArcSwap::from_pointee(startup.clone());
        let fresh = parse_config("[audio]\nn_mfcc = 13\n").unwrap();
        assert!(publish(&shared, &startup, fresh.clone()));
        assert_eq!(shared.load().audio.n_mfcc, 13);
        // Still differs from what the server was started with
        assert!(publish(&shared, &startup, fresh));
    }

    #[test]
    fn watcher_republishes_edited_file_with_flags_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detector.toml");
        std::fs::write(&path, "[model]\nthreshold = 0.7\n").unwrap();

        let flags = |c: &mut DetectorConfig| c.server.port = 8123;
        let mut startup = bb_core::config::load_config(&path).unwrap();
        flags(&mut startup);
        let shared = Arc::new(ArcSwap::from_pointee(startup));
        let _watcher = spawn_config_watcher(&path, &shared, flags).unwrap();

        std::fs::write(&path, "[model]\nthreshold = 0.9\n").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while (shared.load().model.threshold - 0.9).abs() > f32::EPSILON {
            assert!(Instant::now() < deadline, "reload not observed");
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(shared.load().server.port, 8123);
    }
}
