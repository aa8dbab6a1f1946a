use notify::{EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Re-applies `.env` whenever it is modified so API keys can be rotated
/// without restarting the bots. Dropping the watcher stops it.
pub struct EnvWatcher {
    _watcher: notify::RecommendedWatcher,
}

impl EnvWatcher {
    pub fn new(env_path: impl AsRef<Path>) -> notify::Result<Self> {
        let env_path: PathBuf = env_path.as_ref().to_path_buf();

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(&env_path, RecursiveMode::NonRecursive)?;

        thread::spawn(move || {
            for res in rx {
                match res {
                    Ok(event) if matches!(event.kind, EventKind::Modify(_)) => {
                        // editors write in several steps
                        thread::sleep(Duration::from_millis(100));
                        match dotenvy::from_path_override(&env_path) {
                            Ok(()) => log::info!("Reloaded {}", env_path.display()),
                            Err(e) => {
                                log::error!("Failed to reload {}: {}", env_path.display(), e)
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => log::error!(".env watcher error: {:?}", e),
                }
            }
        });

        Ok(Self { _watcher: watcher })
    }
}
