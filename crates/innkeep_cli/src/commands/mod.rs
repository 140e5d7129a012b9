//! CLI command implementations.

pub mod records;
pub mod serve;
pub mod status;
pub mod transfer;

use innkeep_core::{EngineConfig, StorageEngine};
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result type of every command.
pub type CommandResult<T = ()> = Result<T, Box<dyn Error>>;

/// Global flags that shape the engine configuration.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Directory holding the local stores.
    pub data_dir: PathBuf,
    /// Relational endpoint, if any.
    pub server: Option<String>,
    /// Start without probing the endpoint.
    pub offline: bool,
    /// Probe timeout in milliseconds.
    pub probe_timeout_ms: u64,
    /// Insert starter rooms into an empty store.
    pub seed: bool,
}

impl StoreOptions {
    /// Maps the flags onto an engine configuration.
    pub fn config(&self) -> EngineConfig {
        let mut config = EngineConfig::persistent(&self.data_dir)
            .probe_timeout(Duration::from_millis(self.probe_timeout_ms))
            .seed_defaults(self.seed)
            .online(!self.offline);
        if let Some(server) = &self.server {
            config = config.server_url(server.as_str());
        }
        config
    }
}

/// Starts the engine and waits until a backend is active.
pub async fn open(options: &StoreOptions) -> CommandResult<StorageEngine> {
    let engine = StorageEngine::start(options.config())?;
    let budget = Duration::from_millis(options.probe_timeout_ms) + Duration::from_secs(10);
    engine.wait_ready(budget).await?;
    Ok(engine)
}

/// Writes `text` to `output`, or to stdout when no file is given.
pub fn emit(text: &str, output: Option<&Path>) -> CommandResult {
    match output {
        Some(path) => std::fs::write(path, text)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use innkeep_core::{FlatLocation, TransactionalLocation};

    #[test]
    fn flags_map_onto_config() {
        let options = StoreOptions {
            data_dir: PathBuf::from("/srv/innkeep"),
            server: Some("http://db.local:8080".into()),
            offline: true,
            probe_timeout_ms: 750,
            seed: false,
        };
        let config = options.config();
        assert_eq!(config.server_url.as_deref(), Some("http://db.local:8080"));
        assert_eq!(config.probe_timeout, Duration::from_millis(750));
        assert!(!config.online);
        assert!(!config.seed_defaults);
        assert_eq!(
            config.transactional,
            TransactionalLocation::File(PathBuf::from("/srv/innkeep/store.redb"))
        );
        assert_eq!(
            config.flat,
            FlatLocation::Directory(PathBuf::from("/srv/innkeep/slots"))
        );
    }
}
