use arc_swap::ArcSwap;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// On-disk shape of the whitelist document.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WhitelistFile {
    #[serde(default)]
    version: String,
    #[serde(default)]
    allowed_servers: Vec<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default)]
struct LoadedWhitelist {
    version: String,
    description: String,
    allowed: HashSet<String>,
}

/// Decides admissibility of a candidate executable before any spawn is
/// attempted. Membership is an exact string match against the spawn target.
///
/// A missing or malformed whitelist file leaves the gate empty: default-deny,
/// never default-allow. Readers never block; `reload` swaps the set in place.
#[derive(Debug)]
pub struct WhitelistGate {
    state: ArcSwap<LoadedWhitelist>,
    source: PathBuf,
}

impl WhitelistGate {
    pub fn load(path: &Path) -> Self {
        let gate = Self {
            state: ArcSwap::from_pointee(LoadedWhitelist::default()),
            source: path.to_path_buf(),
        };
        gate.reload();
        gate
    }

    /// Re-read the whitelist file. Any failure falls back to an empty set.
    pub fn reload(&self) {
        let loaded = match std::fs::read_to_string(&self.source) {
            Ok(content) => match serde_json::from_str::<WhitelistFile>(&content) {
                Ok(file) => {
                    tracing::info!(
                        path = %self.source.display(),
                        version = %file.version,
                        entries = file.allowed_servers.len(),
                        "whitelist loaded"
                    );
                    LoadedWhitelist {
                        version: file.version,
                        description: file.description,
                        allowed: file.allowed_servers.into_iter().collect(),
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        path = %self.source.display(),
                        %error,
                        "failed to parse whitelist; denying all servers"
                    );
                    LoadedWhitelist::default()
                }
            },
            Err(error) => {
                tracing::warn!(
                    path = %self.source.display(),
                    %error,
                    "failed to read whitelist; denying all servers"
                );
                LoadedWhitelist::default()
            }
        };

        self.state.store(Arc::new(loaded));
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.state
            .load()
            .allowed
            .contains(&path.to_string_lossy().to_string())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.load().allowed.is_empty()
    }

    #[must_use]
    pub fn version(&self) -> String {
        self.state.load().version.clone()
    }

    #[must_use]
    pub fn description(&self) -> String {
        self.state.load().description.clone()
    }

    /// Sorted copy of the allowed identities, for display.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        let mut entries: Vec<String> = self.state.load().allowed.iter().cloned().collect();
        entries.sort();
        entries
    }
}
