//! Run-scoped checkpoint storage.
//!
//! Layout: `<root>/<run_id>/manifest.json` and one `scenario_<i>.json` per
//! simulated scenario.

use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{RunManifest, SimulationResult};
use crate::{ResultsError, ResultsResult};

const MANIFEST: &str = "manifest.json";

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root_dir: PathBuf,
}

fn checkpoint_index(name: &str) -> Option<usize> {
    name.strip_prefix("scenario_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

impl CheckpointStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    /// Store under `.stormtrap/runs` next to the network file.
    pub fn for_network(network_path: &Path) -> ResultsResult<Self> {
        let dir = network_path.parent().unwrap_or_else(|| Path::new("."));
        Self::new(dir.join(".stormtrap").join("runs"))
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root_dir.join(run_id)
    }

    pub fn has_run(&self, run_id: &str) -> bool {
        self.run_dir(run_id).join(MANIFEST).exists()
    }

    /// Start a run: stale checkpoints of the same run are removed first.
    pub fn begin(&self, manifest: &RunManifest) -> ResultsResult<()> {
        let run_dir = self.run_dir(&manifest.run_id);
        if run_dir.exists() {
            tracing::debug!(run_id = %manifest.run_id, "removing stale checkpoints");
            fs::remove_dir_all(&run_dir)?;
        }
        fs::create_dir_all(&run_dir)?;
        fs::write(run_dir.join(MANIFEST), serde_json::to_string_pretty(manifest)?)?;
        Ok(())
    }

    pub fn save(&self, run_id: &str, result: &SimulationResult) -> ResultsResult<()> {
        let run_dir = self.run_dir(run_id);
        if !run_dir.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let path = run_dir.join(format!("scenario_{}.json", result.index));
        fs::write(path, serde_json::to_string(result)?)?;
        Ok(())
    }

    pub fn load_manifest(&self, run_id: &str) -> ResultsResult<RunManifest> {
        let path = self.run_dir(run_id).join(MANIFEST);
        if !path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    /// All checkpoints of a run ordered by index. The indices must be 0..N.
    pub fn load_all(&self, run_id: &str) -> ResultsResult<Vec<SimulationResult>> {
        let run_dir = self.run_dir(run_id);
        if !run_dir.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let mut indices: Vec<usize> = Vec::new();
        for entry in fs::read_dir(&run_dir)? {
            let entry = entry?;
            if let Some(i) = checkpoint_index(&entry.file_name().to_string_lossy()) {
                indices.push(i);
            }
        }
        indices.sort_unstable();
        if let Some(missing) = indices.iter().enumerate().position(|(pos, &i)| pos != i) {
            return Err(ResultsError::MissingCheckpoint {
                run_id: run_id.to_string(),
                missing,
                found: indices.len(),
            });
        }

        let mut results = Vec::with_capacity(indices.len());
        for i in indices {
            let content = fs::read_to_string(run_dir.join(format!("scenario_{}.json", i)))?;
            results.push(serde_json::from_str(&content)?);
        }
        Ok(results)
    }

    /// Most recently created run in this store.
    pub fn latest_run(&self) -> ResultsResult<Option<RunManifest>> {
        let mut latest: Option<RunManifest> = None;
        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let run_id = entry.file_name().to_string_lossy().to_string();
            if let Ok(manifest) = self.load_manifest(&run_id)
                && latest.as_ref().is_none_or(|l| manifest.created > l.created)
            {
                latest = Some(manifest);
            }
        }
        Ok(latest)
    }

    /// Delete a run and its checkpoints.
    pub fn clear(&self, run_id: &str) -> ResultsResult<()> {
        let run_dir = self.run_dir(run_id);
        if run_dir.exists() {
            fs::remove_dir_all(run_dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_names() {
        assert_eq!(checkpoint_index("scenario_12.json"), Some(12));
        assert_eq!(checkpoint_index("scenario_x.json"), None);
        assert_eq!(checkpoint_index("manifest.json"), None);
    }
}
