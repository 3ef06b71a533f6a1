//! Data directory layout
//!
//! ```text
//! ~/.local/share/glidepath/
//!   glidepath.log
//!   assumptions/
//!     us_baseline-v1.yaml
//!   scenarios/
//!     example.yaml
//! ```
//!
//! Assumption files are full `MarketAssumptionSet` snapshots. The built-in
//! US baseline is always available, even with an empty directory.

use std::fs;
use std::path::{Path, PathBuf};

use glidepath_core::config::AssumptionSetBuilder;
use glidepath_core::model::{AssumptionSetId, MarketAssumptionSet};
use glidepath_core::service::StaticAssumptionStore;

use crate::scenario::{AssumptionRef, Scenario, ScenarioError};

pub struct DataDirectory {
    root: PathBuf,
}

impl DataDirectory {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Platform data directory, falling back to `./.glidepath`
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("glidepath"))
            .unwrap_or_else(|| PathBuf::from(".glidepath"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn assumptions_dir(&self) -> PathBuf {
        self.root.join("assumptions")
    }

    fn scenarios_dir(&self) -> PathBuf {
        self.root.join("scenarios")
    }

    fn assumption_path(&self, id: &AssumptionSetId) -> PathBuf {
        self.assumptions_dir().join(format!(
            "{}-v{}.yaml",
            sanitize_filename(&id.name),
            id.version
        ))
    }

    /// Path of a named scenario in the scenarios directory
    pub fn scenario_path(&self, name: &str) -> PathBuf {
        self.scenarios_dir()
            .join(format!("{}.yaml", sanitize_filename(name)))
    }

    pub fn init(&self) -> Result<(), ScenarioError> {
        for dir in [self.assumptions_dir(), self.scenarios_dir()] {
            fs::create_dir_all(&dir).map_err(|e| {
                ScenarioError::Io(format!("Failed to create {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }

    /// Write the baseline assumptions and the example scenario if absent.
    /// Returns the paths that were created.
    pub fn seed_defaults(&self) -> Result<Vec<PathBuf>, ScenarioError> {
        self.init()?;
        let mut created = Vec::new();

        let baseline = AssumptionSetBuilder::us_baseline().build()?;
        let path = self.assumption_path(&baseline.id);
        if !path.exists() {
            self.save_assumptions(&baseline)?;
            created.push(path);
        }

        let example = Scenario::example();
        let path = self.scenario_path(&example.name);
        if !path.exists() {
            example.save(&path)?;
            created.push(path);
        }
        Ok(created)
    }

    pub fn save_assumptions(&self, set: &MarketAssumptionSet) -> Result<PathBuf, ScenarioError> {
        set.validate()?;
        self.init()?;
        let yaml = serde_saphyr::to_string(set).map_err(|e| {
            ScenarioError::Serialize(format!("Failed to serialize assumptions {}: {e}", set.id))
        })?;
        let path = self.assumption_path(&set.id);
        fs::write(&path, yaml)
            .map_err(|e| ScenarioError::Io(format!("Failed to write {}: {e}", path.display())))?;
        Ok(path)
    }

    /// Store holding the built-in baseline plus every readable assumption
    /// file. Files that fail to parse or validate are logged and skipped.
    pub fn load_store(&self) -> Result<StaticAssumptionStore, ScenarioError> {
        let mut store = StaticAssumptionStore::new();
        store.insert(AssumptionSetBuilder::us_baseline().build()?)?;

        let dir = self.assumptions_dir();
        if !dir.exists() {
            return Ok(store);
        }
        let entries = fs::read_dir(&dir)
            .map_err(|e| ScenarioError::Io(format!("Failed to read {}: {e}", dir.display())))?;

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "yaml" || ext == "yml"))
            .collect();
        paths.sort();

        for path in paths {
            let loaded = load_assumptions(&path)
                .and_then(|set| store.insert(set).map_err(ScenarioError::from));
            match loaded {
                Ok(id) => {
                    tracing::debug!(
                        assumption_set = %id,
                        path = %path.display(),
                        "loaded assumptions"
                    );
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping assumption file");
                }
            }
        }
        Ok(store)
    }

    /// Scenario by file path, or by name in the scenarios directory
    pub fn load_scenario(&self, name_or_path: &str) -> Result<Scenario, ScenarioError> {
        let direct = Path::new(name_or_path);
        if direct.is_file() {
            return Scenario::load(direct);
        }
        Scenario::load(&self.scenario_path(name_or_path))
    }
}

fn load_assumptions(path: &Path) -> Result<MarketAssumptionSet, ScenarioError> {
    let content = fs::read_to_string(path)
        .map_err(|e| ScenarioError::Io(format!("Failed to read {}: {e}", path.display())))?;
    serde_saphyr::from_str(&content)
        .map_err(|e| ScenarioError::Parse(format!("Failed to parse {}: {e}", path.display())))
}

/// Resolve a reference to a concrete id; no version picks the latest stored
pub fn resolve_assumptions(
    store: &StaticAssumptionStore,
    reference: &AssumptionRef,
) -> Result<AssumptionSetId, ScenarioError> {
    match reference.version {
        Some(v) => Ok(AssumptionSetId::new(reference.name.clone(), v)),
        None => store.latest(&reference.name).ok_or_else(|| {
            ScenarioError::Invalid(format!("no assumption set named '{}'", reference.name))
        }),
    }
}

/// Replace characters that are awkward in file names
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
