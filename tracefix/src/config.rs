// Run configuration.
//
// Priority order (highest to lowest):
// 1. Command-line overrides (applied by the binary after load())
// 2. Environment variables (TRACEFIX__* prefix)
// 3. Config file (YAML/TOML/JSON)
// 4. Built-in defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::partition::HasherKind;

/// Complete rewriter configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteConfig {
    /// Seed for every random draw in the run
    pub seed: u64,

    /// Partition assignment
    pub partitions: PartitionConfig,

    /// Affinity rewriter knobs
    pub affinity: AffinityConfig,

    /// Legacy parameter-swap fix
    pub legacy: LegacyConfig,

    /// Histogram and summary output
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartitionConfig {
    /// Number of partitions in the target database
    pub count: u32,

    /// Warehouse to partition hash function
    pub hasher: HasherKind,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            count: 4,
            hasher: HasherKind::Modulo,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AffinityConfig {
    /// Procedure whose order lines are rewritten
    pub procedure: String,

    /// Percent of transactions that pick a remote warehouse (warehouse mode)
    pub remote_txn_pct: u8,

    /// Percent of order lines sent to the remote side
    pub remote_item_pct: u8,

    /// Sanity bound on distinct origin warehouses
    pub max_warehouses: usize,
}

impl Default for AffinityConfig {
    fn default() -> Self {
        Self {
            procedure: "neworder".to_string(),
            remote_txn_pct: 50,
            remote_item_pct: 50,
            max_warehouses: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LegacyConfig {
    /// Transactions of this procedure get params 0 and 1 swapped
    pub procedure: String,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            procedure: "UpdateSubscriberData".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory receiving one `<key>.hist` file per origin (None disables)
    pub histogram_dir: Option<PathBuf>,

    /// Optional CSV export of all histograms
    pub summary_csv: Option<PathBuf>,

    /// Optional JSON dump of every pass summary
    pub report_json: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            histogram_dir: Some(PathBuf::from("histograms")),
            summary_csv: None,
            report_json: None,
        }
    }
}

impl RewriteConfig {
    /// Load with the priority chain: environment, then file, then defaults.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        let defaults = Self::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize defaults")?;
        builder = builder.add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        if let Some(path) = config_file {
            anyhow::ensure!(path.exists(), "config file {} not found", path.display());
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TRACEFIX")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build().context("Failed to build config")?;
        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize config")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.partitions.count > 0,
            "partitions.count must be > 0, got {}",
            self.partitions.count
        );
        anyhow::ensure!(
            self.affinity.remote_txn_pct <= 100,
            "affinity.remote_txn_pct must be in [0, 100], got {}",
            self.affinity.remote_txn_pct
        );
        anyhow::ensure!(
            self.affinity.remote_item_pct <= 100,
            "affinity.remote_item_pct must be in [0, 100], got {}",
            self.affinity.remote_item_pct
        );
        anyhow::ensure!(
            self.affinity.max_warehouses > 0,
            "affinity.max_warehouses must be > 0"
        );
        anyhow::ensure!(
            !self.affinity.procedure.trim().is_empty(),
            "affinity.procedure cannot be empty"
        );
        anyhow::ensure!(
            !self.legacy.procedure.trim().is_empty(),
            "legacy.procedure cannot be empty"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = RewriteConfig::default();
        config.validate().unwrap();
        assert_eq!(config.affinity.procedure, "neworder");
        assert_eq!(config.affinity.remote_txn_pct, 50);
        assert_eq!(config.affinity.max_warehouses, 40);
        assert_eq!(config.output.histogram_dir, Some(PathBuf::from("histograms")));
    }

    #[test]
    fn test_percentages_bounded() {
        let mut config = RewriteConfig::default();
        config.affinity.remote_item_pct = 101;
        assert!(config.validate().is_err(), "pct > 100 should fail");

        let mut config = RewriteConfig::default();
        config.affinity.remote_txn_pct = 100;
        assert!(config.validate().is_ok(), "pct = 100 should pass");
    }

    #[test]
    fn test_zero_partitions_rejected() {
        let mut config = RewriteConfig::default();
        config.partitions.count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tracefix.yaml");
        std::fs::write(
            &path,
            "seed: 17\npartitions:\n  count: 8\n  hasher: xxh3\naffinity:\n  remote_txn_pct: 100\n",
        )
        .unwrap();

        let config = RewriteConfig::load(Some(&path)).unwrap();
        assert_eq!(config.seed, 17);
        assert_eq!(config.partitions.count, 8);
        assert_eq!(config.partitions.hasher, HasherKind::Xxh3);
        assert_eq!(config.affinity.remote_txn_pct, 100);
        // untouched keys keep their defaults
        assert_eq!(config.affinity.remote_item_pct, 50);
        assert_eq!(config.legacy.procedure, "UpdateSubscriberData");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "affinity:\n  remote_pct: 10\n").unwrap();
        assert!(RewriteConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = tempdir().unwrap();
        assert!(RewriteConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
