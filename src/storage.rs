//! Report export and small bits of local persistence.
//!
//! The storage root is injected rather than read ambiently so the core stays
//! testable against a temp directory. Reports themselves are only written when
//! the user asks; nothing is saved implicitly.

use crate::model::AnalysisParams;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Platform data dir default (`~/.local/share/cloudcost-anomaly` and
    /// equivalents).
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cloudcost-anomaly")
    }

    fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("create data dir {}", self.root.display()))
    }

    /// Save the raw report as a timestamped markdown file under the data dir.
    pub fn save_report(&self, report: &str) -> Result<PathBuf> {
        self.ensure_root()?;
        let stamp = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into())
            .replace(':', "-");
        let path = self.root.join(format!("anomaly-report-{stamp}.md"));
        std::fs::write(&path, report)
            .with_context(|| format!("write report to {}", path.display()))?;
        Ok(path)
    }

    /// Export the raw report to an explicit path.
    pub fn export_markdown(path: &Path, report: &str) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create export dir {}", parent.display()))?;
        }
        std::fs::write(path, report)
            .with_context(|| format!("write report to {}", path.display()))
    }

    fn params_path(&self) -> PathBuf {
        self.root.join("last_params.json")
    }

    /// Persist the last analysis parameters so a rerun after a restart can
    /// pre-fill the form.
    pub fn save_last_params(&self, params: &AnalysisParams) -> Result<()> {
        self.ensure_root()?;
        let json = serde_json::to_string_pretty(params)?;
        std::fs::write(self.params_path(), json).context("write last params")
    }

    pub fn load_last_params(&self) -> Option<AnalysisParams> {
        let data = std::fs::read_to_string(self.params_path()).ok()?;
        serde_json::from_str(&data).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage(tag: &str) -> Storage {
        let root = std::env::temp_dir().join(format!(
            "cloudcost-anomaly-test-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&root);
        Storage::new(root)
    }

    #[test]
    fn save_report_writes_markdown_under_root() {
        let storage = temp_storage("report");
        let path = storage.save_report("🔍 Cloud Cost Anomaly Summary\nok\n").unwrap();
        assert!(path.extension().map(|e| e == "md").unwrap_or(false));
        assert!(std::fs::read_to_string(&path).unwrap().contains("ok"));
        let _ = std::fs::remove_dir_all(&storage.root);
    }

    #[test]
    fn last_params_round_trip() {
        let storage = temp_storage("params");
        let params = AnalysisParams {
            provider: "Azure".into(),
            budget: "$2,000".into(),
            services: "VMs".into(),
        };
        storage.save_last_params(&params).unwrap();
        assert_eq!(storage.load_last_params(), Some(params));
        let _ = std::fs::remove_dir_all(&storage.root);
    }

    #[test]
    fn missing_params_file_is_none() {
        let storage = temp_storage("empty");
        assert!(storage.load_last_params().is_none());
    }
}
