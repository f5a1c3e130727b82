//! Workspace management for reconciliation state

use crate::config::ReconConfig;
use crate::error::{Result, TabreconError};
use crate::store::MemoryStore;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

const WORKSPACE_DIR: &str = ".tabrecon";

/// Manages the .tabrecon workspace directory
#[derive(Debug, Clone)]
pub struct TabreconWorkspace {
    /// Project root directory (where .tabrecon/ lives)
    pub root: PathBuf,
    /// .tabrecon/ directory path
    pub tabrecon_dir: PathBuf,
    /// .tabrecon/exports/ directory path
    pub exports_dir: PathBuf,
}

impl TabreconWorkspace {
    /// Find an existing workspace above `start_dir`, or create one there
    pub fn find_or_create(start_dir: Option<&Path>) -> Result<Self> {
        let current_dir = std::env::current_dir()?;
        let start = start_dir.unwrap_or(&current_dir);

        if let Some(workspace) = Self::find_existing(start)? {
            return Ok(workspace);
        }

        Self::create_new(start.to_path_buf())
    }

    /// Walk up from `start_dir` looking for .tabrecon, stopping at a git root
    pub fn find_existing(start_dir: &Path) -> Result<Option<Self>> {
        let mut current = start_dir;

        loop {
            let candidate = current.join(WORKSPACE_DIR);
            if candidate.is_dir() {
                return Ok(Some(Self::from_root(current.to_path_buf())));
            }
            if current.join(".git").exists() {
                break;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        Ok(None)
    }

    pub fn create_new(root: PathBuf) -> Result<Self> {
        let workspace = Self::from_root(root);

        fs::create_dir_all(&workspace.tabrecon_dir)?;
        fs::create_dir_all(&workspace.exports_dir)?;
        workspace.create_config_with_force(false)?;
        workspace.ensure_gitignore()?;

        log::info!("Created tabrecon workspace at: {}", workspace.root.display());
        Ok(workspace)
    }

    pub fn from_root(root: PathBuf) -> Self {
        let tabrecon_dir = root.join(WORKSPACE_DIR);
        let exports_dir = tabrecon_dir.join("exports");
        Self {
            root,
            tabrecon_dir,
            exports_dir,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.tabrecon_dir.join("config.json")
    }

    pub fn store_path(&self) -> PathBuf {
        self.tabrecon_dir.join("store.json")
    }

    /// Default export location for a workflow
    pub fn export_path(&self, workflow_name: &str, extension: &str) -> PathBuf {
        let stem: String = workflow_name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.exports_dir.join(format!("{}.{}", stem, extension))
    }

    /// Write the default config unless one exists or `force` is set
    pub fn create_config_with_force(&self, force: bool) -> Result<()> {
        let config_path = self.config_path();
        if config_path.exists() && !force {
            return Ok(());
        }
        ReconConfig::default().save(&config_path)
    }

    pub fn load_config(&self) -> Result<ReconConfig> {
        ReconConfig::load_or_default(&self.config_path())
    }

    pub fn load_store(&self) -> Result<MemoryStore> {
        let path = self.store_path();
        MemoryStore::load(&path).map_err(|e| match e {
            TabreconError::Json(err) => TabreconError::workspace(format!(
                "Corrupt store {}: {}",
                path.display(),
                err
            )),
            other => other,
        })
    }

    /// Persist the store, replacing the previous document in one rename
    pub fn save_store(&self, store: &MemoryStore) -> Result<()> {
        fs::create_dir_all(&self.tabrecon_dir)?;
        let path = self.store_path();
        let staging = path.with_extension("json.tmp");
        store.save(&staging)?;
        fs::rename(&staging, &path)
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    /// Ensure .gitignore keeps the store and exports out of version control
    pub fn ensure_gitignore(&self) -> Result<()> {
        let gitignore_path = self.root.join(".gitignore");
        let entries = "# Reconciliation state and exports\n.tabrecon/store.json\n.tabrecon/exports/\n";

        if gitignore_path.exists() {
            let content = fs::read_to_string(&gitignore_path)?;
            if !content.contains(".tabrecon/store.json") {
                let new_content = if content.ends_with('\n') {
                    format!("{}\n{}", content, entries)
                } else {
                    format!("{}\n\n{}", content, entries)
                };
                fs::write(gitignore_path, new_content)?;
                log::info!("Updated .gitignore with tabrecon entries");
            }
        } else {
            fs::write(gitignore_path, entries)?;
            log::info!("Created .gitignore with tabrecon entries");
        }

        Ok(())
    }
}
