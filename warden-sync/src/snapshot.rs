//! In-memory views of the two sides being reconciled.
//!
//! ```text
//! <bundle>/
//!   workflow-manifest.yaml
//!   templates/   template workflows
//!   workflows/   primary and optional workflows
//!
//! <checkout>/.github/workflows/   destination
//! ```
//!
//! Only regular files are captured; subdirectories are ignored.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use warden_core::{manifest, ManagedWorkflowManifest, WorkflowCategory, WorkflowName};

use crate::error::{io_err, SyncError};

pub const TEMPLATES_DIR: &str = "templates";
pub const WORKFLOWS_DIR: &str = "workflows";

/// Destination directory relative to a repository checkout.
pub fn workflow_dir(checkout: &Path) -> PathBuf {
    checkout.join(".github").join("workflows")
}

/// One version of the managed workflow bundle.
#[derive(Debug, Clone, Default)]
pub struct SourceBundle {
    pub root: PathBuf,
    pub manifest: ManagedWorkflowManifest,
    pub templates: BTreeMap<WorkflowName, Vec<u8>>,
    pub workflows: BTreeMap<WorkflowName, Vec<u8>>,
}

impl SourceBundle {
    /// Read the manifest and both source directories under `root`.
    pub fn load_at(root: &Path) -> Result<Self, SyncError> {
        let manifest = manifest::load_at(root)?;
        let templates = read_regular_files(&root.join(TEMPLATES_DIR))?;
        let workflows = read_regular_files(&root.join(WORKFLOWS_DIR))?;
        tracing::debug!(
            bundle = %root.display(),
            templates = templates.len(),
            workflows = workflows.len(),
            "loaded workflow bundle"
        );
        Ok(Self {
            root: root.to_path_buf(),
            manifest,
            templates,
            workflows,
        })
    }

    /// Source bytes for `name` in `category`.
    pub fn source(&self, category: WorkflowCategory, name: &WorkflowName) -> Option<&[u8]> {
        let files = match category {
            WorkflowCategory::Template => &self.templates,
            WorkflowCategory::Primary | WorkflowCategory::Optional => &self.workflows,
        };
        files.get(name).map(Vec::as_slice)
    }
}

/// Regular files currently in a repository's workflow directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowDirState {
    pub files: BTreeMap<WorkflowName, Vec<u8>>,
}

impl WorkflowDirState {
    /// Capture `<checkout>/.github/workflows`. A missing directory is empty.
    pub fn load_at(checkout: &Path) -> Result<Self, SyncError> {
        Ok(Self {
            files: read_regular_files(&workflow_dir(checkout))?,
        })
    }

    pub fn get(&self, name: &WorkflowName) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &WorkflowName> {
        self.files.keys()
    }
}

impl<N: Into<WorkflowName>, B: Into<Vec<u8>>> FromIterator<(N, B)> for WorkflowDirState {
    fn from_iter<I: IntoIterator<Item = (N, B)>>(iter: I) -> Self {
        Self {
            files: iter
                .into_iter()
                .map(|(n, b)| (n.into(), b.into()))
                .collect(),
        }
    }
}

fn read_regular_files(dir: &Path) -> Result<BTreeMap<WorkflowName, Vec<u8>>, SyncError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(io_err(dir, err)),
    };

    let mut files = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        // metadata() follows symlinks, matching a plain read of the file.
        let meta = std::fs::metadata(&path).map_err(|e| io_err(&path, e))?;
        if !meta.is_file() {
            continue;
        }
        let bytes = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
        let name = WorkflowName::from(entry.file_name().to_string_lossy().into_owned());
        files.insert(name, bytes);
    }
    Ok(files)
}
