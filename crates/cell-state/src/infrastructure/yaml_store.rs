//! Directory store backed by a YAML snapshot file.
//!
//! The file holds the three directory tables:
//!
//! ```yaml
//! cells:
//!   - name: child1
//!     id: 2
//!     is_parent: false
//!     transport_host: child1.cells.local
//! compute_nodes:
//!   - free_ram_mb: 4096
//!     free_disk_gb: 50
//!     service: { host: host1, disabled: false }
//! instance_types:
//!   - name: m1.small
//!     memory_mb: 1024
//!     root_gb: 10
//! ```
//!
//! The file is read again on every fetch, so edits take effect at the next
//! synchronization pass.

use std::path::{Path, PathBuf};

use api_types::CellRecord;
use api_types::ComputeNodeRecord;
use api_types::InstanceTypeRecord;
use error_stack::ResultExt;
use serde::Deserialize;
use tracing::debug;

use crate::cells::traits::DirectoryStore;
use crate::cells::types::StoreResult;
use crate::cells::{QueryContext, StoreError};

/// Contents of a directory snapshot file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub cells: Vec<CellRecord>,
    #[serde(default)]
    pub compute_nodes: Vec<ComputeNodeRecord>,
    #[serde(default)]
    pub instance_types: Vec<InstanceTypeRecord>,
}

pub struct YamlDirectoryStore {
    path: PathBuf,
}

impl YamlDirectoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self, ctxt: &QueryContext) -> StoreResult<DirectorySnapshot> {
        debug!(
            request_id = %ctxt.request_id,
            path = %self.path.display(),
            "Reading directory snapshot"
        );

        let content = std::fs::read_to_string(&self.path)
            .change_context(StoreError::Unavailable {
                message: format!("cannot read {}", self.path.display()),
            })?;

        // An empty file is an empty directory
        if content.trim().is_empty() {
            return Ok(DirectorySnapshot::default());
        }

        serde_yaml::from_str(&content).change_context(StoreError::Decode {
            message: format!("invalid snapshot in {}", self.path.display()),
        })
    }
}

impl DirectoryStore for YamlDirectoryStore {
    fn cell_get_all(&self, ctxt: &QueryContext) -> StoreResult<Vec<CellRecord>> {
        Ok(self.load(ctxt)?.cells)
    }

    fn compute_node_get_all(&self, ctxt: &QueryContext) -> StoreResult<Vec<ComputeNodeRecord>> {
        Ok(self.load(ctxt)?.compute_nodes)
    }

    fn instance_type_get_all(
        &self,
        ctxt: &QueryContext,
    ) -> StoreResult<Vec<InstanceTypeRecord>> {
        Ok(self.load(ctxt)?.instance_types)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use similar_asserts::assert_eq;
    use tempfile::NamedTempFile;
    use test_log::test;

    use super::*;

    const SNAPSHOT: &str = r#"
cells:
  - name: parent1
    id: 1
    is_parent: true
    username: cells
    password: s3cret
    transport_host: parent1.cells.local
    transport_port: 5672
  - name: child1
    id: 2
    is_parent: false
compute_nodes:
  - free_ram_mb: 4096
    free_disk_gb: 50
    service:
      host: host1
  - free_ram_mb: 2048
    free_disk_gb: 20
    service:
      host: host2
      disabled: true
  - free_ram_mb: 512
    free_disk_gb: 5
instance_types:
  - name: m1.small
    memory_mb: 1024
    root_gb: 10
  - name: m1.large
    memory_mb: 4096
    root_gb: 40
    ephemeral_gb: 20
"#;

    fn snapshot_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("should create temp file");
        file.write_all(content.as_bytes())
            .expect("should write snapshot");
        file
    }

    fn ctxt() -> QueryContext {
        QueryContext::admin("req-test")
    }

    #[test]
    fn reads_all_three_tables() {
        let file = snapshot_file(SNAPSHOT);
        let store = YamlDirectoryStore::new(file.path());

        let cells = store.cell_get_all(&ctxt()).expect("should read cells");
        assert_eq!(cells.len(), 2);
        assert!(cells[0].is_parent);
        assert_eq!(cells[0].transport_port, Some(5672));
        assert_eq!(cells[1].weight_scale, 1.0);
        assert_eq!(cells[1].username, None);

        let nodes = store
            .compute_node_get_all(&ctxt())
            .expect("should read compute nodes");
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1].service.as_ref().map(|s| s.disabled), Some(true));
        assert!(nodes[2].service.is_none());

        let types = store
            .instance_type_get_all(&ctxt())
            .expect("should read instance types");
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].ephemeral_gb, 0);
        assert_eq!(types[1].ephemeral_gb, 20);
    }

    #[test]
    fn picks_up_edits_between_fetches() {
        let file = snapshot_file("cells: []\n");
        let store = YamlDirectoryStore::new(file.path());
        assert!(store.cell_get_all(&ctxt()).expect("should read").is_empty());

        std::fs::write(file.path(), SNAPSHOT).expect("should rewrite snapshot");
        assert_eq!(store.cell_get_all(&ctxt()).expect("should read").len(), 2);
    }

    #[test]
    fn empty_file_is_empty_directory() {
        let file = snapshot_file("");
        let store = YamlDirectoryStore::new(file.path());

        assert!(store.cell_get_all(&ctxt()).expect("should read").is_empty());
        assert!(store
            .compute_node_get_all(&ctxt())
            .expect("should read")
            .is_empty());
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store = YamlDirectoryStore::new(dir.path().join("missing.yaml"));

        let report = store.cell_get_all(&ctxt()).expect_err("should fail");
        assert!(matches!(
            report.current_context(),
            StoreError::Unavailable { .. }
        ));
    }

    #[test]
    fn malformed_file_is_decode_error() {
        let file = snapshot_file("cells:\n  - name: [broken\n");
        let store = YamlDirectoryStore::new(file.path());

        let report = store.cell_get_all(&ctxt()).expect_err("should fail");
        assert!(matches!(report.current_context(), StoreError::Decode { .. }));
    }
}
