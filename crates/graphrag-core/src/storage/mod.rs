//! # Storage
//!
//! Persistent homes for a knowledge graph:
//! - `Redb`: [`RedbStore`], ACID and incrementally updatable
//! - `File`: a single binary file written by [`crate::formats::graph_to_bytes`]

pub mod redb_store;

pub use redb_store::RedbStore;

use crate::config::StorageKind;
use crate::construction::{ConstructionReport, Constructor};
use crate::features::apply_feature_map;
use crate::formats::{graph_from_bytes, graph_to_bytes};
use crate::graph::KnowledgeGraph;
use crate::{GraphragError, RawTriplet};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// An opened graph store.
#[derive(Debug)]
pub enum GraphStorage {
    /// In-memory graph mirrored to a file on [`GraphStorage::flush`].
    File {
        path: PathBuf,
        graph: KnowledgeGraph,
    },
    /// Disk-backed graph using redb.
    Redb(RedbStore),
}

impl GraphStorage {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>, kind: StorageKind) -> Result<Self, GraphragError> {
        let path = path.as_ref();
        match kind {
            StorageKind::Redb => Ok(Self::Redb(RedbStore::open(path)?)),
            StorageKind::File => {
                let graph = if path.exists() {
                    read_graph_file(path)?
                } else {
                    KnowledgeGraph::new()
                };
                Ok(Self::File {
                    path: path.to_path_buf(),
                    graph,
                })
            }
        }
    }

    /// Add a batch of raw triplets.
    pub fn ingest(&mut self, raws: &[RawTriplet]) -> Result<ConstructionReport, GraphragError> {
        match self {
            Self::File { graph, .. } => Constructor::ingest_batch(graph, raws),
            Self::Redb(store) => store.ingest_batch(raws),
        }
    }

    /// Attach supplied relation features. Returns names that matched no
    /// relation.
    pub fn apply_features(
        &mut self,
        map: BTreeMap<String, Vec<f32>>,
    ) -> Result<Vec<String>, GraphragError> {
        match self {
            Self::File { graph, .. } => apply_feature_map(graph, map),
            Self::Redb(store) => apply_feature_map(store, map),
        }
    }

    /// Persist pending changes. redb commits on every write, so only the
    /// file backend has work to do.
    pub fn flush(&mut self) -> Result<(), GraphragError> {
        match self {
            Self::File { path, graph } => write_graph_file(path, graph),
            Self::Redb(store) => store.compact(),
        }
    }

    /// Materialise the graph in memory.
    pub fn load_graph(&self) -> Result<KnowledgeGraph, GraphragError> {
        match self {
            Self::File { graph, .. } => Ok(graph.clone()),
            Self::Redb(store) => store.load_graph(),
        }
    }
}

/// Read a graph file written by [`write_graph_file`].
pub fn read_graph_file(path: &Path) -> Result<KnowledgeGraph, GraphragError> {
    let bytes = std::fs::read(path)
        .map_err(|e| GraphragError::IoError(format!("{}: {}", path.display(), e)))?;
    graph_from_bytes(&bytes)
}

/// Write a graph file, creating parent directories.
pub fn write_graph_file(path: &Path, graph: &KnowledgeGraph) -> Result<(), GraphragError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| GraphragError::IoError(e.to_string()))?;
    }
    let bytes = graph_to_bytes(graph)?;
    std::fs::write(path, bytes)
        .map_err(|e| GraphragError::IoError(format!("{}: {}", path.display(), e)))
}

/// Load the graph stored at `path`. The store must already exist.
pub fn open_graph(path: &Path, kind: StorageKind) -> Result<KnowledgeGraph, GraphragError> {
    if !path.exists() {
        return Err(GraphragError::IoError(format!(
            "{}: no such knowledge graph",
            path.display()
        )));
    }
    GraphStorage::open(path, kind)?.load_graph()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raws() -> Vec<RawTriplet> {
        vec![
            RawTriplet::new("a", "r", "b"),
            RawTriplet::new("b", "s", "c"),
        ]
    }

    #[test]
    fn backends_agree() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut graphs = Vec::new();
        for (name, kind) in [("kg.redb", StorageKind::Redb), ("kg.bin", StorageKind::File)] {
            let path = dir.path().join(name);
            let mut storage = GraphStorage::open(&path, kind).expect("open");
            storage.ingest(&raws()).expect("ingest");
            let unknown = storage
                .apply_features(BTreeMap::from([
                    ("r".to_string(), vec![1.0, 0.0]),
                    ("zzz".to_string(), vec![0.0, 1.0]),
                ]))
                .expect("features");
            assert_eq!(unknown, vec!["zzz".to_string()]);
            storage.flush().expect("flush");
            drop(storage);
            graphs.push(open_graph(&path, kind).expect("load"));
        }
        assert_eq!(graphs[0].triplets(), graphs[1].triplets());
        assert_eq!(graphs[0].entity_names(), graphs[1].entity_names());
        assert_eq!(
            graphs[0].relation_feature_entries().count(),
            graphs[1].relation_feature_entries().count()
        );
    }

    #[test]
    fn file_backend_extends_existing_graph() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("kg.bin");
        {
            let mut storage = GraphStorage::open(&path, StorageKind::File).expect("open");
            storage.ingest(&raws()).expect("ingest");
            storage.flush().expect("flush");
        }
        let mut storage = GraphStorage::open(&path, StorageKind::File).expect("reopen");
        let report = storage
            .ingest(&[RawTriplet::new("c", "r", "a")])
            .expect("ingest");
        assert_eq!(report.entities, 3);
        assert_eq!(report.triplets_added, 1);
    }

    #[test]
    fn missing_store_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(open_graph(&dir.path().join("none.redb"), StorageKind::Redb).is_err());
    }
}
