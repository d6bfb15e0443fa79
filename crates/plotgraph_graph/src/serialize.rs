// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serialized graph form and graph dictionary files.
//!
//! Graphs serialize with their node and edge lists in insertion order, so a
//! load/save round trip keeps edge order (and with it export order) intact.
//! Deserialized graphs must be passed through [`Graph::initialize`] before
//! use.

use crate::edge::{Edge, EdgeId};
use crate::graph::Graph;
use crate::node::{Node, NodeId};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors while encoding, decoding or storing graphs
#[derive(Debug, Error)]
pub enum SerializeError {
    /// JSON encode or decode failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RON encode failure
    #[error("RON encode error: {0}")]
    RonEncode(#[from] ron::Error),

    /// RON decode failure
    #[error("RON decode error: {0}")]
    RonDecode(#[from] ron::error::SpannedError),

    /// File access failure
    #[error("failed to access {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Result type for serialization
pub type Result<T> = std::result::Result<T, SerializeError>;

/// Graphs keyed by name, in file order
pub type GraphDict = IndexMap<String, Graph>;

impl Graph {
    /// Encode as JSON
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    /// Decode from JSON; the result is not initialized
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode as RON
    pub fn to_ron(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Decode from RON; the result is not initialized
    pub fn from_ron(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| SerializeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| SerializeError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| SerializeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn is_ron(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("ron"))
}

/// Load one graph; `.ron` files are read as RON, anything else as JSON
pub fn load_graph(path: impl AsRef<Path>) -> Result<Graph> {
    let path = path.as_ref();
    let text = read(path)?;
    let graph = if is_ron(path) {
        Graph::from_ron(&text)?
    } else {
        Graph::from_json(&text)?
    };
    tracing::debug!(path = %path.display(), graph = %graph.display_name, "Loaded graph");
    Ok(graph)
}

/// Save one graph; `.ron` files are written as RON, anything else as JSON
pub fn save_graph(path: impl AsRef<Path>, graph: &Graph, pretty: bool) -> Result<()> {
    let path = path.as_ref();
    let text = if is_ron(path) {
        graph.to_ron()?
    } else {
        graph.to_json(pretty)?
    };
    write(path, &text)
}

/// Load a JSON dictionary of graphs keyed by name
pub fn load_dict(path: impl AsRef<Path>) -> Result<GraphDict> {
    let path = path.as_ref();
    let dict: GraphDict = serde_json::from_str(&read(path)?)?;
    tracing::info!(path = %path.display(), graphs = dict.len(), "Loaded graph dictionary");
    Ok(dict)
}

/// Save a JSON dictionary of graphs keyed by name
pub fn save_dict(path: impl AsRef<Path>, dict: &GraphDict, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(dict)?
    } else {
        serde_json::to_string(dict)?
    };
    write(path.as_ref(), &text)
}

/// Items stored in a graph under their own id
pub(crate) trait Keyed {
    type Key: Clone + Eq + std::hash::Hash + std::fmt::Display;

    fn key(&self) -> Self::Key;

    /// Stand-in key for an item stored without an id, unique per list position
    fn pending_key(&self, _position: usize) -> Option<Self::Key> {
        None
    }
}

impl Keyed for Node {
    type Key = NodeId;

    fn key(&self) -> NodeId {
        self.id.clone()
    }

    fn pending_key(&self, position: usize) -> Option<NodeId> {
        self.id.is_empty().then(|| NodeId::pending(position))
    }
}

impl Keyed for Edge {
    type Key = EdgeId;

    fn key(&self) -> EdgeId {
        self.id.clone()
    }
}

/// Serde adapter storing an id-keyed map as a plain list
pub(crate) mod keyed_list {
    use super::Keyed;
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub(crate) fn serialize<S, K, V>(map: &IndexMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_seq(map.values())
    }

    /// Duplicate ids keep the first entry; items without an id are kept
    /// under a pending key until the graph assigns one
    pub(crate) fn deserialize<'de, D, V>(deserializer: D) -> Result<IndexMap<V::Key, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de> + Keyed,
    {
        let items = Vec::<V>::deserialize(deserializer)?;
        let mut map = IndexMap::with_capacity(items.len());
        for (position, item) in items.into_iter().enumerate() {
            let key = item.pending_key(position).unwrap_or_else(|| item.key());
            if map.contains_key(&key) {
                tracing::warn!(id = %key, "Duplicate id in serialized graph, keeping the first entry");
                continue;
            }
            map.insert(key, item);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAPH: &str = r#"{
        "displayName": "intro",
        "position": [0.0, 0.0, 0.0],
        "scale": [1.0, 1.0, 1.0],
        "nodes": [
            {"id": "1", "kind": "PlotNode", "position": {"x": 0.0, "y": 0.0, "width": 100.0, "height": 100.0},
             "expanded": true, "fields": {"nodeType": 1, "nodeDes": "start"}},
            {"id": "1", "kind": "PlotNode", "position": {"x": 0.0, "y": 0.0, "width": 100.0, "height": 100.0}}
        ],
        "edges": [
            {"id": "e2", "outputNodeId": "1", "outputFieldName": "nextNodes",
             "inputNodeId": "2", "inputFieldName": "preNodes"},
            {"id": "e1", "outputNodeId": "1", "outputFieldName": "nextNodes",
             "inputNodeId": "3", "inputFieldName": "preNodes"}
        ]
    }"#;

    #[test]
    fn test_lists_keep_order_and_drop_duplicates() {
        let graph = Graph::from_json(GRAPH).unwrap();
        assert_eq!(graph.node_count(), 1);
        let edges: Vec<_> = graph.edges().map(|e| e.id.as_str().to_string()).collect();
        assert_eq!(edges, vec!["e2", "e1"]);
        assert!(graph.groups().is_empty());
        assert!(!graph.is_initialized());
    }

    #[test]
    fn test_nodes_without_ids_are_all_kept() {
        let json = r#"{
            "displayName": "draft",
            "nodes": [
                {"kind": "PlotNode", "position": {"x": 0.0, "y": 0.0, "width": 100.0, "height": 100.0}},
                {"id": "7", "kind": "PlotNode", "position": {"x": 0.0, "y": 0.0, "width": 100.0, "height": 100.0}},
                {"kind": "PlotNode", "position": {"x": 9.0, "y": 0.0, "width": 100.0, "height": 100.0}}
            ]
        }"#;
        let graph = Graph::from_json(json).unwrap();
        assert_eq!(graph.node_count(), 3);
        let ids: Vec<_> = graph.nodes().map(|n| n.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["", "7", ""]);

        let back = Graph::from_json(&graph.to_json(false).unwrap()).unwrap();
        assert_eq!(back.node_count(), 3);
    }

    #[test]
    fn test_json_round_trip_is_stable() {
        let graph = Graph::from_json(GRAPH).unwrap();
        let once = graph.to_json(false).unwrap();
        let twice = Graph::from_json(&once).unwrap().to_json(false).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_ron_round_trip() {
        let graph = Graph::from_json(GRAPH).unwrap();
        let text = graph.to_ron().unwrap();
        let back = Graph::from_ron(&text).unwrap();
        assert_eq!(back.to_json(false).unwrap(), graph.to_json(false).unwrap());
    }

    #[test]
    fn test_missing_file() {
        let err = load_dict("/nonexistent/plot.json").unwrap_err();
        assert!(matches!(err, SerializeError::Io { .. }));
    }
}
