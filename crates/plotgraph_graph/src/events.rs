// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph change notifications.
//!
//! Listeners are fire-and-forget: the graph never reads anything back from
//! them, and a mutation completes before its event is delivered.

use crate::edge::EdgeId;
use crate::node::NodeId;
use std::fmt;

/// A change applied to a graph
#[derive(Debug, Clone, PartialEq)]
pub enum GraphChange {
    /// A node was added
    NodeAdded(NodeId),
    /// A node was removed
    NodeRemoved(NodeId),
    /// The host reported an unspecified change on a node
    NodeChanged(NodeId),
    /// An edge was added
    EdgeAdded(EdgeId),
    /// An edge was removed
    EdgeRemoved(EdgeId),
    /// A field value changed
    FieldChanged {
        /// Owning node
        node: NodeId,
        /// Field name
        field: String,
    },
    /// The port set of a field changed
    PortsUpdated {
        /// Owning node
        node: NodeId,
        /// Field name
        field: String,
    },
    /// A group was added
    GroupAdded(String),
    /// A group was removed
    GroupRemoved(String),
    /// A sticky note was added
    StickyNoteAdded(String),
    /// A sticky note was removed
    StickyNoteRemoved(String),
    /// A pinned element was opened
    PinnedOpened(String),
    /// A pinned element was closed
    PinnedClosed(String),
    /// Exposed parameters were added or removed
    ParameterListChanged,
    /// An exposed parameter was renamed or its settings changed
    ParameterModified(String),
    /// An exposed parameter value changed
    ParameterValueChanged(String),
}

/// Callback receiving graph changes
pub type ChangeListener = Box<dyn Fn(&GraphChange) + Send + Sync>;

/// Handle returned by [`GraphEvents::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Change notification bus owned by a graph
#[derive(Default)]
pub struct GraphEvents {
    listeners: Vec<(ListenerId, ChangeListener)>,
    next_id: u64,
}

impl GraphEvents {
    /// Register a listener
    pub fn subscribe(&mut self, listener: ChangeListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener; returns false if it was not registered
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub(crate) fn emit(&self, change: GraphChange) {
        tracing::trace!(?change, "Graph change");
        for (_, listener) in &self.listeners {
            listener(&change);
        }
    }
}

/// Listeners belong to one graph instance; a cloned graph starts with none
impl Clone for GraphEvents {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl fmt::Debug for GraphEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphEvents")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_subscribe_and_emit() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut events = GraphEvents::default();
        let sink = seen.clone();
        let id = events.subscribe(Box::new(move |c| sink.lock().unwrap().push(c.clone())));

        events.emit(GraphChange::NodeAdded(NodeId::from("1")));
        assert!(events.unsubscribe(id));
        events.emit(GraphChange::NodeRemoved(NodeId::from("1")));

        assert_eq!(*seen.lock().unwrap(), vec![GraphChange::NodeAdded(NodeId::from("1"))]);
        assert!(!events.unsubscribe(id));
    }

    #[test]
    fn test_clone_drops_listeners() {
        let mut events = GraphEvents::default();
        events.subscribe(Box::new(|_| {}));
        assert_eq!(events.len(), 1);
        assert!(events.clone().is_empty());
    }
}
