//! Annotation tree read model.
//!
//! # Responsibility
//! - Project the four collections into a two-level group/entry hierarchy.
//! - Expose the invalidation stream that presentation layers subscribe to.
//!
//! # Invariants
//! - Group order is fixed: Todo, Fixme, Chore, Note.
//! - Entries follow store order.
//! - Nothing is cached; every request re-reads the store.

use crate::model::annotation::{AnnotationRecord, AnnotationType};
use crate::repo::record_store::RecordStore;
use crate::service::notifier::{ChangeEvent, ChangeNotifier, SubscriptionId};
use crate::storage::StoreResult;

/// One node of the annotation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    /// Root node for one annotation type.
    Group {
        kind: AnnotationType,
        label: String,
    },
    /// Leaf node for one record.
    Entry {
        kind: AnnotationType,
        label: String,
        /// `file:line`, `file`, or empty.
        detail: String,
        tooltip: String,
        record: AnnotationRecord,
    },
}

impl TreeNode {
    pub fn label(&self) -> &str {
        match self {
            Self::Group { label, .. } | Self::Entry { label, .. } => label,
        }
    }

    pub fn kind(&self) -> AnnotationType {
        match self {
            Self::Group { kind, .. } | Self::Entry { kind, .. } => *kind,
        }
    }

    fn group(kind: AnnotationType) -> Self {
        Self::Group {
            kind,
            label: kind.label().to_string(),
        }
    }

    fn entry(kind: AnnotationType, record: AnnotationRecord) -> Self {
        let location = record.location_label();
        let tooltip = match &location {
            Some(location) => format!("{} - {location}", record.description),
            None => record.description.clone(),
        };
        Self::Entry {
            kind,
            label: record.description.clone(),
            detail: location.unwrap_or_default(),
            tooltip,
            record,
        }
    }
}

/// One group with its entries, as returned by `snapshot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeGroup {
    pub node: TreeNode,
    pub children: Vec<TreeNode>,
}

/// Read-only tree adapter over a record store.
pub struct AnnotationTree<R: RecordStore> {
    store: R,
    notifier: ChangeNotifier,
}

impl<R: RecordStore> AnnotationTree<R> {
    pub fn new(store: R, notifier: ChangeNotifier) -> Self {
        Self { store, notifier }
    }

    /// Top-level group nodes.
    pub fn roots(&self) -> Vec<TreeNode> {
        AnnotationType::ALL.into_iter().map(TreeNode::group).collect()
    }

    /// Entry nodes for one group, freshly read from the store.
    pub fn children(&self, kind: AnnotationType) -> StoreResult<Vec<TreeNode>> {
        Ok(self
            .store
            .load_entries(kind)?
            .into_iter()
            .map(|record| TreeNode::entry(kind, record))
            .collect())
    }

    /// Children of an arbitrary node; entries have none.
    pub fn children_of(&self, node: &TreeNode) -> StoreResult<Vec<TreeNode>> {
        match node {
            TreeNode::Group { kind, .. } => self.children(*kind),
            TreeNode::Entry { .. } => Ok(Vec::new()),
        }
    }

    /// Full two-level hierarchy.
    pub fn snapshot(&self) -> StoreResult<Vec<TreeGroup>> {
        self.roots()
            .into_iter()
            .map(|node| {
                let children = self.children_of(&node)?;
                Ok(TreeGroup { node, children })
            })
            .collect()
    }

    /// Registers an invalidation callback fired after each mutation.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.notifier.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }
}
