//! Typed relationship graph between entity types.
//!
//! Built once at startup from explicit relation declarations. Nodes are
//! entity types, edges are named relations carrying the key accessor used to
//! read an owner id. Lookups go through a name-to-index map; edge order per
//! type follows declaration order.

use std::collections::HashMap;

use rustworkx_core::petgraph::algo::has_path_connecting;
use rustworkx_core::petgraph::graph::{DiGraph, NodeIndex};
use rustworkx_core::petgraph::visit::EdgeRef;

/// Cardinality of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The source row holds the foreign key.
    BelongsTo,
    /// The target row holds the foreign key, at most one target.
    HasOne,
    /// The target rows hold the foreign key.
    HasMany,
}

/// A named edge from one entity type to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    pub target_type: String,
    /// Attribute holding the owner key, read on whichever side exposes it.
    pub foreign_key: String,
    /// Name of the relation on the same source type this one goes through.
    pub through: Option<String>,
}

impl Relation {
    fn new(
        name: impl Into<String>,
        kind: RelationKind,
        target_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            target_type: target_type.into(),
            foreign_key: foreign_key.into(),
            through: None,
        }
    }

    #[must_use]
    pub fn belongs_to(
        name: impl Into<String>,
        target_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, RelationKind::BelongsTo, target_type, foreign_key)
    }

    #[must_use]
    pub fn has_one(
        name: impl Into<String>,
        target_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, RelationKind::HasOne, target_type, foreign_key)
    }

    #[must_use]
    pub fn has_many(
        name: impl Into<String>,
        target_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, RelationKind::HasMany, target_type, foreign_key)
    }

    #[must_use]
    pub fn through(mut self, relation: impl Into<String>) -> Self {
        self.through = Some(relation.into());
        self
    }

    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self.kind, RelationKind::HasMany)
    }

    #[must_use]
    pub const fn is_through(&self) -> bool {
        self.through.is_some()
    }
}

/// Directed graph of entity types and their relations.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    graph: DiGraph<String, Relation>,
    type_to_index: HashMap<String, NodeIndex>,
}

impl RelationshipGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a relation on `source_type`, adding both types as needed.
    pub fn add_relation(&mut self, source_type: &str, relation: Relation) -> &mut Self {
        let source = self.ensure_type(source_type);
        let target = self.ensure_type(&relation.target_type);
        self.graph.add_edge(source, target, relation);
        self
    }

    #[must_use]
    pub fn with_relation(mut self, source_type: &str, relation: Relation) -> Self {
        self.add_relation(source_type, relation);
        self
    }

    fn ensure_type(&mut self, type_name: &str) -> NodeIndex {
        if let Some(idx) = self.type_to_index.get(type_name) {
            return *idx;
        }
        let idx = self.graph.add_node(type_name.to_string());
        self.type_to_index.insert(type_name.to_string(), idx);
        idx
    }

    #[must_use]
    pub fn type_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Relations declared on a type, in declaration order.
    #[must_use]
    pub fn relations(&self, type_name: &str) -> Vec<&Relation> {
        let Some(idx) = self.type_to_index.get(type_name) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self.graph.edges(*idx).collect();
        edges.sort_by_key(|edge| edge.id().index());
        edges.into_iter().map(|edge| edge.weight()).collect()
    }

    /// Relation on `type_name` called `name`.
    #[must_use]
    pub fn relation(&self, type_name: &str, name: &str) -> Option<&Relation> {
        self.relations(type_name)
            .into_iter()
            .find(|relation| relation.name == name)
    }

    /// First declared relation on `type_name` whose target is `target_type`.
    #[must_use]
    pub fn relation_to(&self, type_name: &str, target_type: &str) -> Option<&Relation> {
        self.relations(type_name)
            .into_iter()
            .find(|relation| relation.target_type == target_type)
    }

    /// Whether any chain of relations leads from one type to another.
    #[must_use]
    pub fn reaches(&self, from_type: &str, to_type: &str) -> bool {
        match (
            self.type_to_index.get(from_type),
            self.type_to_index.get(to_type),
        ) {
            (Some(from), Some(to)) => has_path_connecting(&self.graph, *from, *to, None),
            _ => false,
        }
    }
}
