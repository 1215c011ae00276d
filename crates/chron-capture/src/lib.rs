//! Change capture for Chronicle.
//!
//! Turns host mutation events into audit drafts: filter the diff, resolve
//! the owning entity over a typed relationship graph, attach snapshots and
//! fan the draft out across owners and field partitions.

pub mod auditor;
pub mod enrich;
pub mod entity;
pub mod error;
pub mod expand;
pub mod extract;
pub mod graph;
pub mod memory;
pub mod policy;
pub mod provider;
pub mod resolve;

pub use auditor::{Auditor, Capture};
pub use entity::{AttributeChange, EntitySnapshot, Mutation};
pub use error::CaptureError;
pub use graph::{Relation, RelationKind, RelationshipGraph};
pub use memory::InMemoryEntities;
pub use policy::{AuditOptions, AuditPolicy, AuditRegistry, FieldPartition, Transformer};
pub use provider::EntityProvider;
pub use resolve::{OwnerKey, ResolvedOwner};
