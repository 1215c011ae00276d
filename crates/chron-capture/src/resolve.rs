//! Owner resolution over the relationship graph.
//!
//! Starting from the mutated entity, read the owner's foreign key directly
//! when the entity exposes it; otherwise follow one hop (the `through`
//! relation when declared) and try again on whatever was reached. A
//! collection anywhere on the path turns the key into a list.

use chron_core::keys::EntityKey;
use serde_json::Value;

use crate::entity::EntitySnapshot;
use crate::error::CaptureError;
use crate::graph::{Relation, RelationshipGraph};
use crate::provider::EntityProvider;

/// Owner key(s) found for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OwnerKey {
    /// No owner. Downstream treats the record as unassociated.
    #[default]
    None,
    One(EntityKey),
    Many(Vec<EntityKey>),
}

impl OwnerKey {
    /// Interpret a raw attribute value. Arrays become `Many`.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => Self::from_keys(items.iter().filter_map(EntityKey::from_value)),
            other => EntityKey::from_value(other).map_or(Self::None, Self::One),
        }
    }

    /// Build from already-resolved keys, e.g. the owner ids carried on a
    /// queued payload.
    #[must_use]
    pub fn from_keys(keys: impl IntoIterator<Item = EntityKey>) -> Self {
        let keys: Vec<EntityKey> = keys.into_iter().collect();
        if keys.is_empty() { Self::None } else { Self::Many(keys) }
    }

    /// Distinct keys in first-seen order.
    #[must_use]
    pub fn keys(&self) -> Vec<EntityKey> {
        match self {
            Self::None => Vec::new(),
            Self::One(key) => vec![key.clone()],
            Self::Many(keys) => {
                let mut distinct: Vec<EntityKey> = Vec::with_capacity(keys.len());
                for key in keys {
                    if !distinct.contains(key) {
                        distinct.push(key.clone());
                    }
                }
                distinct
            }
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// The owner type and key(s) a mutated entity resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOwner {
    pub owner_type: String,
    pub key: OwnerKey,
}

impl ResolvedOwner {
    #[must_use]
    pub fn new(owner_type: impl Into<String>, key: OwnerKey) -> Self {
        Self {
            owner_type: owner_type.into(),
            key,
        }
    }

    #[must_use]
    pub fn keys(&self) -> Vec<EntityKey> {
        self.key.keys()
    }
}

enum Reached {
    One(EntitySnapshot),
    Many(Vec<EntitySnapshot>),
}

impl Reached {
    fn type_name(&self) -> Option<&str> {
        match self {
            Self::One(entity) => Some(&entity.type_name),
            Self::Many(entities) => entities.first().map(|e| e.type_name.as_str()),
        }
    }

    fn entities(&self) -> &[EntitySnapshot] {
        match self {
            Self::One(entity) => std::slice::from_ref(entity),
            Self::Many(entities) => entities,
        }
    }
}

/// Resolve the `owner_type` owner of `entity`.
///
/// Returns `Ok(None)` when `entity`'s type declares no relation to
/// `owner_type`. A declared relation that leads nowhere yields
/// [`OwnerKey::None`].
///
/// # Errors
///
/// Returns [`CaptureError::Host`] if following a relation fails in the host.
pub fn resolve_owner<P: EntityProvider + ?Sized>(
    graph: &RelationshipGraph,
    provider: &P,
    entity: &EntitySnapshot,
    owner_type: &str,
) -> Result<Option<ResolvedOwner>, CaptureError> {
    let Some(relation) = graph.relation_to(&entity.type_name, owner_type) else {
        return Ok(None);
    };
    let key = if graph.reaches(&entity.type_name, owner_type) {
        lookup(graph, provider, &Reached::One(entity.clone()), relation, owner_type, 0)?
    } else {
        OwnerKey::None
    };
    Ok(Some(ResolvedOwner::new(relation.target_type.clone(), key)))
}

fn exposed_key(reached: &Reached, foreign_key: &str) -> Option<OwnerKey> {
    match reached {
        Reached::One(entity) => entity.attr(foreign_key).map(OwnerKey::from_value),
        Reached::Many(entities) => {
            let values: Option<Vec<&Value>> = entities.iter().map(|e| e.attr(foreign_key)).collect();
            values.map(|values| {
                OwnerKey::from_keys(
                    values
                        .into_iter()
                        .flat_map(|v| OwnerKey::from_value(v).keys()),
                )
            })
        }
    }
}

fn lookup<P: EntityProvider + ?Sized>(
    graph: &RelationshipGraph,
    provider: &P,
    reached: &Reached,
    relation: &Relation,
    owner_type: &str,
    depth: usize,
) -> Result<OwnerKey, CaptureError> {
    if let Some(key) = exposed_key(reached, &relation.foreign_key) {
        return Ok(key);
    }
    if depth > graph.type_count() {
        return Ok(OwnerKey::None);
    }
    let Some(source_type) = reached.type_name() else {
        return Ok(OwnerKey::None);
    };
    let hop_name = relation.through.as_deref().unwrap_or(&relation.name);
    let Some(hop) = graph.relation(source_type, hop_name) else {
        return Ok(OwnerKey::None);
    };

    let mut followed = Vec::new();
    for entity in reached.entities() {
        followed.extend(provider.follow(entity, hop)?);
    }
    if followed.is_empty() {
        return Ok(OwnerKey::None);
    }
    let collection = matches!(reached, Reached::Many(_)) || hop.is_collection();
    let next = if collection {
        Reached::Many(followed)
    } else {
        Reached::One(followed.swap_remove(0))
    };

    if hop.target_type == owner_type {
        return Ok(match next {
            Reached::One(entity) => entity.id.map_or(OwnerKey::None, OwnerKey::One),
            Reached::Many(entities) => {
                OwnerKey::from_keys(entities.into_iter().filter_map(|e| e.id))
            }
        });
    }
    let Some(next_relation) = graph.relation_to(&hop.target_type, owner_type) else {
        return Ok(OwnerKey::None);
    };
    lookup(graph, provider, &next, next_relation, owner_type, depth + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEntities;
    use pretty_assertions::assert_eq;

    fn graph() -> RelationshipGraph {
        RelationshipGraph::new()
            .with_relation("User", Relation::belongs_to("department", "Department", "department_id"))
            .with_relation("Comment", Relation::belongs_to("post", "Post", "post_id"))
            .with_relation("Post", Relation::belongs_to("author", "User", "author_id"))
            .with_relation("Comment", Relation::belongs_to("author", "User", "author_id").through("post"))
            .with_relation("Student", Relation::has_many("enrollments", "Enrollment", "student_id"))
            .with_relation(
                "Student",
                Relation::has_many("courses", "Course", "course_id").through("enrollments"),
            )
            .with_relation("Enrollment", Relation::belongs_to("course", "Course", "course_id"))
    }

    fn key(n: i64) -> Option<EntityKey> {
        Some(EntityKey::Int(n))
    }

    #[test]
    fn direct_foreign_key() {
        let user = EntitySnapshot::new("User", key(7)).with_attr("department_id", 3);
        let owner = resolve_owner(&graph(), &InMemoryEntities::new(), &user, "Department")
            .unwrap()
            .unwrap();
        assert_eq!(owner, ResolvedOwner::new("Department", OwnerKey::One(EntityKey::Int(3))));
    }

    #[test]
    fn no_relation_is_unassociated() {
        let user = EntitySnapshot::new("User", key(7));
        assert_eq!(
            resolve_owner(&graph(), &InMemoryEntities::new(), &user, "Course").unwrap(),
            None
        );
    }

    #[test]
    fn multi_hop_through_relation() {
        let entities = InMemoryEntities::new();
        entities.upsert(EntitySnapshot::new("Post", key(5)).with_attr("author_id", 11));
        let comment = EntitySnapshot::new("Comment", key(1)).with_attr("post_id", 5);
        let owner = resolve_owner(&graph(), &entities, &comment, "User").unwrap().unwrap();
        assert_eq!(owner.keys(), vec![EntityKey::Int(11)]);
    }

    #[test]
    fn collection_fans_in_to_many_keys() {
        let entities = InMemoryEntities::new();
        for (id, course) in [(1, 10), (2, 20), (3, 10)] {
            entities.upsert(
                EntitySnapshot::new("Enrollment", key(id))
                    .with_attr("student_id", 4)
                    .with_attr("course_id", course),
            );
        }
        let student = EntitySnapshot::new("Student", key(4)).with_attr("name", "Lin");
        let owner = resolve_owner(&graph(), &entities, &student, "Course").unwrap().unwrap();
        assert_eq!(owner.key, OwnerKey::Many(vec![EntityKey::Int(10), EntityKey::Int(20), EntityKey::Int(10)]));
        assert_eq!(owner.keys(), vec![EntityKey::Int(10), EntityKey::Int(20)]);
    }

    #[test]
    fn dangling_path_resolves_to_none() {
        let comment = EntitySnapshot::new("Comment", key(1)).with_attr("post_id", 404);
        let owner = resolve_owner(&graph(), &InMemoryEntities::new(), &comment, "User")
            .unwrap()
            .unwrap();
        assert!(owner.key.is_none());
    }

    #[test]
    fn array_valued_key_attribute() {
        let value = serde_json::json!([1, null, "", 2]);
        assert_eq!(
            OwnerKey::from_value(&value),
            OwnerKey::Many(vec![EntityKey::Int(1), EntityKey::Int(2)])
        );
    }
}
