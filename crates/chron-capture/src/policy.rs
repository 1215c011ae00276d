//! Per-type audit policies and the registry that owns them.
//!
//! A policy is computed once when a type is registered and is fixed for the
//! registry's lifetime, except for the `enabled` flag which callers toggle
//! around bulk operations.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use chron_config::AuditConfig;
use chron_core::enums::AuditAction;

use crate::error::CaptureError;
use crate::graph::RelationshipGraph;

/// Pull selected fields of a related entity in place of a raw id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformer {
    /// Relation on the audited type that the id points through.
    pub relation: String,
    pub fields: Vec<String>,
}

impl Transformer {
    #[must_use]
    pub fn new(relation: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            relation: relation.into(),
            fields: fields.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Fields of the audited type that also belong to another owner's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPartition {
    pub target_type: String,
    pub fields: Vec<String>,
}

impl FieldPartition {
    #[must_use]
    pub fn new(target_type: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            target_type: target_type.into(),
            fields: fields.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Options accepted when registering a type.
#[derive(Debug, Clone)]
pub struct AuditOptions {
    only: Option<Vec<String>>,
    except: Vec<String>,
    on: Option<Vec<AuditAction>>,
    primary_key: String,
    associated_with: Option<String>,
    transformers: BTreeMap<String, Transformer>,
    field_partitions: Vec<FieldPartition>,
    audited_associations: Vec<(String, Self)>,
    store_objects_info: bool,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            only: None,
            except: Vec::new(),
            on: None,
            primary_key: "id".into(),
            associated_with: None,
            transformers: BTreeMap::new(),
            field_partitions: Vec::new(),
            audited_associations: Vec::new(),
            store_objects_info: true,
        }
    }
}

impl AuditOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Audit only these attributes.
    #[must_use]
    pub fn only(mut self, attributes: &[&str]) -> Self {
        self.only = Some(attributes.iter().map(ToString::to_string).collect());
        self
    }

    /// Never audit these attributes, on top of the defaults.
    #[must_use]
    pub fn except(mut self, attributes: &[&str]) -> Self {
        self.except
            .extend(attributes.iter().map(ToString::to_string));
        self
    }

    /// Audit only these actions.
    #[must_use]
    pub fn on(mut self, actions: &[AuditAction]) -> Self {
        self.on = Some(actions.to_vec());
        self
    }

    #[must_use]
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// File every record under the owner of this type as well.
    #[must_use]
    pub fn associated_with(mut self, owner_type: impl Into<String>) -> Self {
        self.associated_with = Some(owner_type.into());
        self
    }

    #[must_use]
    pub fn transform(mut self, attribute: impl Into<String>, transformer: Transformer) -> Self {
        self.transformers.insert(attribute.into(), transformer);
        self
    }

    /// Add one entry to the field-partition map. Entries keep insertion order.
    #[must_use]
    pub fn field_partition(mut self, partition: FieldPartition) -> Self {
        self.field_partitions.push(partition);
        self
    }

    /// Also audit the type behind `relation`, owned by this type.
    #[must_use]
    pub fn audit_association(mut self, relation: impl Into<String>, options: Self) -> Self {
        self.audited_associations.push((relation.into(), options));
        self
    }

    #[must_use]
    pub const fn store_objects_info(mut self, enabled: bool) -> Self {
        self.store_objects_info = enabled;
        self
    }
}

/// Which columns of a type reach `audited_changes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnFilter {
    Ignore(BTreeSet<String>),
    Only(BTreeSet<String>),
}

impl ColumnFilter {
    #[must_use]
    pub fn is_audited(&self, column: &str) -> bool {
        match self {
            Self::Ignore(ignored) => !ignored.contains(column),
            Self::Only(allowed) => allowed.contains(column),
        }
    }
}

/// Global defaults every policy starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDefaults {
    pub ignored_attributes: Vec<String>,
    pub inheritance_column: String,
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self::from(&AuditConfig::default())
    }
}

impl From<&AuditConfig> for CaptureDefaults {
    fn from(config: &AuditConfig) -> Self {
        Self {
            ignored_attributes: config.ignored_attributes.clone(),
            inheritance_column: config.inheritance_column.clone(),
        }
    }
}

/// The fixed audit configuration of one entity type.
#[derive(Debug)]
pub struct AuditPolicy {
    pub type_name: String,
    pub columns: ColumnFilter,
    pub actions: BTreeSet<AuditAction>,
    pub associated_with: Option<String>,
    pub transformers: BTreeMap<String, Transformer>,
    pub field_partitions: Vec<FieldPartition>,
    pub store_objects_info: bool,
    /// Types registered through `audit_association`, paused together.
    pub associated_types: Vec<String>,
    enabled: AtomicBool,
}

impl AuditPolicy {
    fn new(type_name: &str, options: &AuditOptions, defaults: &CaptureDefaults) -> Self {
        let columns = match options.only {
            Some(ref only) => ColumnFilter::Only(only.iter().cloned().collect()),
            None => {
                let mut ignored: BTreeSet<String> =
                    defaults.ignored_attributes.iter().cloned().collect();
                ignored.insert(options.primary_key.clone());
                ignored.insert(defaults.inheritance_column.clone());
                ignored.insert("updated_at".into());
                ignored.extend(options.except.iter().cloned());
                ColumnFilter::Ignore(ignored)
            }
        };
        let actions = options
            .on
            .as_ref()
            .map_or_else(|| AuditAction::ALL.into_iter().collect(), |on| on.iter().copied().collect());
        Self {
            type_name: type_name.to_string(),
            columns,
            actions,
            associated_with: options.associated_with.clone(),
            transformers: options.transformers.clone(),
            field_partitions: options.field_partitions.clone(),
            store_objects_info: options.store_objects_info,
            associated_types: Vec::new(),
            enabled: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn is_audited_column(&self, column: &str) -> bool {
        self.columns.is_audited(column)
    }

    #[must_use]
    pub fn audits(&self, action: AuditAction) -> bool {
        self.actions.contains(&action)
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::SeqCst)
    }
}

/// All audited types plus the relationship graph they are resolved over.
#[derive(Debug)]
pub struct AuditRegistry {
    graph: RelationshipGraph,
    defaults: CaptureDefaults,
    policies: HashMap<String, AuditPolicy>,
}

impl AuditRegistry {
    #[must_use]
    pub fn new(graph: RelationshipGraph, defaults: CaptureDefaults) -> Self {
        Self {
            graph,
            defaults,
            policies: HashMap::new(),
        }
    }

    #[must_use]
    pub fn from_config(graph: RelationshipGraph, config: &AuditConfig) -> Self {
        Self::new(graph, CaptureDefaults::from(config))
    }

    #[must_use]
    pub const fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    /// Register `type_name` for auditing. Registering a type twice is a no-op.
    ///
    /// Each `audit_association` entry registers the related type with
    /// `associated_with` set to `type_name`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::UnknownRelation`] if an audited association or
    /// a transformer names a relation the graph does not declare.
    pub fn audited(&mut self, type_name: &str, options: AuditOptions) -> Result<(), CaptureError> {
        if self.policies.contains_key(type_name) {
            return Ok(());
        }
        for transformer in options.transformers.values() {
            self.require_relation(type_name, &transformer.relation)?;
        }

        let mut associated_types = Vec::new();
        for (relation_name, child_options) in &options.audited_associations {
            let target = self.require_relation(type_name, relation_name)?.target_type.clone();
            let child_options = child_options.clone().associated_with(type_name);
            self.audited(&target, child_options)?;
            associated_types.push(target);
        }

        let mut policy = AuditPolicy::new(type_name, &options, &self.defaults);
        policy.associated_types = associated_types;
        tracing::debug!(type_name, associated_with = ?policy.associated_with, "registered audited type");
        self.policies.insert(type_name.to_string(), policy);
        Ok(())
    }

    fn require_relation(
        &self,
        type_name: &str,
        relation: &str,
    ) -> Result<&crate::graph::Relation, CaptureError> {
        self.graph
            .relation(type_name, relation)
            .ok_or_else(|| CaptureError::UnknownRelation {
                type_name: type_name.to_string(),
                relation: relation.to_string(),
            })
    }

    #[must_use]
    pub fn policy(&self, type_name: &str) -> Option<&AuditPolicy> {
        self.policies.get(type_name)
    }

    pub fn disable_auditing(&self, type_name: &str) {
        if let Some(policy) = self.policies.get(type_name) {
            policy.set_enabled(false);
        }
    }

    pub fn enable_auditing(&self, type_name: &str) {
        if let Some(policy) = self.policies.get(type_name) {
            policy.set_enabled(true);
        }
    }

    /// Pause auditing for `type_name` and its audited associations until the
    /// returned guard drops. Prior flags are restored on drop, including
    /// during unwinding.
    #[must_use = "auditing resumes as soon as the guard is dropped"]
    pub fn without_auditing(&self, type_name: &str) -> AuditingPause<'_> {
        let mut previous = Vec::new();
        if let Some(policy) = self.policies.get(type_name) {
            previous.push((type_name.to_string(), policy.set_enabled(false)));
            for associated in &policy.associated_types {
                if let Some(child) = self.policies.get(associated) {
                    previous.push((associated.clone(), child.set_enabled(false)));
                }
            }
        }
        AuditingPause {
            registry: self,
            previous,
        }
    }

    /// Run `f` with auditing paused for `type_name`.
    pub fn without_auditing_scope<T>(&self, type_name: &str, f: impl FnOnce() -> T) -> T {
        let _pause = self.without_auditing(type_name);
        f()
    }
}

/// Restores audit flags when dropped.
#[derive(Debug)]
pub struct AuditingPause<'a> {
    registry: &'a AuditRegistry,
    previous: Vec<(String, bool)>,
}

impl Drop for AuditingPause<'_> {
    fn drop(&mut self) {
        // Reverse order so a type listed twice ends at its original flag.
        for (type_name, was_enabled) in self.previous.iter().rev() {
            if let Some(policy) = self.registry.policies.get(type_name) {
                policy.set_enabled(*was_enabled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Relation;
    use rstest::rstest;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    fn registry() -> AuditRegistry {
        let graph = RelationshipGraph::new()
            .with_relation("Department", Relation::has_many("users", "User", "department_id"))
            .with_relation("User", Relation::belongs_to("department", "Department", "department_id"));
        let mut registry = AuditRegistry::new(graph, CaptureDefaults::default());
        registry
            .audited(
                "Department",
                AuditOptions::new().audit_association("users", AuditOptions::new().except(&["password"])),
            )
            .unwrap();
        registry
    }

    #[test]
    fn default_ignored_columns() {
        let registry = registry();
        let user = registry.policy("User").unwrap();
        for column in ["id", "type", "created_at", "updated_at", "lock_version", "password"] {
            assert!(!user.is_audited_column(column), "{column} should be ignored");
        }
        assert!(user.is_audited_column("name"));
        assert_eq!(user.associated_with.as_deref(), Some("Department"));
    }

    #[rstest]
    #[case(AuditOptions::new(), "uuid", true)]
    #[case(AuditOptions::new().primary_key("uuid"), "uuid", false)]
    #[case(AuditOptions::new().primary_key("uuid"), "id", true)]
    #[case(AuditOptions::new().except(&["token"]), "token", false)]
    #[case(AuditOptions::new().only(&["title"]), "updated_at", false)]
    #[case(AuditOptions::new().only(&["updated_at"]), "updated_at", true)]
    fn column_filter_cases(#[case] options: AuditOptions, #[case] column: &str, #[case] audited: bool) {
        let mut registry = AuditRegistry::new(RelationshipGraph::new(), CaptureDefaults::default());
        registry.audited("Page", options).unwrap();
        assert_eq!(registry.policy("Page").unwrap().is_audited_column(column), audited);
    }

    #[test]
    fn only_filter_allows_listed_columns() {
        let mut registry = AuditRegistry::new(RelationshipGraph::new(), CaptureDefaults::default());
        registry
            .audited("Setting", AuditOptions::new().only(&["value"]).on(&[AuditAction::Update]))
            .unwrap();
        let policy = registry.policy("Setting").unwrap();
        assert!(policy.is_audited_column("value"));
        assert!(!policy.is_audited_column("name"));
        assert!(policy.audits(AuditAction::Update));
        assert!(!policy.audits(AuditAction::Create));
    }

    #[test]
    fn second_registration_is_noop() {
        let mut registry = registry();
        registry
            .audited("User", AuditOptions::new().only(&["name"]))
            .unwrap();
        assert!(!registry.policy("User").unwrap().is_audited_column("password"));
        assert!(registry.policy("User").unwrap().is_audited_column("email"));
    }

    #[test]
    fn unknown_association_is_rejected() {
        let mut registry = AuditRegistry::new(RelationshipGraph::new(), CaptureDefaults::default());
        let err = registry
            .audited("Department", AuditOptions::new().audit_association("users", AuditOptions::new()))
            .unwrap_err();
        assert!(matches!(err, CaptureError::UnknownRelation { .. }));
    }

    #[test]
    fn without_auditing_pauses_associations_and_restores() {
        let registry = registry();
        registry.without_auditing_scope("Department", || {
            assert!(!registry.policy("Department").unwrap().is_enabled());
            assert!(!registry.policy("User").unwrap().is_enabled());
        });
        assert!(registry.policy("Department").unwrap().is_enabled());
        assert!(registry.policy("User").unwrap().is_enabled());
    }

    #[test]
    fn without_auditing_restores_prior_state_after_panic() {
        let registry = registry();
        registry.disable_auditing("User");
        let result = catch_unwind(AssertUnwindSafe(|| {
            registry.without_auditing_scope("Department", || panic!("bulk import failed"));
        }));
        assert!(result.is_err());
        assert!(registry.policy("Department").unwrap().is_enabled());
        assert!(!registry.policy("User").unwrap().is_enabled());
    }
}
