//! Fan-out: one mutation draft into every record it must produce.
//!
//! Emission order is deterministic: one base replica per distinct owner key,
//! then, replica by replica, one field-partition replica per configured
//! partition in declaration order.

use chron_core::changes::AuditedChanges;
use chron_core::draft::Draft;
use chron_core::keys::EntityKey;
use serde_json::Value;

use crate::policy::FieldPartition;
use crate::resolve::ResolvedOwner;

/// Expand `base` into its replicas.
///
/// `destination` supplies `audit_destination_data` for field-partition
/// replicas, given the auditable type and the owner id of the base replica
/// the partition replica was derived from. `None` keeps the base value.
pub fn expand<F>(
    base: Draft,
    owner: Option<&ResolvedOwner>,
    partitions: &[FieldPartition],
    destination: F,
) -> Vec<Draft>
where
    F: Fn(&str, Option<&EntityKey>) -> Option<Value>,
{
    let mut drafts = base_replicas(base, owner);

    let partition_replicas: Vec<Draft> = if partitions.is_empty() {
        Vec::new()
    } else {
        drafts
            .iter()
            .flat_map(|replica| partition_replicas(replica, partitions, &destination))
            .collect()
    };
    drafts.extend(partition_replicas);

    for draft in &mut drafts {
        if draft.associated_id.is_none() {
            draft.clear_association();
        }
    }
    drafts
}

fn base_replicas(base: Draft, owner: Option<&ResolvedOwner>) -> Vec<Draft> {
    let Some(owner) = owner else {
        return vec![base];
    };
    let keys = owner.keys();
    if keys.is_empty() {
        return vec![base];
    }
    keys.into_iter()
        .map(|key| base.clone().with_association(owner.owner_type.clone(), key))
        .collect()
}

fn restrict(changes: &AuditedChanges, fields: &[String]) -> AuditedChanges {
    changes
        .iter()
        .filter(|(attr, _)| fields.iter().any(|field| field == *attr))
        .map(|(attr, value)| (attr.clone(), value.clone()))
        .collect()
}

fn partition_replicas<F>(replica: &Draft, partitions: &[FieldPartition], destination: &F) -> Vec<Draft>
where
    F: Fn(&str, Option<&EntityKey>) -> Option<Value>,
{
    if replica.audited_changes.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for partition in partitions {
        let subset = restrict(&replica.audited_changes, &partition.fields);
        if subset.is_empty() {
            continue;
        }
        let id = if partition.target_type == replica.auditable_type {
            replica.auditable_id.clone()
        } else {
            replica.associated_id.clone()
        };
        let Some(id) = id else {
            continue;
        };

        let mut draft = replica
            .clone()
            .with_changes(subset)
            .with_association(partition.target_type.clone(), id);
        if let Some(data) = destination(&replica.auditable_type, replica.associated_id.as_ref()) {
            draft.audit_destination_data = Some(data);
        }
        out.push(draft);
    }
    out
}
