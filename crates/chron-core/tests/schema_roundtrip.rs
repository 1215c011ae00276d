//! Serde roundtrip and JsonSchema validation tests for the wire types.

use chrono::Utc;
use schemars::schema_for;
use serde_json::json;

use chron_core::actor::{Actor, ActorStamp};
use chron_core::bucket::TemporalBucket;
use chron_core::enums::AuditAction;
use chron_core::keys::EntityKey;
use chron_core::message::{AuditPayload, MESSAGE_VERSION, QueueMessage};
use chron_core::record::AuditRecord;

/// Validate a JSON value against a schemars-generated schema.
fn validate_against_schema(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Vec<String> {
    let validator = jsonschema::validator_for(schema).expect("schema should be valid");
    validator
        .iter_errors(instance)
        .map(|e| format!("{e}"))
        .collect()
}

macro_rules! roundtrip_and_validate {
    ($name:ident, $ty:ty, $instance:expr) => {
        #[test]
        fn $name() {
            let val: $ty = $instance;

            let json_str = serde_json::to_string_pretty(&val).unwrap();
            let recovered: $ty = serde_json::from_str(&json_str).unwrap();
            assert_eq!(
                recovered,
                val,
                "serde roundtrip failed for {}",
                stringify!($ty)
            );

            let schema = serde_json::to_value(schema_for!($ty)).unwrap();
            let instance = serde_json::to_value(&val).unwrap();
            let errors = validate_against_schema(&schema, &instance);
            assert!(
                errors.is_empty(),
                "Schema validation failed for {}: {:?}",
                stringify!($ty),
                errors
            );
        }
    };
}

roundtrip_and_validate!(
    queue_message_roundtrip,
    QueueMessage,
    QueueMessage {
        v: MESSAGE_VERSION,
        queue: "chronicle_audits".into(),
        payload: AuditPayload {
            auditable_type: "User".into(),
            auditable_id: Some(EntityKey::Int(42)),
            action: AuditAction::Update,
            audited_changes: json!({"name": ["A", "B"]}).as_object().cloned().unwrap(),
            associated_type: Some("Department".into()),
            associated_ids: vec![EntityKey::Int(3), EntityKey::Int(4)],
            comment: Some("rename".into()),
            actor: ActorStamp::capture(
                Some(&Actor::new(9_i64)),
                Some(&Actor::new("adm-1").with_data(json!({"name": "Root"}))),
                Some("127.0.0.1"),
            ),
            extra: serde_json::Map::new(),
        },
        temporal_bucket: TemporalBucket::new("26"),
        locale: "en".into(),
        enqueued_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    audit_record_roundtrip,
    AuditRecord,
    AuditRecord {
        auditable_type: "User".into(),
        auditable_id: Some(EntityKey::Int(7)),
        action: AuditAction::Create,
        audited_changes: json!({"name": "Ann", "department_id": 3}).as_object().cloned().unwrap(),
        associated_type: Some("Department".into()),
        associated_id: Some(EntityKey::Int(3)),
        audit_source_data: None,
        audit_destination_data: Some(json!({"title": "Ops"})),
        comment: None,
        created_at: 1_760_000_000_000,
        year_month: Some(202_510),
        user_id: Some(EntityKey::Int(0)),
        superior_id: None,
        superior_data: None,
        remote_address: Some(String::new()),
        extra: json!({"partition_key": 3}).as_object().cloned().unwrap(),
    }
);

roundtrip_and_validate!(
    actor_stamp_roundtrip,
    ActorStamp,
    ActorStamp::capture(Some(&Actor::new("usr-1")), None, None)
);

#[test]
fn payload_rejects_unknown_action() {
    let schema = serde_json::to_value(schema_for!(AuditPayload)).unwrap();
    let instance = json!({"auditable_type": "User", "action": "truncate"});
    assert!(!validate_against_schema(&schema, &instance).is_empty());
}
