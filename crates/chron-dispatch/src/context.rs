//! Explicit audit context: who acted, from where, in which bucket.

use chron_core::actor::{Actor, ActorStamp};
use chron_core::bucket::TemporalBucket;

/// Context for one mutation, passed by value through dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditContext {
    pub actor: Option<Actor>,
    pub superior: Option<Actor>,
    pub remote_address: Option<String>,
    pub temporal_bucket: TemporalBucket,
    pub locale: String,
}

impl Default for AuditContext {
    fn default() -> Self {
        Self::new(TemporalBucket::current(), "en")
    }
}

impl AuditContext {
    #[must_use]
    pub fn new(temporal_bucket: TemporalBucket, locale: impl Into<String>) -> Self {
        Self {
            actor: None,
            superior: None,
            remote_address: None,
            temporal_bucket,
            locale: locale.into(),
        }
    }

    #[must_use]
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    #[must_use]
    pub fn with_superior(mut self, superior: Actor) -> Self {
        self.superior = Some(superior);
        self
    }

    #[must_use]
    pub fn with_remote_address(mut self, remote_address: impl Into<String>) -> Self {
        self.remote_address = Some(remote_address.into());
        self
    }

    /// A copy acting as `actor`. The receiver keeps its own actor.
    #[must_use]
    pub fn as_user(&self, actor: Actor) -> Self {
        self.clone().with_actor(actor)
    }

    /// Run `f` with a copy acting as `actor`.
    pub fn as_user_scope<T>(&self, actor: Actor, f: impl FnOnce(&Self) -> T) -> T {
        f(&self.as_user(actor))
    }

    /// Denormalized actor columns for persisted rows.
    #[must_use]
    pub fn stamp(&self) -> ActorStamp {
        ActorStamp::capture(
            self.actor.as_ref(),
            self.superior.as_ref(),
            self.remote_address.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chron_core::keys::EntityKey;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn as_user_leaves_receiver_untouched() {
        let ctx = AuditContext::new(TemporalBucket::new("26"), "pt").with_actor(Actor::new(1_i64));
        let seen = ctx.as_user_scope(Actor::new(2_i64), |inner| inner.stamp().user_id);
        assert_eq!(seen, EntityKey::Int(2));
        assert_eq!(ctx.stamp().user_id, EntityKey::Int(1));
    }

    #[test]
    fn stamp_defaults_to_anonymous() {
        let stamp = AuditContext::default().stamp();
        assert_eq!(stamp.user_id, EntityKey::Int(0));
        assert_eq!(stamp.remote_address, "");
        assert_eq!(stamp.superior_id, None);
    }

    #[test]
    fn stamp_carries_superior_data() {
        let ctx = AuditContext::default()
            .with_superior(Actor::new(9_i64).with_data(json!({"role": "admin"})))
            .with_remote_address("127.0.0.1");
        let stamp = ctx.stamp();
        assert_eq!(stamp.superior_id, Some(EntityKey::Int(9)));
        assert_eq!(stamp.superior_data.as_deref(), Some(r#"{"role":"admin"}"#));
        assert_eq!(stamp.remote_address, "127.0.0.1");
    }
}
