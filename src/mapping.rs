use std::collections::HashMap;

use tracing::info;

/// How a Zalo sender is resolved to a backend customer ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingPolicy {
    /// Every sender maps to the configured default customer.
    FixedDefault,
    /// Consult the per-sender override table first, then the default.
    PerUserOverride,
}

/// Maps Zalo user IDs to backend customer IDs.
///
/// The override table can be populated via the admin endpoints regardless of
/// the active policy; under `FixedDefault` it is carried but ignored, so
/// switching to `PerUserOverride` needs no data migration.
#[derive(Debug)]
pub struct IdentityMap {
    policy: MappingPolicy,
    default_customer_id: i64,
    overrides: HashMap<String, i64>,
}

impl IdentityMap {
    pub fn new(default_customer_id: i64) -> Self {
        Self {
            policy: MappingPolicy::FixedDefault,
            default_customer_id,
            overrides: HashMap::new(),
        }
    }

    #[allow(dead_code)]
    pub fn with_policy(mut self, policy: MappingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve a Zalo user to a backend customer ID.
    pub fn resolve(&self, zalo_user_id: &str) -> i64 {
        let customer_id = match self.policy {
            MappingPolicy::FixedDefault => self.default_customer_id,
            MappingPolicy::PerUserOverride => self
                .overrides
                .get(zalo_user_id)
                .copied()
                .unwrap_or(self.default_customer_id),
        };
        info!(
            "Mapping Zalo user {} -> customer ID {}",
            zalo_user_id, customer_id
        );
        customer_id
    }

    pub fn set_override(&mut self, zalo_user_id: String, customer_id: i64) {
        self.overrides.insert(zalo_user_id, customer_id);
    }

    pub fn overrides(&self) -> &HashMap<String, i64> {
        &self.overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_default_ignores_overrides() {
        let mut map = IdentityMap::new(1);
        map.set_override("U7".to_string(), 99);

        assert_eq!(map.resolve("U7"), 1);
        assert_eq!(map.resolve("U8"), 1);
        assert_eq!(map.resolve(""), 1);
    }

    #[test]
    fn test_per_user_override_consults_table() {
        let mut map = IdentityMap::new(1).with_policy(MappingPolicy::PerUserOverride);
        map.set_override("U7".to_string(), 99);

        assert_eq!(map.resolve("U7"), 99);
        assert_eq!(map.resolve("U8"), 1);
    }

    #[test]
    fn test_overrides_are_readable() {
        let mut map = IdentityMap::new(1);
        map.set_override("U7".to_string(), 99);

        assert_eq!(map.overrides().get("U7"), Some(&99));
    }
}
