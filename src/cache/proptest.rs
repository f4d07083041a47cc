//! Property-Based Tests for the Identity Cache
//!
//! Drives random sequences of writes, removals and renames against the cache
//! and a plain `HashMap` model of what should be cached.
//!
//! # Test Properties
//!
//! 1. **Dual-index consistency**: a name lookup by a record's current name
//!    returns the same record as the id lookup
//! 2. **No stale aliases**: there is exactly one alias per cached record
//! 3. **Cascading removal**: removed users disappear from both indices

#![cfg(test)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use uuid::Uuid;

use super::identity::{IdentityCache, IdentityCacheConfig};
use crate::domain::User;

#[derive(Debug, Clone)]
enum Op {
    Put { id: u8, variant: u8 },
    RemoveById { id: u8 },
    RemoveByName { id: u8, variant: u8 },
    Rename { id: u8, variant: u8 },
    Clear,
}

// =============================================================================
// Property Strategies
// =============================================================================

/// Names are unique per id, so two users never compete for one alias.
fn name_of(id: u8, variant: u8) -> String {
    format!("user{}-v{}", id, variant)
}

fn uuid_of(id: u8) -> Uuid {
    Uuid::from_u128(u128::from(id) + 1)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..6, 0u8..3).prop_map(|(id, variant)| Op::Put { id, variant }),
        2 => (0u8..6).prop_map(|id| Op::RemoveById { id }),
        2 => (0u8..6, 0u8..3).prop_map(|(id, variant)| Op::RemoveByName { id, variant }),
        3 => (0u8..6, 0u8..3).prop_map(|(id, variant)| Op::Rename { id, variant }),
        1 => Just(Op::Clear),
    ]
}

fn no_expiry_cache() -> IdentityCache {
    IdentityCache::with_config(IdentityCacheConfig {
        expire_after_write: Duration::ZERO,
        expire_after_access: Duration::ZERO,
        sweep_interval: Duration::ZERO,
    })
}

fn apply(cache: &IdentityCache, model: &mut HashMap<Uuid, String>, op: &Op) {
    match *op {
        Op::Put { id, variant } => {
            let name = name_of(id, variant);
            let user = User::new(uuid_of(id), name.clone()).unwrap();
            cache.put(Arc::new(user));
            model.insert(uuid_of(id), name);
        }
        Op::RemoveById { id } => {
            cache.remove_by_id(uuid_of(id));
            model.remove(&uuid_of(id));
        }
        Op::RemoveByName { id, variant } => {
            let name = name_of(id, variant);
            cache.remove_by_name(&name);
            if model.get(&uuid_of(id)) == Some(&name) {
                model.remove(&uuid_of(id));
            }
        }
        Op::Rename { id, variant } => {
            if let Some(user) = cache.get_by_id(uuid_of(id)) {
                let old = user.set_name(name_of(id, variant)).unwrap();
                cache.rename_alias(&user, &old);
                model.insert(uuid_of(id), user.name());
            }
        }
        Op::Clear => {
            cache.clear();
            model.clear();
        }
    }
}

// =============================================================================
// Dual-Index Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: after every operation both indices agree with the model.
    #[test]
    fn prop_dual_index_consistency(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let cache = no_expiry_cache();
        let mut model: HashMap<Uuid, String> = HashMap::new();

        for op in &ops {
            apply(&cache, &mut model, op);

            prop_assert_eq!(cache.len(), model.len());
            prop_assert_eq!(cache.stats().aliases, model.len());

            for (uuid, name) in &model {
                let by_id = cache.get_by_id(*uuid);
                let by_name = cache.get_by_name(name);
                prop_assert!(by_id.is_some());
                prop_assert!(by_name.is_some());

                let (by_id, by_name) = (by_id.unwrap(), by_name.unwrap());
                prop_assert!(Arc::ptr_eq(&by_id, &by_name));
                prop_assert_eq!(&by_id.name(), name);
            }
        }
    }

    /// Property: a removed user is gone from both indices, under every name it held.
    #[test]
    fn prop_removal_cascades(
        id in 0u8..6,
        renames in prop::collection::vec(0u8..3, 0..5),
    ) {
        let cache = no_expiry_cache();
        let user = Arc::new(User::new(uuid_of(id), name_of(id, 0)).unwrap());
        cache.put(Arc::clone(&user));

        let mut held = vec![user.name()];
        for variant in renames {
            let old = user.set_name(name_of(id, variant)).unwrap();
            cache.rename_alias(&user, &old);
            held.push(user.name());
        }

        prop_assert!(cache.remove_by_name(&user.name()).is_some());
        prop_assert!(cache.get_by_id(uuid_of(id)).is_none());
        for name in &held {
            prop_assert!(cache.get_by_name(name).is_none());
        }
        prop_assert_eq!(cache.stats().aliases, 0);
    }
}
