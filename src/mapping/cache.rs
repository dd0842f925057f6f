use std::any::{type_name, TypeId};
use std::sync::{Arc, LazyLock, OnceLock};

use dashmap::DashMap;
use tracing::debug;

use crate::reflect::Reflect;

use super::resolver::{resolve_key, resolve_mode};
use super::{MappingError, MappingMode, PropertyPair};

type Resolved = Result<Arc<[PropertyPair]>, MappingError>;

static SHARED: LazyLock<MappingCache> = LazyLock::new(MappingCache::default);

#[derive(Default)]
struct PairMappings {
    key: OnceLock<Resolved>,
    details: OnceLock<Resolved>,
    create: OnceLock<Resolved>,
    update: OnceLock<Resolved>,
}

impl PairMappings {
    fn slot(&self, mode: MappingMode) -> Option<&OnceLock<Resolved>> {
        if mode == MappingMode::TO_DETAILS {
            Some(&self.details)
        } else if mode == MappingMode::FROM_CREATE {
            Some(&self.create)
        } else if mode == MappingMode::FROM_UPDATE {
            Some(&self.update)
        } else {
            None
        }
    }
}

/// Resolved property mappings, per `(model, view-model)` type pair.
///
/// Entries are resolved on first use and never evicted. Failed resolutions
/// are cached as well, so a broken view-model fails the same way every time.
/// Two threads resolving the same pair concurrently block on the same slot
/// rather than resolving twice.
#[derive(Default)]
pub struct MappingCache {
    pairs: DashMap<(TypeId, TypeId), Arc<PairMappings>>,
}

impl MappingCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache.
    pub fn shared() -> &'static MappingCache {
        &SHARED
    }

    /// Key pairs used to look up the entity a view-model refers to.
    ///
    /// # Errors
    /// The resolution error, cached from the first attempt.
    pub fn key_mapping<M, V>(&self) -> Resolved
    where
        M: Reflect,
        V: Reflect,
    {
        self.pair::<M, V>()
            .key
            .get_or_init(|| {
                debug!(
                    "Resolving key mapping {} -> {}",
                    type_name::<M>(),
                    type_name::<V>()
                );
                resolve_key(&M::type_info(), &V::type_info()).map(Arc::from)
            })
            .clone()
    }

    /// Property pairs copied in `mode`.
    ///
    /// Single-direction modes are cached; combined modes are resolved on
    /// every call.
    ///
    /// # Errors
    /// The resolution error, cached from the first attempt.
    pub fn mode_mapping<M, V>(&self, mode: MappingMode) -> Resolved
    where
        M: Reflect,
        V: Reflect,
    {
        let resolve = || {
            debug!(
                "Resolving {:?} mapping {} -> {}",
                mode,
                type_name::<M>(),
                type_name::<V>()
            );
            resolve_mode(&M::type_info(), &V::type_info(), mode).map(Arc::from)
        };

        let pair = self.pair::<M, V>();
        match pair.slot(mode) {
            Some(slot) => slot.get_or_init(resolve).clone(),
            None => resolve(),
        }
    }

    /// Number of type pairs seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn pair<M: 'static, V: 'static>(&self) -> Arc<PairMappings> {
        self.pairs
            .entry((TypeId::of::<M>(), TypeId::of::<V>()))
            .or_default()
            .value()
            .clone()
    }
}
