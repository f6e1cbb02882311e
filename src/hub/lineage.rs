use std::{any::TypeId, sync::Arc};

use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::{Message, TypeKey};

/// Кэш цепочек типов: `Message::lineage()` собирает `Vec` на каждый вызов,
/// а публикация одного и того же типа происходит постоянно.
/// Виден только внутри крейта.
static LINEAGE_CACHE: Lazy<DashMap<TypeId, Arc<[TypeKey]>>> = Lazy::new(DashMap::new);

/// Возвращает закэшированную цепочку типов для `M`.
/// При первом вызове для нового типа вычисляет её и сохраняет в кэше.
#[inline]
pub(crate) fn lineage_of<M: Message>() -> Arc<[TypeKey]> {
    let id = TypeId::of::<M>();
    if let Some(existing) = LINEAGE_CACHE.get(&id) {
        return existing.clone();
    }
    LINEAGE_CACHE
        .entry(id)
        .or_insert_with(|| Arc::from(M::lineage()))
        .clone()
}
