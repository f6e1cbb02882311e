use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tracing::debug;

use super::{
    handler::{ErasedHandler, HandlerKey},
    owner::{OwnerKey, OwnerRef},
    TypeKey,
};

/// Уникальный (в пределах одного хаба) номер регистрации.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Одна подписка: владелец, объявленный тип и обработчик.
#[derive(Clone)]
pub(crate) struct Registration {
    id: HandlerId,
    owner: OwnerRef,
    declared: TypeKey,
    handler_key: HandlerKey,
    handler: ErasedHandler,
}

impl Registration {
    pub(crate) fn id(&self) -> HandlerId {
        self.id
    }

    pub(crate) fn declared(&self) -> TypeKey {
        self.declared
    }

    pub(crate) fn handler(&self) -> &ErasedHandler {
        &self.handler
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.owner.is_alive()
    }

    fn matches(
        &self,
        owner: OwnerKey,
        declared: Option<TypeKey>,
        handler: Option<HandlerKey>,
    ) -> bool {
        self.owner.key() == owner
            && declared.is_none_or(|d| d == self.declared)
            && handler.is_none_or(|h| h == self.handler_key)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("declared", &self.declared)
            .field("async", &self.handler.is_async())
            .finish()
    }
}

/// Упорядоченный по времени добавления список подписок.
///
/// Все структурные изменения выполняются под одним мьютексом. Доставка
/// работает с копией ([`snapshot_matching`](Self::snapshot_matching)), поэтому
/// обработчики могут свободно подписываться и отписываться во время
/// публикации: изменения увидит только следующая публикация.
///
/// Записи с умершим владельцем удаляются лениво: при снимке и при любой
/// отписке.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    entries: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
}

impl HandlerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Добавляет регистрацию в конец списка. Дубликаты допускаются.
    pub(crate) fn add(
        &self,
        owner: OwnerRef,
        declared: TypeKey,
        handler_key: HandlerKey,
        handler: ErasedHandler,
    ) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let owner_key = owner.key();
        self.entries.lock().push(Registration {
            id,
            owner,
            declared,
            handler_key,
            handler,
        });
        debug!(
            handler_id = id.get(),
            message_type = declared.short_name(),
            owner = %owner_key,
            "subscribed"
        );
        id
    }

    /// Удаляет все регистрации владельца, а при заданном `declared` только
    /// регистрации этого типа. Заодно вычищает мёртвых владельцев.
    /// Возвращает число удалённых совпадений.
    pub(crate) fn remove_for(
        &self,
        owner: OwnerKey,
        declared: Option<TypeKey>,
    ) -> usize {
        let (removed, pruned) = {
            let mut entries = self.entries.lock();
            let before = entries.len();
            let mut removed = 0;
            entries.retain(|r| {
                if r.matches(owner, declared, None) {
                    removed += 1;
                    return false;
                }
                r.is_alive()
            });
            (removed, before - entries.len() - removed)
        };
        if removed > 0 || pruned > 0 {
            debug!(%owner, removed, pruned, "unsubscribed");
        }
        removed
    }

    /// Удаляет самую старую регистрацию, совпадающую по всем трём ключам.
    pub(crate) fn remove_one(
        &self,
        owner: OwnerKey,
        declared: TypeKey,
        handler: HandlerKey,
    ) -> bool {
        let (found, pruned) = {
            let mut entries = self.entries.lock();
            let pruned = prune_locked(&mut entries);
            let position = entries
                .iter()
                .position(|r| r.matches(owner, Some(declared), Some(handler)));
            if let Some(index) = position {
                entries.remove(index);
            }
            (position.is_some(), pruned)
        };
        if found || pruned > 0 {
            debug!(
                %owner,
                message_type = declared.short_name(),
                removed = usize::from(found),
                pruned,
                "unsubscribed handler"
            );
        }
        found
    }

    /// Вычищает мёртвых владельцев и копирует живые регистрации, чей
    /// объявленный тип входит в `lineage`, в порядке добавления.
    pub(crate) fn snapshot_matching(
        &self,
        lineage: &[TypeKey],
    ) -> Vec<Registration> {
        let (snapshot, pruned) = {
            let mut entries = self.entries.lock();
            let pruned = prune_locked(&mut entries);
            let snapshot: Vec<_> = entries
                .iter()
                .filter(|r| lineage.contains(&r.declared))
                .cloned()
                .collect();
            (snapshot, pruned)
        };
        if pruned > 0 {
            debug!(pruned, "pruned dead subscribers");
        }
        snapshot
    }

    /// Есть ли живая регистрация владельца с данным типом (и обработчиком).
    pub(crate) fn exists(
        &self,
        owner: OwnerKey,
        declared: TypeKey,
        handler: Option<HandlerKey>,
    ) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|r| r.is_alive() && r.matches(owner, Some(declared), handler))
    }

    /// Явный проход очистки. Возвращает число удалённых записей.
    pub(crate) fn prune(&self) -> usize {
        let pruned = prune_locked(&mut self.entries.lock());
        if pruned > 0 {
            debug!(pruned, "pruned dead subscribers");
        }
        pruned
    }

    /// Число хранимых регистраций, включая ещё не вычищенные мёртвые.
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

fn prune_locked(entries: &mut Vec<Registration>) -> usize {
    let before = entries.len();
    entries.retain(Registration::is_alive);
    before - entries.len()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::hub::Handler;

    #[derive(Clone, Debug)]
    struct Quote;

    #[derive(Clone, Debug)]
    struct Headline;

    crate::message!(Quote, Headline);

    struct Owner;

    fn add_sync<M: crate::hub::Message>(
        registry: &HandlerRegistry,
        owner: &Arc<Owner>,
        handler: &Handler<M>,
    ) -> HandlerId {
        registry.add(
            OwnerRef::new(owner),
            TypeKey::of::<M>(),
            handler.key(),
            handler.erase(),
        )
    }

    /// Тест проверяет, что id растут монотонно, а снимок сохраняет
    /// порядок добавления.
    #[test]
    fn test_add_preserves_insertion_order() {
        let registry = HandlerRegistry::new();
        let owner = Arc::new(Owner);
        let h = Handler::sync(|_: &Quote| {});

        let ids: Vec<_> = (0..3).map(|_| add_sync(&registry, &owner, &h)).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        let snap = registry.snapshot_matching(&[TypeKey::of::<Quote>()]);
        let snap_ids: Vec<_> = snap.iter().map(Registration::id).collect();
        assert_eq!(snap_ids, ids);
    }

    /// Тест проверяет фильтрацию снимка по цепочке типов.
    #[test]
    fn test_snapshot_filters_by_lineage() {
        let registry = HandlerRegistry::new();
        let owner = Arc::new(Owner);
        add_sync(&registry, &owner, &Handler::sync(|_: &Quote| {}));
        add_sync(&registry, &owner, &Handler::sync(|_: &Headline| {}));

        let snap = registry.snapshot_matching(&[TypeKey::of::<Headline>()]);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].declared(), TypeKey::of::<Headline>());
        assert!(registry.snapshot_matching(&[]).is_empty());
    }

    /// Тест проверяет, что снимок вычищает мёртвых владельцев.
    #[test]
    fn test_snapshot_prunes_dead_owners() {
        let registry = HandlerRegistry::new();
        let alive = Arc::new(Owner);
        let doomed = Arc::new(Owner);
        add_sync(&registry, &alive, &Handler::sync(|_: &Quote| {}));
        add_sync(&registry, &doomed, &Handler::sync(|_: &Quote| {}));
        drop(doomed);

        assert_eq!(registry.len(), 2);
        let snap = registry.snapshot_matching(&[TypeKey::of::<Quote>()]);
        assert_eq!(snap.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    /// Тест проверяет фильтры remove_for и его идемпотентность.
    #[test]
    fn test_remove_for_filters() {
        let registry = HandlerRegistry::new();
        let owner = Arc::new(Owner);
        let other = Arc::new(Owner);
        let quote = Handler::sync(|_: &Quote| {});
        let headline = Handler::sync(|_: &Headline| {});
        add_sync(&registry, &owner, &quote);
        add_sync(&registry, &owner, &quote);
        add_sync(&registry, &owner, &headline);
        add_sync(&registry, &other, &quote);

        let key = OwnerKey::of(&owner);
        assert_eq!(registry.remove_for(key, Some(TypeKey::of::<Quote>())), 2);
        assert_eq!(registry.remove_for(key, Some(TypeKey::of::<Quote>())), 0);
        assert_eq!(registry.remove_for(key, None), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.exists(OwnerKey::of(&other), TypeKey::of::<Quote>(), None));
    }

    /// Тест проверяет, что remove_one снимает только одну, самую старую,
    /// из одинаковых регистраций.
    #[test]
    fn test_remove_one_removes_oldest_only() {
        let registry = HandlerRegistry::new();
        let owner = Arc::new(Owner);
        let h = Handler::sync(|_: &Quote| {});
        let first = add_sync(&registry, &owner, &h);
        let second = add_sync(&registry, &owner, &h);

        let key = OwnerKey::of(&owner);
        assert!(registry.remove_one(key, TypeKey::of::<Quote>(), h.key()));

        let snap = registry.snapshot_matching(&[TypeKey::of::<Quote>()]);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].id(), second);
        assert_ne!(snap[0].id(), first);

        assert!(registry.remove_one(key, TypeKey::of::<Quote>(), h.key()));
        assert!(!registry.remove_one(key, TypeKey::of::<Quote>(), h.key()));
        assert_eq!(registry.len(), 0);
    }

    /// Тест проверяет, что exists учитывает живость владельца и не чистит
    /// реестр.
    #[test]
    fn test_exists_ignores_dead_without_pruning() {
        let registry = HandlerRegistry::new();
        let owner = Arc::new(Owner);
        let h = Handler::sync(|_: &Quote| {});
        add_sync(&registry, &owner, &h);

        let key = OwnerKey::of(&owner);
        assert!(registry.exists(key, TypeKey::of::<Quote>(), Some(h.key())));
        assert!(!registry.exists(key, TypeKey::of::<Headline>(), None));

        drop(owner);
        assert!(!registry.exists(key, TypeKey::of::<Quote>(), None));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.prune(), 1);
        assert_eq!(registry.len(), 0);
    }
}
