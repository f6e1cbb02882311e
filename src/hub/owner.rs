use std::{
    any::Any,
    fmt,
    sync::{Arc, Weak},
};

/// Идентичность владельца подписки: адрес его `Arc`-аллокации.
///
/// Пока хоть одна регистрация держит `Weak` на владельца, аллокация не
/// освобождается, поэтому адрес не может достаться другому владельцу.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerKey(usize);

impl OwnerKey {
    pub fn of<O: ?Sized>(owner: &Arc<O>) -> Self {
        Self(Arc::as_ptr(owner) as *const () as usize)
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner@{:#x}", self.0)
    }
}

/// Невладеющая ссылка на подписчика.
///
/// Владелец считается живым, пока существует хотя бы один сильный `Arc`.
#[derive(Clone)]
pub(crate) struct OwnerRef {
    weak: Weak<dyn Any + Send + Sync>,
    key: OwnerKey,
}

impl OwnerRef {
    pub(crate) fn new<O: Any + Send + Sync>(owner: &Arc<O>) -> Self {
        let weak: Weak<O> = Arc::downgrade(owner);
        let weak: Weak<dyn Any + Send + Sync> = weak;
        Self {
            weak,
            key: OwnerKey::of(owner),
        }
    }

    #[inline]
    pub(crate) fn key(&self) -> OwnerKey {
        self.key
    }

    #[inline]
    pub(crate) fn is_alive(&self) -> bool {
        self.weak.strong_count() > 0
    }
}

impl fmt::Debug for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerRef")
            .field("key", &self.key)
            .field("alive", &self.is_alive())
            .finish()
    }
}
