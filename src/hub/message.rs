use std::{
    any::{Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
};

/// Идентичность типа сообщения: `TypeId` плюс имя типа для логов.
///
/// Сравнение и хеширование выполняются только по `TypeId`.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Полное имя типа (`crate::module::Type`).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Имя типа без пути модуля.
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.short_name())
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Тип, который можно публиковать через [`Hub`](super::Hub).
///
/// Иерархия сообщений задаётся композицией: производный тип хранит значение
/// своего супертипа в поле. Подписчик на супертип получает это вложенное
/// значение при публикации производного сообщения, а подписчик на
/// производный тип сообщения супертипа не получает.
///
/// Реализуется макросом [`message!`](crate::message).
pub trait Message: Any + Clone + Send + Sync {
    /// Сам тип, затем все объявленные супертипы (в глубину, без повторов).
    fn lineage() -> Vec<TypeKey>;

    /// Представление `self` в виде указанного типа из цепочки `lineage()`.
    fn as_ancestor(&self, key: TypeKey) -> Option<&dyn Any>;
}

/// Реализует [`Message`] для типа.
///
/// ```
/// use nazar::message;
///
/// #[derive(Clone, Debug, Default)]
/// struct Event {
///     source: String,
/// }
///
/// #[derive(Clone, Debug, Default)]
/// struct SpecialEvent {
///     base: Event,
///     level: u8,
/// }
///
/// message!(Event);
/// message!(SpecialEvent { base: Event });
/// ```
///
/// Несколько супертипов перечисляются через запятую:
/// `message!(Alarm { event: Event, tagged: Tagged })`.
#[macro_export]
macro_rules! message {
    ($ty:ident { $($field:ident : $parent:ident),+ $(,)? }) => {
        impl $crate::hub::Message for $ty {
            fn lineage() -> ::std::vec::Vec<$crate::hub::TypeKey> {
                let mut out = ::std::vec![$crate::hub::TypeKey::of::<Self>()];
                $(
                    for key in <$parent as $crate::hub::Message>::lineage() {
                        if !out.contains(&key) {
                            out.push(key);
                        }
                    }
                )+
                out
            }

            fn as_ancestor(
                &self,
                key: $crate::hub::TypeKey,
            ) -> ::std::option::Option<&dyn ::std::any::Any> {
                if key == $crate::hub::TypeKey::of::<Self>() {
                    return ::std::option::Option::Some(self);
                }
                $(
                    if let ::std::option::Option::Some(view) =
                        <$parent as $crate::hub::Message>::as_ancestor(&self.$field, key)
                    {
                        return ::std::option::Option::Some(view);
                    }
                )+
                ::std::option::Option::None
            }
        }
    };
    ($($ty:ident),+ $(,)?) => {
        $(
            impl $crate::hub::Message for $ty {
                fn lineage() -> ::std::vec::Vec<$crate::hub::TypeKey> {
                    ::std::vec![$crate::hub::TypeKey::of::<Self>()]
                }

                fn as_ancestor(
                    &self,
                    key: $crate::hub::TypeKey,
                ) -> ::std::option::Option<&dyn ::std::any::Any> {
                    if key == $crate::hub::TypeKey::of::<Self>() {
                        ::std::option::Option::Some(self)
                    } else {
                        ::std::option::Option::None
                    }
                }
            }
        )+
    };
}

crate::message!(String, bool, i32, i64, u32, u64, f64);
