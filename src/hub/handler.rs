//! Обработчики сообщений.
//!
//! Форма обработчика (синхронная или асинхронная) фиксируется при подписке
//! вариантом [`Handler`], а не определяется во время доставки. Внутри
//! реестра обработчик хранится со стёртым типом сообщения
//! ([`ErasedHandler`]) и приводится обратно через `downcast_ref`.

use std::{any::Any, fmt, future::Future, sync::Arc};

use futures::future::BoxFuture;

use super::Message;

type SyncFn<M> = dyn Fn(&M) + Send + Sync;
type AsyncFn<M> = dyn Fn(M) -> BoxFuture<'static, ()> + Send + Sync;

/// Обработчик сообщений типа `M`.
///
/// Клонирование дешёвое (`Arc`), а клоны считаются одним и тем же
/// обработчиком: именно это позволяет отписать или найти конкретный
/// обработчик через [`Hub::unsubscribe_handler`](super::Hub::unsubscribe_handler).
pub struct Handler<M> {
    kind: HandlerKind<M>,
}

enum HandlerKind<M> {
    Blocking(Arc<SyncFn<M>>),
    Deferred(Arc<AsyncFn<M>>),
}

/// Идентичность обработчика (адрес замыкания внутри `Arc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct HandlerKey(usize);

impl<M: Message> Handler<M> {
    /// Синхронный обработчик: вызывается прямо внутри `publish`.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        Self {
            kind: HandlerKind::Blocking(Arc::new(f)),
        }
    }

    /// Асинхронный обработчик: получает собственную копию сообщения.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let f: Arc<AsyncFn<M>> = Arc::new(move |msg: M| -> BoxFuture<'static, ()> {
            Box::pin(f(msg))
        });
        Self {
            kind: HandlerKind::Deferred(f),
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self.kind, HandlerKind::Deferred(_))
    }

    pub(crate) fn key(&self) -> HandlerKey {
        let addr = match &self.kind {
            HandlerKind::Blocking(f) => Arc::as_ptr(f) as *const () as usize,
            HandlerKind::Deferred(f) => Arc::as_ptr(f) as *const () as usize,
        };
        HandlerKey(addr)
    }

    /// Стирает тип сообщения для хранения в реестре.
    pub(crate) fn erase(&self) -> ErasedHandler {
        match &self.kind {
            HandlerKind::Blocking(f) => {
                let f = Arc::clone(f);
                ErasedHandler::Blocking(Arc::new(move |view: &dyn Any| {
                    match view.downcast_ref::<M>() {
                        Some(msg) => {
                            f(msg);
                            true
                        }
                        None => false,
                    }
                }))
            }
            HandlerKind::Deferred(f) => {
                let f = Arc::clone(f);
                ErasedHandler::Deferred(Arc::new(move |view: &dyn Any| {
                    view.downcast_ref::<M>().map(|msg| f(msg.clone()))
                }))
            }
        }
    }
}

impl<M> Clone for Handler<M> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            HandlerKind::Blocking(f) => HandlerKind::Blocking(Arc::clone(f)),
            HandlerKind::Deferred(f) => HandlerKind::Deferred(Arc::clone(f)),
        };
        Self { kind }
    }
}

impl<M: Message> PartialEq for Handler<M> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<M: Message> fmt::Debug for Handler<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("message_type", &std::any::type_name::<M>())
            .field("async", &self.is_async())
            .finish()
    }
}

/// Обработчик со стёртым типом сообщения.
///
/// `Blocking` возвращает `false`, а `Deferred` — `None`, если представление
/// сообщения не приводится к объявленному типу.
#[derive(Clone)]
pub(crate) enum ErasedHandler {
    Blocking(Arc<dyn Fn(&dyn Any) -> bool + Send + Sync>),
    Deferred(Arc<dyn Fn(&dyn Any) -> Option<BoxFuture<'static, ()>> + Send + Sync>),
}

impl ErasedHandler {
    pub(crate) fn is_async(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}
