use std::{
    any::Any,
    fmt,
    future::Future,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use futures::{future::BoxFuture, FutureExt};
use nazar_error::{ErrorExt, HubError, SettingsError};
use tokio::runtime::Handle;
use tracing::{error, trace, warn};

use super::{
    guard::{self, DepthGuard},
    handler::ErasedHandler,
    lineage::lineage_of,
    owner::{OwnerKey, OwnerRef},
    registry::{HandlerRegistry, Registration},
    Handler, HandlerId, Message, TypeKey,
};
use crate::config::HubConfig;

/// Итог одной публикации.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Регистрации, попавшие в снимок.
    pub matched: usize,
    /// Обработчики, завершившиеся без паники. Для `publish` сюда же входят
    /// запущенные в фоне асинхронные обработчики.
    pub delivered: usize,
    /// Асинхронные обработчики, запущенные без ожидания.
    pub detached: usize,
    /// Владелец умер между снимком и вызовом.
    pub skipped: usize,
    /// Обработчики, завершившиеся паникой.
    pub panicked: usize,
    /// По одной [`HubError::HandlerPanicked`] на каждую панику.
    pub failures: Vec<HubError>,
}

impl DispatchReport {
    /// `true`, если ни один обработчик не запаниковал.
    pub fn is_clean(&self) -> bool {
        self.panicked == 0
    }
}

/// Накопительные счётчики хаба.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Успешно начатые публикации.
    pub published: u64,
    /// Доставки без паники (включая фоновые запуски).
    pub delivered: u64,
    /// Паники обработчиков, в том числе фоновых.
    pub panicked: u64,
    /// Публикации, отклонённые лимитом вложенности.
    pub rejected: u64,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    panicked: AtomicU64,
    rejected: AtomicU64,
}

/// Владелец подписок «по умолчанию»: живёт, пока жив хотя бы один
/// дескриптор хаба.
struct HubToken;

struct HubCore {
    name: Option<Arc<str>>,
    config: HubConfig,
    runtime: Option<Handle>,
    registry: HandlerRegistry,
    token: Arc<HubToken>,
    counters: Arc<Counters>,
}

/// Типизированный внутрипроцессный хаб сообщений.
///
/// Подписчики не удерживаются хабом: регистрация хранит `Weak` на владельца
/// и перестаёт получать сообщения, как только последний `Arc` владельца
/// освобождён. Подписка на тип `D` получает сообщения типа `D` и всех типов,
/// объявивших `D` своим супертипом через [`message!`](crate::message).
///
/// `Hub` дёшево клонируется; клоны разделяют один реестр, поэтому обработчик
/// может захватить хаб, на который подписан, и публиковать из себя.
///
/// ```
/// use std::sync::Arc;
///
/// use nazar::{message, Hub};
///
/// #[derive(Clone, Debug)]
/// struct Tick(u32);
/// message!(Tick);
///
/// struct Screen;
///
/// let hub = Hub::new();
/// let screen = Arc::new(Screen);
/// hub.subscribe(&screen, |tick: &Tick| println!("tick {}", tick.0));
///
/// let report = hub.publish(&Tick(1)).unwrap();
/// assert_eq!(report.delivered, 1);
///
/// drop(screen);
/// assert_eq!(hub.publish(&Tick(2)).unwrap().delivered, 0);
/// ```
#[derive(Clone)]
pub struct Hub {
    core: Arc<HubCore>,
}

/// Пошаговая сборка [`Hub`].
#[derive(Debug, Default)]
pub struct HubBuilder {
    name: Option<Arc<str>>,
    config: HubConfig,
    runtime: Option<Handle>,
}

impl HubBuilder {
    pub fn name(
        mut self,
        name: impl Into<Arc<str>>,
    ) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn config(
        mut self,
        config: HubConfig,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn max_dispatch_depth(
        mut self,
        depth: usize,
    ) -> Self {
        self.config.max_dispatch_depth = depth;
        self
    }

    pub fn isolate_panics(
        mut self,
        isolate: bool,
    ) -> Self {
        self.config.isolate_panics = isolate;
        self
    }

    pub fn log_dispatch(
        mut self,
        enabled: bool,
    ) -> Self {
        self.config.log_dispatch = enabled;
        self
    }

    /// Runtime для фоновых асинхронных обработчиков `publish`. Без него
    /// используется текущий runtime вызывающего потока, а вне runtime —
    /// отдельный поток.
    pub fn runtime(
        mut self,
        handle: Handle,
    ) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<Hub, SettingsError> {
        self.config.validate()?;
        Ok(Hub {
            core: Arc::new(HubCore {
                name: self.name,
                config: self.config,
                runtime: self.runtime,
                registry: HandlerRegistry::new(),
                token: Arc::new(HubToken),
                counters: Arc::new(Counters::default()),
            }),
        })
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    /// Хаб с настройками по умолчанию.
    pub fn new() -> Self {
        Self::from_valid(None, HubConfig::default())
    }

    pub fn with_config(config: HubConfig) -> Result<Self, SettingsError> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> HubBuilder {
        HubBuilder::default()
    }

    /// Сборка из уже проверенной конфигурации.
    pub(crate) fn from_valid(
        name: Option<Arc<str>>,
        config: HubConfig,
    ) -> Self {
        Self {
            core: Arc::new(HubCore {
                name,
                config,
                runtime: None,
                registry: HandlerRegistry::new(),
                token: Arc::new(HubToken),
                counters: Arc::new(Counters::default()),
            }),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.core.name.as_deref()
    }

    pub fn config(&self) -> &HubConfig {
        &self.core.config
    }

    /// `true`, если оба дескриптора указывают на один хаб.
    pub fn same_hub(
        &self,
        other: &Hub,
    ) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    // ------------------------------------------------------------------
    // Подписка
    // ------------------------------------------------------------------

    /// Подписывает синхронный обработчик. Повторная подписка того же
    /// владельца создаёт ещё одну регистрацию.
    pub fn subscribe<M, F>(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
        f: F,
    ) -> HandlerId
    where
        M: Message,
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.subscribe_handler(owner, &Handler::sync(f))
    }

    /// Подписывает асинхронный обработчик.
    pub fn subscribe_async<M, F, Fut>(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
        f: F,
    ) -> HandlerId
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe_handler(owner, &Handler::from_async(f))
    }

    /// Подписывает заранее созданный [`Handler`]; его клон потом можно
    /// передать в [`unsubscribe_handler`](Self::unsubscribe_handler).
    pub fn subscribe_handler<M: Message>(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
        handler: &Handler<M>,
    ) -> HandlerId {
        self.core.registry.add(
            OwnerRef::new(owner),
            TypeKey::of::<M>(),
            handler.key(),
            handler.erase(),
        )
    }

    /// Подписка, владельцем которой является сам хаб.
    pub fn subscribe_default<M, F>(
        &self,
        f: F,
    ) -> HandlerId
    where
        M: Message,
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.subscribe(&self.core.token, f)
    }

    pub fn subscribe_default_async<M, F, Fut>(
        &self,
        f: F,
    ) -> HandlerId
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe_async(&self.core.token, f)
    }

    pub fn subscribe_default_handler<M: Message>(
        &self,
        handler: &Handler<M>,
    ) -> HandlerId {
        self.subscribe_handler(&self.core.token, handler)
    }

    // ------------------------------------------------------------------
    // Отписка и проверки
    // ------------------------------------------------------------------

    /// Снимает все подписки владельца. Возвращает число снятых.
    pub fn unsubscribe(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
    ) -> usize {
        self.core
            .registry
            .remove_for(OwnerKey::of(owner), None)
    }

    /// Снимает подписки владельца ровно на тип `M` (подписки на
    /// супертипы и подтипы `M` остаются).
    pub fn unsubscribe_type<M: Message>(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
    ) -> usize {
        self.core
            .registry
            .remove_for(OwnerKey::of(owner), Some(TypeKey::of::<M>()))
    }

    /// Снимает одну, самую раннюю, регистрацию этого обработчика.
    pub fn unsubscribe_handler<M: Message>(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
        handler: &Handler<M>,
    ) -> bool {
        self.core
            .registry
            .remove_one(OwnerKey::of(owner), TypeKey::of::<M>(), handler.key())
    }

    /// Снимает подписки по умолчанию на тип `M`.
    pub fn unsubscribe_default<M: Message>(&self) -> usize {
        self.unsubscribe_type::<M>(&self.core.token)
    }

    /// Есть ли у живого владельца подписка ровно на тип `M`.
    pub fn exists<M: Message>(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
    ) -> bool {
        self.core
            .registry
            .exists(OwnerKey::of(owner), TypeKey::of::<M>(), None)
    }

    pub fn exists_handler<M: Message>(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
        handler: &Handler<M>,
    ) -> bool {
        self.core.registry.exists(
            OwnerKey::of(owner),
            TypeKey::of::<M>(),
            Some(handler.key()),
        )
    }

    pub fn exists_default<M: Message>(&self) -> bool {
        self.exists::<M>(&self.core.token)
    }

    /// Число регистраций, включая мёртвые, которые ещё не вычищены.
    pub fn handler_count(&self) -> usize {
        self.core.registry.len()
    }

    /// Принудительно вычищает регистрации мёртвых владельцев.
    pub fn prune(&self) -> usize {
        self.core.registry.prune()
    }

    pub fn stats(&self) -> HubStats {
        let c = &self.core.counters;
        HubStats {
            published: c.published.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            panicked: c.panicked.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
        }
    }

    // ------------------------------------------------------------------
    // Публикация
    // ------------------------------------------------------------------

    /// Доставляет `msg` всем подходящим подписчикам в порядке подписки.
    ///
    /// Синхронные обработчики выполняются прямо здесь. Асинхронные
    /// запускаются в фоне и не ожидаются; публикации из них считаются
    /// вложенными в эту. Если вложенность превысила `max_dispatch_depth`,
    /// ничего не вызывается и возвращается
    /// [`HubError::DispatchDepthExceeded`].
    pub fn publish<M: Message>(
        &self,
        msg: &M,
    ) -> Result<DispatchReport, HubError> {
        let depth = self.enter::<M>()?;
        let snapshot = self.core.registry.snapshot_matching(&lineage_of::<M>());
        let mut report = DispatchReport {
            matched: snapshot.len(),
            ..DispatchReport::default()
        };

        for reg in &snapshot {
            if !reg.is_alive() {
                report.skipped += 1;
                continue;
            }
            let Some(view) = msg.as_ancestor(reg.declared()) else {
                continue;
            };
            self.trace_dispatch(reg);

            let outcome = match reg.handler() {
                ErasedHandler::Blocking(f) => {
                    panic::catch_unwind(AssertUnwindSafe(|| f(view))).map(|_| ())
                }
                ErasedHandler::Deferred(f) => {
                    panic::catch_unwind(AssertUnwindSafe(|| f(view))).map(|fut| {
                        if let Some(fut) = fut {
                            self.spawn_detached(reg, depth.depth(), fut);
                            report.detached += 1;
                        }
                    })
                }
            };

            match outcome {
                Ok(()) => report.delivered += 1,
                Err(payload) => {
                    self.record_panic(reg, payload.as_ref(), &mut report);
                    if !self.core.config.isolate_panics {
                        drop(depth);
                        self.finish(&report);
                        panic::resume_unwind(payload);
                    }
                }
            }
        }

        self.finish(&report);
        Ok(report)
    }

    /// Как [`publish`](Self::publish), но асинхронные обработчики
    /// ожидаются по очереди, прежде чем вызвать следующий.
    pub async fn publish_async<M: Message>(
        &self,
        msg: &M,
    ) -> Result<DispatchReport, HubError> {
        // Глубина проверяется один раз; дальше она переносится через
        // `.await` в контекст каждого обработчика.
        let depth = self.enter::<M>()?.depth();
        let snapshot = self.core.registry.snapshot_matching(&lineage_of::<M>());
        let mut report = DispatchReport {
            matched: snapshot.len(),
            ..DispatchReport::default()
        };

        for reg in &snapshot {
            if !reg.is_alive() {
                report.skipped += 1;
                continue;
            }
            self.trace_dispatch(reg);

            // Представление `&dyn Any` и guard не переживают `.await`.
            let pending = {
                let Some(view) = msg.as_ancestor(reg.declared()) else {
                    continue;
                };
                let _depth = DepthGuard::resume(depth);
                match reg.handler() {
                    ErasedHandler::Blocking(f) => {
                        panic::catch_unwind(AssertUnwindSafe(|| f(view))).map(|_| None)
                    }
                    ErasedHandler::Deferred(f) => panic::catch_unwind(AssertUnwindSafe(|| f(view))),
                }
            };

            let outcome = match pending {
                Ok(Some(fut)) => guard::scope(depth, AssertUnwindSafe(fut).catch_unwind()).await,
                Ok(None) => Ok(()),
                Err(payload) => Err(payload),
            };

            match outcome {
                Ok(()) => report.delivered += 1,
                Err(payload) => {
                    self.record_panic(reg, payload.as_ref(), &mut report);
                    if !self.core.config.isolate_panics {
                        self.finish(&report);
                        panic::resume_unwind(payload);
                    }
                }
            }
        }

        self.finish(&report);
        Ok(report)
    }

    fn enter<M: Message>(&self) -> Result<DepthGuard, HubError> {
        DepthGuard::enter(self.core.config.max_dispatch_depth).inspect_err(|err| {
            self.core.counters.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(
                message_type = TypeKey::of::<M>().short_name(),
                code = %err.status_code(),
                error = %err,
                "publish rejected"
            );
        })
    }

    fn trace_dispatch(
        &self,
        reg: &Registration,
    ) {
        if self.core.config.log_dispatch {
            trace!(
                handler_id = reg.id().get(),
                message_type = reg.declared().short_name(),
                depth = DepthGuard::current(),
                "dispatch"
            );
        }
    }

    fn finish(
        &self,
        report: &DispatchReport,
    ) {
        let c = &self.core.counters;
        c.published.fetch_add(1, Ordering::Relaxed);
        c.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
    }

    fn record_panic(
        &self,
        reg: &Registration,
        payload: &(dyn Any + Send),
        report: &mut DispatchReport,
    ) {
        let failure = HubError::HandlerPanicked {
            message_type: reg.declared().name(),
            handler_id: reg.id().get(),
            reason: panic_message(payload),
        };
        error!(
            handler_id = reg.id().get(),
            message_type = reg.declared().short_name(),
            code = %failure.status_code(),
            error = %failure,
            "handler panicked"
        );
        self.core.counters.panicked.fetch_add(1, Ordering::Relaxed);
        report.panicked += 1;
        report.failures.push(failure);
    }

    /// Запускает future асинхронного обработчика без ожидания.
    fn spawn_detached(
        &self,
        reg: &Registration,
        depth: usize,
        fut: BoxFuture<'static, ()>,
    ) {
        let handler_id = reg.id().get();
        let message_type = reg.declared().short_name();
        let counters = Arc::clone(&self.core.counters);
        let task = guard::scope(depth, async move {
            if let Err(payload) = AssertUnwindSafe(fut).catch_unwind().await {
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                error!(
                    handler_id,
                    message_type,
                    reason = %panic_message(payload.as_ref()),
                    "detached handler panicked"
                );
            }
        });

        let runtime = self
            .core
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok());
        match runtime {
            Some(handle) => {
                handle.spawn(task);
            }
            None => {
                let spawned = std::thread::Builder::new()
                    .name(format!("nazar-handler-{handler_id}"))
                    .spawn(move || futures::executor::block_on(task));
                if let Err(err) = spawned {
                    error!(handler_id, message_type, error = %err, "failed to start detached handler");
                }
            }
        }
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("name", &self.core.name)
            .field("handlers", &self.core.registry.len())
            .field("config", &self.core.config)
            .finish()
    }
}

/// Текст паники из её полезной нагрузки.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Event {
        id: u32,
    }

    #[derive(Clone, Debug)]
    struct SpecialEvent {
        base: Event,
    }

    crate::message!(Event);
    crate::message!(SpecialEvent { base: Event });

    struct Owner;

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        (Arc::clone(&hits), hits)
    }

    /// Тест проверяет доставку и содержимое отчёта.
    #[test]
    fn test_publish_delivers_and_reports() {
        let hub = Hub::new();
        let owner = Arc::new(Owner);
        let (hits, seen) = counter();
        hub.subscribe(&owner, move |e: &Event| {
            hits.fetch_add(e.id as usize, Ordering::SeqCst);
        });

        let report = hub.publish(&Event { id: 7 }).unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.delivered, 1);
        assert!(report.is_clean());
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        assert_eq!(hub.stats().published, 1);
        assert_eq!(hub.stats().delivered, 1);
    }

    /// Тест проверяет, что подписчик на супертип получает вложенное
    /// значение производного сообщения.
    #[test]
    fn test_supertype_subscriber_gets_embedded_view() {
        let hub = Hub::new();
        let owner = Arc::new(Owner);
        let (hits, seen) = counter();
        hub.subscribe(&owner, move |e: &Event| {
            hits.store(e.id as usize, Ordering::SeqCst);
        });

        let report = hub
            .publish(&SpecialEvent {
                base: Event { id: 11 },
            })
            .unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(seen.load(Ordering::SeqCst), 11);
    }

    /// Тест проверяет публикацию без подписчиков.
    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let hub = Hub::new();
        let report = hub.publish(&Event { id: 1 }).unwrap();
        assert_eq!(report, DispatchReport::default());
    }

    /// Тест проверяет подписки по умолчанию (владелец — сам хаб).
    #[test]
    fn test_default_subscriptions() {
        let hub = Hub::new();
        let (hits, seen) = counter();
        hub.subscribe_default(move |_: &Event| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        assert!(hub.exists_default::<Event>());

        hub.publish(&Event { id: 1 }).unwrap();
        assert_eq!(hub.unsubscribe_default::<Event>(), 1);
        assert!(!hub.exists_default::<Event>());
        hub.publish(&Event { id: 2 }).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    /// Тест проверяет, что нулевой лимит вложенности отклоняется сборщиком.
    #[test]
    fn test_builder_rejects_zero_depth() {
        let err = Hub::builder().max_dispatch_depth(0).build().unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid {
                field: "max_dispatch_depth",
                ..
            }
        ));
    }

    /// Тест проверяет имя хаба и сравнение дескрипторов.
    #[test]
    fn test_name_and_identity() {
        let hub = Hub::builder().name("market").build().unwrap();
        let clone = hub.clone();
        assert_eq!(hub.name(), Some("market"));
        assert!(hub.same_hub(&clone));
        assert!(!hub.same_hub(&Hub::new()));
    }

    /// Тест проверяет извлечение текста паники.
    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
