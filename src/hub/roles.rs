//! Ограниченные представления хаба: отдельно для издателя и для
//! подписчика.
//!
//! Компонент, которому нужно только публиковать, получает [`Publisher`] и не
//! может подписываться; потребитель получает [`Subscriber`].
//! [`PipelineFactory`] создаёт собственный закрытый хаб и раздаёт пары
//! издатель/подписчик поверх него.

use std::{any::Any, future::Future, sync::Arc};

use nazar_error::{HubError, SettingsError};

use super::{DispatchReport, Handler, HandlerId, Hub, Message};
use crate::config::HubConfig;

/// Сторона публикации.
#[derive(Debug, Clone)]
pub struct Publisher {
    hub: Hub,
}

impl Publisher {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }

    pub fn publish<M: Message>(
        &self,
        msg: &M,
    ) -> Result<DispatchReport, HubError> {
        self.hub.publish(msg)
    }

    pub async fn publish_async<M: Message>(
        &self,
        msg: &M,
    ) -> Result<DispatchReport, HubError> {
        self.hub.publish_async(msg).await
    }
}

/// Сторона подписки.
#[derive(Debug, Clone)]
pub struct Subscriber {
    hub: Hub,
}

impl Subscriber {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }

    pub fn subscribe<M, F>(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
        f: F,
    ) -> HandlerId
    where
        M: Message,
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.hub.subscribe(owner, f)
    }

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
        self.hub.subscribe_async(owner, f)
    }

    pub fn subscribe_handler<M: Message>(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
        handler: &Handler<M>,
    ) -> HandlerId {
        self.hub.subscribe_handler(owner, handler)
    }

    pub fn unsubscribe(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
    ) -> usize {
        self.hub.unsubscribe(owner)
    }

    pub fn unsubscribe_type<M: Message>(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
    ) -> usize {
        self.hub.unsubscribe_type::<M>(owner)
    }

    pub fn unsubscribe_handler<M: Message>(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
        handler: &Handler<M>,
    ) -> bool {
        self.hub.unsubscribe_handler(owner, handler)
    }

    pub fn exists<M: Message>(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
    ) -> bool {
        self.hub.exists::<M>(owner)
    }

    pub fn exists_handler<M: Message>(
        &self,
        owner: &Arc<impl Any + Send + Sync>,
        handler: &Handler<M>,
    ) -> bool {
        self.hub.exists_handler(owner, handler)
    }
}

/// Фабрика связанных пар издатель/подписчик над одним закрытым хабом.
///
/// Разные фабрики между собой не пересекаются.
#[derive(Debug, Clone, Default)]
pub struct PipelineFactory {
    hub: Hub,
}

impl PipelineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HubConfig) -> Result<Self, SettingsError> {
        Ok(Self {
            hub: Hub::with_config(config)?,
        })
    }

    pub fn publisher(&self) -> Publisher {
        Publisher::new(self.hub.clone())
    }

    pub fn subscriber(&self) -> Subscriber {
        Subscriber::new(self.hub.clone())
    }
}
