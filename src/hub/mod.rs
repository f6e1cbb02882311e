//! Типизированный хаб publish–subscribe.
//!
//! Компоненты обмениваются сообщениями, не имея ссылок друг на друга:
//!
//! - `message`: трейт [`Message`], ключ типа [`TypeKey`] и макрос
//!   [`message!`](crate::message), объявляющий супертипы сообщения.
//! - `owner`: невладеющая ссылка на подписчика и его идентичность.
//! - `handler`: синхронный или асинхронный обработчик.
//! - `registry` (приватный): список подписок с ленивой очисткой.
//! - `broker`: сам [`Hub`] с публикацией и подпиской.
//! - `guard` (приватный): лимит вложенности публикаций на потоке.
//! - `hubs`: набор хабов процесса ([`Hubs`]).
//! - `roles`: ограниченные представления [`Publisher`] / [`Subscriber`].

pub mod broker;
mod guard;
pub mod handler;
pub mod hubs;
mod lineage;
pub mod message;
pub mod owner;
mod registry;
pub mod roles;

pub use broker::{DispatchReport, Hub, HubBuilder, HubStats};
pub use handler::Handler;
pub use hubs::Hubs;
pub use message::{Message, TypeKey};
pub use owner::OwnerKey;
pub use registry::HandlerId;
pub use roles::{PipelineFactory, Publisher, Subscriber};
