use std::sync::Arc;

use dashmap::DashMap;
use nazar_error::SettingsError;
use once_cell::sync::OnceCell;
use tracing::debug;

use super::Hub;
use crate::config::HubConfig;

/// Набор хабов процесса: один общий хаб по умолчанию, создаваемый при
/// первом обращении, и именованные изолированные хабы.
///
/// Создаётся один раз при старте и передаётся по ссылке тем компонентам,
/// которым нужен общий хаб.
#[derive(Debug)]
pub struct Hubs {
    config: HubConfig,
    default: OnceCell<Hub>,
    scoped: DashMap<Arc<str>, Hub>,
}

impl Hubs {
    /// Все хабы набора создаются с этой конфигурацией.
    pub fn new(config: HubConfig) -> Result<Self, SettingsError> {
        config.validate()?;
        Ok(Self {
            config,
            default: OnceCell::new(),
            scoped: DashMap::new(),
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Общий хаб. Все вызовы возвращают один и тот же экземпляр.
    pub fn default_hub(&self) -> &Hub {
        self.default.get_or_init(|| {
            debug!("default hub created");
            Hub::from_valid(Some(Arc::from("default")), self.config.clone())
        })
    }

    /// Именованный хаб, не связанный ни с хабом по умолчанию, ни с другими
    /// именованными хабами. Создаётся при первом обращении.
    pub fn scoped(
        &self,
        name: &str,
    ) -> Hub {
        if let Some(hub) = self.scoped.get(name) {
            return hub.clone();
        }
        self.scoped
            .entry(Arc::from(name))
            .or_insert_with(|| {
                debug!(scope = name, "scoped hub created");
                Hub::from_valid(Some(Arc::from(name)), self.config.clone())
            })
            .clone()
    }

    /// Убирает именованный хаб из набора. Уже выданные дескрипторы
    /// продолжают работать.
    pub fn remove_scoped(
        &self,
        name: &str,
    ) -> Option<Hub> {
        self.scoped.remove(name).map(|(_, hub)| hub)
    }

    /// Имена существующих именованных хабов в алфавитном порядке.
    pub fn scoped_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scoped.iter().map(|e| e.key().to_string()).collect();
        names.sort();
        names
    }
}

impl Default for Hubs {
    fn default() -> Self {
        Self {
            config: HubConfig::default(),
            default: OnceCell::new(),
            scoped: DashMap::new(),
        }
    }
}
