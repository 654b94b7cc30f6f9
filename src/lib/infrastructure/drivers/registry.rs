//! Driver registry

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use lazy_static::lazy_static;
use tracing::debug;

use crate::domain::mail::{
    config::TransportConfig,
    driver::TransportDriver,
    errors::MailError,
};
use crate::infrastructure::drivers::{memory::MemoryDriver, smtp::SmtpDriver};

type DriverFactory = Box<dyn Fn() -> Box<dyn TransportDriver> + Send + Sync>;

lazy_static! {
    static ref REGISTRY: DriverRegistry = DriverRegistry::new();
}

/// Registers a driver factory under `name` on the process-wide registry.
///
/// Registration takes effect for subsequent [`driver`] lookups; drivers
/// already instantiated are unaffected. No validation of the factory is
/// performed here, a mismatched implementation surfaces later as failures
/// from the driver's own operations.
pub fn extend<F, D>(name: impl Into<String>, factory: F)
where
    F: Fn() -> D + Send + Sync + 'static,
    D: TransportDriver + 'static,
{
    REGISTRY.extend(name, factory);
}

/// Instantiates and configures the driver named `name` from the
/// process-wide registry.
pub fn driver(
    name: &str,
    config: &TransportConfig,
) -> Result<Box<dyn TransportDriver>, MailError> {
    REGISTRY.driver(name, config)
}

/// Maps driver names to factories.
///
/// Built-in drivers are fixed at construction; user drivers are added
/// through [`DriverRegistry::extend`] at any time, with the map guarded
/// against concurrent registration and lookup.
pub struct DriverRegistry {
    builtins: HashMap<&'static str, DriverFactory>,
    custom: RwLock<HashMap<String, DriverFactory>>,
}

impl DriverRegistry {
    /// Creates a registry holding the built-in `smtp` and `memory`
    /// drivers.
    pub fn new() -> Self {
        let mut builtins: HashMap<&'static str, DriverFactory> = HashMap::new();

        builtins.insert(
            "smtp",
            Box::new(|| Box::new(SmtpDriver::new()) as Box<dyn TransportDriver>),
        );
        builtins.insert(
            "memory",
            Box::new(|| Box::new(MemoryDriver) as Box<dyn TransportDriver>),
        );

        Self {
            builtins,
            custom: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a driver factory under `name`, stored as given.
    pub fn extend<F, D>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> D + Send + Sync + 'static,
        D: TransportDriver + 'static,
    {
        let name = name.into();
        debug!(%name, "registering mail driver");

        self.custom
            .write()
            .expect("driver registry lock poisoned")
            .insert(
                name,
                Box::new(move || Box::new(factory()) as Box<dyn TransportDriver>),
            );
    }

    /// Instantiates the driver registered under `name` and applies
    /// `config` to it before returning it.
    ///
    /// The lookup is case-insensitive; built-ins win a name collision with
    /// user-registered drivers.
    pub fn driver(
        &self,
        name: &str,
        config: &TransportConfig,
    ) -> Result<Box<dyn TransportDriver>, MailError> {
        if name.is_empty() {
            return Err(MailError::InvalidArgument(
                "cannot get a driver instance without a name".to_string(),
            ));
        }

        let key = name.to_lowercase();

        let mut driver = match self.builtins.get(key.as_str()) {
            Some(factory) => factory(),
            None => {
                let custom = self.custom.read().expect("driver registry lock poisoned");

                match custom.get(&key) {
                    Some(factory) => factory(),
                    None => return Err(MailError::UnknownDriver(key)),
                }
            }
        };

        driver.set_config(config)?;

        Ok(driver)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> =
            self.builtins.keys().map(|s| s.to_string()).collect();

        if let Ok(custom) = self.custom.read() {
            names.extend(custom.keys().cloned());
        }

        names.sort_unstable();

        f.debug_struct("DriverRegistry").field("drivers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use async_trait::async_trait;
    use serde_json::json;
    use testresult::TestResult;

    use crate::domain::mail::driver::{DeliveryResult, DriverError};
    use crate::domain::mail::message::Message;

    use super::*;

    struct RecordingDriver {
        config: Arc<Mutex<Option<TransportConfig>>>,
    }

    #[async_trait]
    impl TransportDriver for RecordingDriver {
        fn set_config(&mut self, config: &TransportConfig) -> Result<(), DriverError> {
            *self.config.lock().unwrap() = Some(config.clone());
            Ok(())
        }

        async fn send(&self, _message: &Message) -> Result<DeliveryResult, DriverError> {
            Ok(DeliveryResult::default())
        }
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let registry = DriverRegistry::new();

        let result = registry.driver("", &TransportConfig::default());

        assert!(matches!(result, Err(MailError::InvalidArgument(_))));
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let registry = DriverRegistry::new();

        let result = registry.driver("sparkpost", &TransportConfig::default());

        assert!(matches!(
            result,
            Err(MailError::UnknownDriver(name)) if name == "sparkpost"
        ));
    }

    #[test]
    fn test_custom_driver_lookup_is_case_insensitive_and_configured() -> TestResult {
        let registry = DriverRegistry::new();
        let seen = Arc::new(Mutex::new(None));

        let captured = Arc::clone(&seen);
        registry.extend("custom", move || RecordingDriver {
            config: Arc::clone(&captured),
        });

        let config = TransportConfig::new(json!({ "driver": "custom", "token": "secret" }));
        registry.driver("CUSTOM", &config)?;

        assert_eq!(seen.lock().unwrap().as_ref(), Some(&config));

        Ok(())
    }

    #[test]
    fn test_builtins_win_name_collisions() -> TestResult {
        let registry = DriverRegistry::new();
        let constructed = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&constructed);
        registry.extend("memory", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            MemoryDriver
        });

        registry.driver("memory", &TransportConfig::new(json!({ "driver": "memory" })))?;

        assert_eq!(constructed.load(Ordering::SeqCst), 0);

        Ok(())
    }

    #[test]
    fn test_set_config_failure_propagates() {
        struct RejectingDriver;

        #[async_trait]
        impl TransportDriver for RejectingDriver {
            fn set_config(&mut self, _config: &TransportConfig) -> Result<(), DriverError> {
                Err(DriverError::Config("missing api key".to_string()))
            }

            async fn send(&self, _message: &Message) -> Result<DeliveryResult, DriverError> {
                Ok(DeliveryResult::default())
            }
        }

        let registry = DriverRegistry::new();
        registry.extend("rejecting", || RejectingDriver);

        let result = registry.driver("rejecting", &TransportConfig::default());

        assert!(matches!(
            result,
            Err(MailError::Driver(DriverError::Config(_)))
        ));
    }

    #[tokio::test]
    async fn test_builtin_drivers_resolve() -> TestResult {
        let registry = DriverRegistry::new();

        registry.driver("memory", &TransportConfig::new(json!({ "driver": "memory" })))?;
        registry.driver(
            "smtp",
            &TransportConfig::new(json!({ "driver": "smtp", "host": "smtp.mailtrap.io" })),
        )?;

        Ok(())
    }
}
