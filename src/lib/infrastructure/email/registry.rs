//! Registry of email services, keyed by short name

use std::fmt;

use tracing::debug;

use crate::{
    domain::email::{errors::ServiceError, MailService},
    infrastructure::config::EmailConfig,
};

/// The construction side of an email service.
pub trait ServiceFactory: MailService + Sized + 'static {
    /// The short name the service is registered under
    const NAME: &'static str;

    /// Whether the service can run in this build. Must not perform I/O.
    fn is_supported() -> bool;

    /// Builds the service from its section of the configuration
    fn from_config(config: &EmailConfig) -> Result<Self, ServiceError>;
}

type BuildFn = fn(&EmailConfig) -> Result<Box<dyn MailService>, ServiceError>;

#[derive(Clone, Copy)]
struct ServiceEntry {
    name: &'static str,
    is_supported: fn() -> bool,
    build: BuildFn,
}

impl fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn build<T>(config: &EmailConfig) -> Result<Box<dyn MailService>, ServiceError>
where
    T: ServiceFactory,
{
    Ok(Box::new(T::from_config(config)?))
}

/// Maps service names to their constructors, in registration order.
///
/// The default registry holds every service compiled into this build.
#[derive(Clone, Debug)]
pub struct ServiceRegistry {
    entries: Vec<ServiceEntry>,
}

impl ServiceRegistry {
    /// A registry without any service
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers `T`, replacing any service already registered under its name.
    pub fn register<T>(&mut self) -> &mut Self
    where
        T: ServiceFactory,
    {
        let entry = ServiceEntry {
            name: T::NAME,
            is_supported: T::is_supported,
            build: build::<T>,
        };

        match self.entry(T::NAME) {
            Some(index) => self.entries[index] = entry,
            None => self.entries.push(entry),
        }

        self
    }

    /// Whether a service is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// The names of the services that can run in this build
    pub fn supported(&self) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|entry| (entry.is_supported)())
            .map(|entry| entry.name)
            .collect()
    }

    /// Builds the service registered under `name`.
    ///
    /// # Returns
    /// - [`ServiceError::UnknownService`] if nothing is registered under that name.
    /// - [`ServiceError::UnsupportedService`] if the service cannot run in this build.
    /// - [`ServiceError::InvalidConfiguration`] if its configuration is incomplete.
    pub fn resolve(
        &self,
        name: &str,
        config: &EmailConfig,
    ) -> Result<Box<dyn MailService>, ServiceError> {
        let entry = self
            .entry(name)
            .map(|index| self.entries[index])
            .ok_or_else(|| ServiceError::UnknownService(name.to_string()))?;

        if !(entry.is_supported)() {
            return Err(ServiceError::UnsupportedService(entry.name.to_string()));
        }

        debug!("resolving email service {}", entry.name);

        (entry.build)(config)
    }

    fn entry(&self, name: &str) -> Option<usize> {
        let name = name.trim();

        self.entries
            .iter()
            .position(|entry| entry.name.eq_ignore_ascii_case(name))
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::empty();

        #[cfg(feature = "sparkpost")]
        registry.register::<super::sparkpost::SparkPostService>();

        #[cfg(feature = "smtp")]
        registry.register::<super::smtp::SmtpService>();

        registry
    }
}
