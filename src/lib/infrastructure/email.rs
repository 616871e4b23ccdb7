//! Email service implementations
//!
//! Each service is compiled in only when its client library is enabled:
//! - SparkPost (feature `sparkpost`, using reqwest)
//! - SMTP (feature `smtp`, using lettre)

mod registry;

#[cfg(feature = "smtp")]
pub mod smtp;
#[cfg(feature = "sparkpost")]
pub mod sparkpost;

pub use registry::{ServiceFactory, ServiceRegistry};
