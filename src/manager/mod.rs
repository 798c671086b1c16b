//! Domain manager, sink factories and producer handles

pub mod domain_manager;
pub mod factory;
pub mod logger;

pub use domain_manager::{DomainManager, DomainManagerBuilder, DomainStatus, ShutdownReport};
pub use factory::{Chain, DefaultSinkFactory, SinkFactory, SinkList};
pub use logger::DomainLogger;
