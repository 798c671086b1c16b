//! Sink factories
//!
//! A factory turns a domain's [`Settings`] into the sinks that domain owns.
//! The manager calls it once per `configure`, before any lock is taken, so a
//! failing factory leaves the domain untouched.

use crate::core::{Result, Settings, Sink};
use crate::sinks::{ConsoleSink, RotatingFileSink};
use std::sync::Arc;

/// Sinks owned by one domain, in write order
pub type SinkList = Vec<Arc<dyn Sink>>;

/// Builds the sinks of a domain from its settings
///
/// Closures `Fn(&Settings) -> Result<SinkList>` implement this trait.
///
/// # Example
///
/// ```
/// use domain_logger::core::{Settings, Sink};
/// use domain_logger::manager::{DefaultSinkFactory, SinkFactory, SinkList};
/// use domain_logger::sinks::MemorySink;
/// use std::sync::Arc;
///
/// let capture = Arc::new(MemorySink::new());
/// let extra = capture.clone();
/// let factory = DefaultSinkFactory.chain(move |_: &Settings| -> domain_logger::Result<SinkList> {
///     Ok(vec![extra.clone() as Arc<dyn Sink>])
/// });
///
/// let sinks = factory.build(&Settings::default()).unwrap();
/// assert_eq!(sinks.len(), 2);
/// ```
pub trait SinkFactory: Send + Sync {
    /// Build fresh sinks for `settings`
    ///
    /// # Errors
    ///
    /// Returns an error when a sink cannot be created, e.g. an unwritable
    /// log directory.
    fn build(&self, settings: &Settings) -> Result<SinkList>;

    /// Append the sinks of `next` after the sinks of this factory
    fn chain<F>(self, next: F) -> Chain<Self, F>
    where
        Self: Sized,
        F: SinkFactory,
    {
        Chain { first: self, second: next }
    }
}

impl<F> SinkFactory for F
where
    F: Fn(&Settings) -> Result<SinkList> + Send + Sync,
{
    fn build(&self, settings: &Settings) -> Result<SinkList> {
        self(settings)
    }
}

/// Console sink on stderr, plus a rotating file sink when both `log_dir` and
/// `log_file` are set. Both use the domain level as their threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSinkFactory;

impl SinkFactory for DefaultSinkFactory {
    fn build(&self, settings: &Settings) -> Result<SinkList> {
        let mut sinks: SinkList = vec![Arc::new(ConsoleSink::new().with_threshold(settings.level))];

        if let Some(path) = settings.log_path() {
            let file = RotatingFileSink::new(path, settings.max_bytes, settings.backup_count)?
                .with_threshold(settings.level);
            sinks.push(Arc::new(file));
        }

        Ok(sinks)
    }
}

/// Two factories run one after the other; see [`SinkFactory::chain`]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A: SinkFactory, B: SinkFactory> SinkFactory for Chain<A, B> {
    fn build(&self, settings: &Settings) -> Result<SinkList> {
        let mut sinks = self.first.build(settings)?;
        match self.second.build(settings) {
            Ok(more) => {
                sinks.extend(more);
                Ok(sinks)
            }
            Err(e) => {
                // Release what the first factory opened
                for sink in &sinks {
                    let _ = sink.close();
                }
                Err(e)
            }
        }
    }
}
