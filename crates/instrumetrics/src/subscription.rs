//! Publish/subscribe delivery of metric reports.
//!
//! A subscription is a named, filtered view of a registry. Publishing it
//! captures a fresh [`MetricsReport`] and broadcasts it to every
//! [`SubscriptionStream`] currently listening. When to publish is left to
//! the caller: invoke [`MetricsRegistry::publish`] from any timing source,
//! or let [`MetricsRegistry::spawn_publisher`] do it on a fixed period.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::error::{MetricsError, Result};
use crate::registry::{MetricFilters, MetricsRegistry};
use crate::report::MetricsReport;

/// What a subscription reports.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionConfig {
    /// Names to include per metric kind.
    pub filters: MetricFilters,
    /// Label copied into every report.
    pub label: Option<String>,
}

impl SubscriptionConfig {
    /// Creates a configuration that reports everything, unlabeled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filters.
    #[must_use]
    pub fn filters(mut self, filters: MetricFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug)]
pub(crate) struct Subscription {
    config: SubscriptionConfig,
    sender: broadcast::Sender<Arc<MetricsReport>>,
}

fn subscription_name() -> String {
    format!("{:08x}", rand::random::<u32>())
}

impl MetricsRegistry {
    /// Registers a subscription and returns its unique 8 hex digit name.
    #[must_use]
    pub fn subscribe(&self, config: SubscriptionConfig) -> String {
        let mut subscriptions = self.subscriptions.write();

        let mut name = subscription_name();
        while subscriptions.contains_key(&name) {
            name = subscription_name();
        }

        let (sender, _) = broadcast::channel(self.config.subscription_buffer);
        debug!(
            subscription = %name,
            label = config.label.as_deref().unwrap_or_default(),
            "subscribed"
        );
        subscriptions.insert(name.clone(), Subscription { config, sender });
        name
    }

    /// Returns a stream of the reports published for subscription `name`.
    ///
    /// The stream sees reports published after this call and ends when the
    /// subscription is removed.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::SubscriptionNotFound` if no such subscription exists.
    pub fn listen(&self, name: &str) -> Result<SubscriptionStream> {
        let subscriptions = self.subscriptions.read();
        let subscription = subscriptions
            .get(name)
            .ok_or_else(|| MetricsError::SubscriptionNotFound {
                name: name.to_string(),
            })?;
        Ok(SubscriptionStream::new(
            name.to_string(),
            subscription.sender.subscribe(),
        ))
    }

    /// Captures the report for subscription `name` and delivers it to every
    /// current listener.
    ///
    /// Returns how many listeners the report was queued for. Listeners
    /// receive it asynchronously.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::SubscriptionNotFound` if no such subscription exists.
    pub fn publish(&self, name: &str) -> Result<usize> {
        let (config, sender) = {
            let subscriptions = self.subscriptions.read();
            let subscription =
                subscriptions
                    .get(name)
                    .ok_or_else(|| MetricsError::SubscriptionNotFound {
                        name: name.to_string(),
                    })?;
            (subscription.config.clone(), subscription.sender.clone())
        };

        let mut report = self.metrics(&config.filters);
        report.label = config.label;

        // Sending fails only when nobody is listening.
        let delivered = sender.send(Arc::new(report)).unwrap_or(0);
        debug!(subscription = %name, delivered, "published metrics report");
        Ok(delivered)
    }

    /// Removes subscription `name`, ending every stream listening to it.
    ///
    /// Returns false if no such subscription existed.
    pub fn unsubscribe(&self, name: &str) -> bool {
        let removed = self.subscriptions.write().remove(name).is_some();
        if removed {
            debug!(subscription = %name, "unsubscribed");
        }
        removed
    }

    /// Returns true if subscription `name` exists.
    #[must_use]
    pub fn is_subscribed(&self, name: &str) -> bool {
        self.subscriptions.read().contains_key(name)
    }

    /// Publishes subscription `name` every `period` on the current Tokio
    /// runtime until the subscription or the registry goes away.
    ///
    /// The first report is published one `period` after this call.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::SubscriptionNotFound` if no such subscription
    /// exists, `MetricsError::InvalidConfig` for a zero period and
    /// `MetricsError::RuntimeUnavailable` outside of a Tokio runtime.
    pub fn spawn_publisher(
        self: &Arc<Self>,
        name: &str,
        period: Duration,
    ) -> Result<JoinHandle<()>> {
        if period.is_zero() {
            return Err(MetricsError::InvalidConfig {
                reason: "publish period must be non-zero".to_string(),
            });
        }
        if !self.is_subscribed(name) {
            return Err(MetricsError::SubscriptionNotFound {
                name: name.to_string(),
            });
        }
        let runtime = tokio::runtime::Handle::try_current()?;

        let registry: Weak<Self> = Arc::downgrade(self);
        let name = name.to_string();
        debug!(subscription = %name, ?period, "starting publisher");

        Ok(runtime.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                if registry.publish(&name).is_err() {
                    break;
                }
            }
            debug!(subscription = %name, "publisher stopped");
        }))
    }
}

/// Async stream of the reports published for one subscription.
///
/// Slow listeners skip the reports they fell behind on.
#[derive(Debug)]
pub struct SubscriptionStream {
    name: String,
    receiver: broadcast::Receiver<Arc<MetricsReport>>,
    closed: bool,
}

impl SubscriptionStream {
    const fn new(name: String, receiver: broadcast::Receiver<Arc<MetricsReport>>) -> Self {
        Self {
            name,
            receiver,
            closed: false,
        }
    }

    /// Returns the subscription name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once the subscription has been removed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Receives the next report.
    ///
    /// Returns `None` once the subscription has been removed.
    pub async fn recv(&mut self) -> Option<Arc<MetricsReport>> {
        loop {
            match self.receiver.recv().await {
                Ok(report) => return Some(report),
                Err(broadcast::error::RecvError::Closed) => {
                    self.closed = true;
                    return None;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(subscription = %self.name, skipped, "listener lagged");
                }
            }
        }
    }
}

impl Stream for SubscriptionStream {
    type Item = Arc<MetricsReport>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.closed {
            return Poll::Ready(None);
        }

        // `recv` is cancel safe, so a fresh future per poll loses nothing.
        let future = self.recv();
        tokio::pin!(future);

        future.poll(cx)
    }
}
