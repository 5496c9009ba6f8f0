use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, EventPublisher, InternalEvent};
use rand::Rng;
use std::sync::Arc;
use tracing::warn;

pub const SIMULATED_FAILURE_MESSAGE: &str = "Simulated publishing failure";

/// Decides whether a publish attempt should be failed on purpose
pub trait FaultInjector: Send + Sync {
    fn should_fail(&self) -> bool;
}

pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn should_fail(&self) -> bool {
        false
    }
}

pub struct AlwaysFail;

impl FaultInjector for AlwaysFail {
    fn should_fail(&self) -> bool {
        true
    }
}

/// Fails each attempt independently with the given probability
pub struct RandomFaults {
    probability: f64,
}

impl RandomFaults {
    /// Probability is clamped into `[0, 1]`; NaN counts as 0
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl FaultInjector for RandomFaults {
    fn should_fail(&self) -> bool {
        rand::rng().random_bool(self.probability)
    }
}

/// Pick the injector for a configured failure rate
pub fn fault_injector_for_rate(rate: f64) -> Arc<dyn FaultInjector> {
    if rate.is_nan() || rate <= 0.0 {
        Arc::new(NoFaults)
    } else if rate >= 1.0 {
        Arc::new(AlwaysFail)
    } else {
        Arc::new(RandomFaults::new(rate))
    }
}

/// Publisher decorator that fails selected attempts before they reach the bus
pub struct FaultInjectingPublisher {
    inner: Arc<dyn EventPublisher>,
    injector: Arc<dyn FaultInjector>,
}

impl FaultInjectingPublisher {
    pub fn new(inner: Arc<dyn EventPublisher>, injector: Arc<dyn FaultInjector>) -> Self {
        Self { inner, injector }
    }
}

#[async_trait]
impl EventPublisher for FaultInjectingPublisher {
    async fn publish(&self, event: &InternalEvent) -> DomainResult<()> {
        if self.injector.should_fail() {
            warn!(
                actor_id = %event.actor_id,
                event_type = ?event.event_type,
                "Simulated publish failure"
            );
            return Err(DomainError::PublishFailure(
                SIMULATED_FAILURE_MESSAGE.to_string(),
            ));
        }
        self.inner.publish(event).await
    }
}
