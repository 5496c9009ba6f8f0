pub mod domain;
pub mod garde;
pub mod memory;
pub mod nats;
pub mod postgres;
pub mod telemetry;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockEventPublisher;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockMappedEventRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockMappingRuleRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockRawEventRepository;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockJetStreamPublisher;
