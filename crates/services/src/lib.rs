#![forbid(unsafe_code)]

pub mod analytics;
pub mod driver;
pub mod error;
pub mod identity;
pub mod page;
pub mod player;
pub mod scheduler;
pub mod simulation;
pub mod transport;

pub use watch_core::Clock;

pub use analytics::{
    AnalyticsSink, FailingTag, MeasurementProtocolSink, MeasurementProtocolTag, RecordingSink,
    RecordingTag, SinkRef, TagLoader,
};
pub use driver::{Signal, WatchSessionDriver};
pub use error::{SinkError, StoreError, TagLoadError};
pub use identity::{FixedPrompt, IdentifierStore, MemoryIdentifierStore, ParticipantPrompt};
pub use page::PageBootstrap;
pub use player::{PlayerRef, VideoPlayer};
pub use scheduler::{ManualScheduler, Scheduler, SchedulerRef, TokioScheduler};
pub use simulation::{SimulatedPlayer, SimulatedSession};
pub use transport::{Transport, TransportRef};
