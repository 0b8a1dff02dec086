//! Learning-and-control pipeline: observation -> decision every frame,
//! observation -> sample -> train on a periodic cadence.
//!
//! ```text
//! World (per frame)
//!     │
//!     ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │  FeatureEncoder                                            │
//! │  - self + neighbor feature groups, normalized, relative    │
//! │  - fixed-shape zero-padded tensor packing                  │
//! └────────────────────────────────────────────────────────────┘
//!     │                          │ (human-controlled agent only)
//!     ▼                          ▼
//! ┌──────────────────┐     ┌──────────────────────────────────┐
//! │  Decider         │     │  SampleSet                       │
//! │  - forward pass  │     │  - append-only, grouped by       │
//! │  - decode action │     │    action kind                   │
//! └──────────────────┘     └──────────────────────────────────┘
//!     │                          │ (periodic batch pull)
//!     ▼                          ▼
//! move-to / attack          ┌──────────────────────────────────┐
//! commands                  │  Trainer                         │
//!                           │  - masked multi-task loss        │
//!                           │  - Adam step, loss metric        │
//!                           └──────────────────────────────────┘
//! ```

pub mod decider;
pub mod encoder;
pub mod error;
pub mod metrics;
pub mod network;
pub mod samples;
pub mod service;
pub mod trainer;

pub use decider::{Decider, Decision};
pub use encoder::{EncoderConfig, FeatureEncoder, Observation};
pub use error::MlError;
pub use metrics::{MetricsRegistry, MetricsSink, NullSink};
pub use network::{PolicyConfig, PolicyModel, composite_loss};
pub use samples::{ActionKind, ActionLabel, Sample, SampleSet, TargetKind};
pub use service::{PolicyService, ServiceConfig};
pub use trainer::{TrainReport, Trainer, TrainerConfig};
