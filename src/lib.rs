pub mod infra;
pub mod ml;
pub mod world;

// Re-export commonly used types for convenience
pub use infra::{PlayArea, Vec2};
pub use ml::{Decider, FeatureEncoder, PolicyService, Trainer};
pub use world::{EntityId, Skirmish};
