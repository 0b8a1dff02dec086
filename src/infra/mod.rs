mod types;

pub use types::{PlayArea, Vec2};
