pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{marker_body, seed_objects};
