//! Domain layer
pub mod aggregates;
pub mod events;
pub mod value_objects;
pub mod variants;
