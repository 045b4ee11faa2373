mod airbyte;
mod ecs;
mod sensor;

pub use airbyte::*;
pub use ecs::*;
pub use sensor::*;
