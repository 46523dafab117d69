// Core data models for truck tracking

pub mod stage;
pub mod truck;
pub mod user;
pub mod event;

pub use stage::*;
pub use truck::*;
pub use user::*;
pub use event::*;
