//! Operation handlers, one module per area.

pub mod account;
pub mod onboarding;
pub mod records;
pub mod relations;
pub mod resources;
