//! Domain model module declarations.

pub mod analysis;
pub mod log_entry;
pub mod member;
pub mod post;
pub mod scheduler_state;
