//! Engine store access: rate history, momentum state, group enumeration

pub mod groups;
pub mod momentum;
pub mod rates;
