pub mod config;
pub mod dispatch;
pub mod query;
pub mod queue;
pub mod shared;
