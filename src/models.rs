pub mod event;
pub mod integration;
pub mod rule;
pub mod store;
pub mod task;
pub mod template;
