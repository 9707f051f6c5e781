pub mod compare;
pub mod diff;
pub mod edit;
pub mod fetch;
pub mod logs;
pub mod monitoring;
pub mod project;
pub mod resolve;
