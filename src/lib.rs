// Library surface shared by the binary and the integration tests.
pub mod app_dirs;
pub mod config;
pub mod form_monitor;
pub mod geometry;
pub mod history;
pub mod landmarks;
pub mod posture;
pub mod rep_counter;
pub mod runtime;
pub mod session;
pub mod summary;
pub mod util;
