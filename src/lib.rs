pub mod app;
pub mod cloud;
pub mod config;
pub mod error;
pub mod feeds;
pub mod fetch;
pub mod ui;

pub use app::App;
pub use config::Config;
pub use error::{LayoutExhaustion, RetryError, TransportError};
pub use fetch::{FetchLifecycle, FetchState};
