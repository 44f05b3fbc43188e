pub mod analytics;
pub mod config;
pub mod error;
pub mod observe;
pub mod response;
pub mod signal;
pub mod verdict;

pub use analytics::DashboardMetrics;
pub use config::Config;
pub use error::*;
pub use observe::{NoopObserver, OperationObserver, Outcome};
pub use response::*;
pub use signal::*;
pub use verdict::*;
