pub mod analyze;
pub mod config;
pub mod sessions;

pub use analyze::*;
pub use config::*;
pub use sessions::*;
