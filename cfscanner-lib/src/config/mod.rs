mod defaults;
mod loader;
mod root;
pub mod template;

pub use loader::{load, LoadOptions};
pub use root::ScanConfig;
