pub mod traits;
pub mod search;
pub mod target;
pub mod fetch;
pub mod storage;
pub mod manager;

pub use manager::{ConfigManager, AppConfig};
pub use search::{SearchConfig, LengthBounds};
pub use target::TargetConfig;
pub use fetch::FetchConfig;
pub use storage::StorageConfig;
