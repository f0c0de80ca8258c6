mod env_store;
mod fs_utils;
mod layout;
mod lock;
mod sentinel;

pub use env_store::{set_current_version, EnvFileStore, APP_VERSION_KEY};
pub use fs_utils::write_atomic;
pub use layout::InstallLayout;
pub use lock::with_upgrade_lock;
pub use sentinel::{PurchaseSentinel, PurchaseState};
