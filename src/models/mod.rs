// Re-export all model types from submodules
mod nutrition;
mod tasks;
mod users;

pub use nutrition::*;
pub use tasks::*;
pub use users::*;
