pub mod create;
pub mod delete;
pub mod update;

pub use create::{CreateSpaceCommand, CreateSpaceError};
pub use delete::{DeleteSpaceCommand, DeleteSpaceError, DeleteSpaceResponse};
pub use update::{UpdateSpaceCommand, UpdateSpaceError};
