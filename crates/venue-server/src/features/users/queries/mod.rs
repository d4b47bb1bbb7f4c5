pub mod get;

pub use get::{GetUserError, GetUserQuery, GetUserResponse};
