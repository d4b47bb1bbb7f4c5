pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{CreateUserCommand, CreateUserError, CreateUserResponse, UserRole};
pub use queries::{GetUserError, GetUserQuery, GetUserResponse};

pub use routes::users_routes;
