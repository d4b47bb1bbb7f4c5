pub mod commands;
pub mod queries;
pub mod routes;
pub mod types;

pub use commands::{
    CreateSpaceCommand, CreateSpaceError, DeleteSpaceCommand, DeleteSpaceError,
    DeleteSpaceResponse, UpdateSpaceCommand, UpdateSpaceError,
};
pub use queries::{
    AvailabilitySlot, GetAvailabilityError, GetAvailabilityQuery, GetAvailabilityResponse,
    GetSpaceError, GetSpaceQuery, ListSpacesError, ListSpacesQuery, ListSpacesResponse,
};
pub use types::SpaceItem;

pub use routes::spaces_routes;
