pub mod availability;
pub mod get;
pub mod list;

pub use availability::{
    AvailabilitySlot, GetAvailabilityError, GetAvailabilityQuery, GetAvailabilityResponse,
};
pub use get::{GetSpaceError, GetSpaceQuery};
pub use list::{ListSpacesError, ListSpacesQuery, ListSpacesResponse};
