//! Paginated, filtered listing of remote users.
//!
//! - `filters`: the filter mapping and the `POST /user/page` request body
//! - `controller`: `QueryController`, which sequences fetches by request id
//!   and applies only the latest reply

pub mod controller;
pub mod filters;

pub use controller::{
    FetchOutcome, QueryController, QueryState, ResourceCollection, DEFAULT_PAGE_SIZE,
};
pub use filters::{FilterKey, FilterValue, Filters, PageRequest, UserSearch};
