//! HTTP surface: read endpoints and scheduler controls

pub mod routes;

pub use routes::build_router;
