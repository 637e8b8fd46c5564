//! Architex HTTP API: status updates, admin comments, in-app
//! notifications and the failure audit surface.

pub mod middleware;
pub mod routes;
pub mod state;
