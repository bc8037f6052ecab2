//! HTTP API: routing, bearer middleware and error mapping over the auth
//! subsystem.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
