pub mod api;
pub mod authn;
pub mod check;
pub mod config;
pub mod context;
pub mod fetch;
pub mod handlers;
pub mod logs;
pub mod paths;
pub mod pdp;
pub mod registry;
pub mod response;
pub mod restful;
pub mod store;
pub mod upstream;
