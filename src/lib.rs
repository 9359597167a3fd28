pub mod admin;
pub mod auth;
pub mod booking;
pub mod calendar;
pub mod compactor;
pub mod config;
pub mod eligibility;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod session;
pub mod sql;
pub mod store;
pub mod tls;
pub mod wal;
pub mod wire;
