//! Client-side data access for the ticket desk: a resilient repository
//! layer over the remote ticket API, with an offline fallback dataset and
//! the ticket lifecycle rules.

pub mod api;
pub mod client;
pub mod config;
pub mod degraded;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod token;
pub mod transport;

pub use self::{
    client::Client,
    config::Config,
    degraded::DegradedStore,
    error::Error,
    token::TokenStore,
    transport::{Gateway, Transport},
};
