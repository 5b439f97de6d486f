mod api_models;
mod error;
mod handlers;
mod router;

pub use router::router;
