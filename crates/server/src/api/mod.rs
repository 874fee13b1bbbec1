pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod tickets;
pub mod ws;

pub use error::ApiError;
pub use routes::create_router;
