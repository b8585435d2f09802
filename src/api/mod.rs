pub mod api_key;
pub mod handlers;
pub mod routes;

pub use api_key::*;
pub use handlers::*;
pub use routes::*;
