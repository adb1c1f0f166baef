mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;
pub(crate) mod utils;
mod ws;

pub use error::ApiError;
pub use server::{router, run};
pub use state::AppState;
