use crate::state::AppState;
use axum::Router;

mod dto;
mod error;
pub mod handlers;
pub mod password;
pub mod service;
pub mod token;

pub use error::AuthError;
pub use service::AuthService;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
