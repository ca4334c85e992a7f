pub mod extract;
pub mod handlers;
pub mod parser;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::product_routes()
}
