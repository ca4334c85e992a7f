use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::instrument;

use super::parser::{parse_product_url, ParsedProduct};
use crate::{auth::jwt::AuthUser, error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ParseProductRequest {
    pub url: String,
}

pub fn product_routes() -> Router<AppState> {
    Router::new().route("/products/parse", post(parse_product))
}

#[instrument(skip(state))]
pub async fn parse_product(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Json(payload): Json<ParseProductRequest>,
) -> Result<Json<ParsedProduct>, AppError> {
    Ok(Json(parse_product_url(&state.http, &payload.url).await?))
}
