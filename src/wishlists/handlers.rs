use axum::{
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{
    AddItemRequest, CreateWishlistRequest, ItemResponse, SharedWishlistResponse, VisibilityRequest,
    VisibilityResponse, WishlistResponse,
};
use super::repo::{NewItem, NewWishlist, SharedPurchase, Wishlist, WishlistItem};
use super::services::{
    hide_reserved, parse_price, parse_priority, require_name, share_path, sort_for_display,
};
use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    state::AppState,
    users::{repo::User, services::public_owner},
};

// --- public routers ---

pub fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/wishlists", get(list_wishlists).post(create_wishlist))
        .route("/wishlists/:id", get(get_wishlist).delete(delete_wishlist))
        .route("/wishlists/:id/visibility", put(set_visibility))
        .route("/wishlists/:id/items", post(add_item))
        .route("/wishlists/:id/items/:item_id", axum::routing::delete(delete_item))
        .route("/wishlists/:id/items/:item_id/purchase", post(mark_item_purchased))
}

pub fn shared_routes() -> Router<AppState> {
    Router::new()
        .route("/shared/wishlists/:id", get(get_shared_wishlist))
        .route(
            "/shared/wishlists/:id/items/:item_id/purchase",
            post(mark_shared_item_purchased),
        )
}

fn not_found() -> AppError {
    AppError::NotFound("Wishlist not found".into())
}

async fn load_items(db: &PgPool, wishlist_id: Uuid) -> anyhow::Result<Vec<ItemResponse>> {
    let mut items: Vec<ItemResponse> = WishlistItem::list_by_wishlist(db, wishlist_id)
        .await?
        .into_iter()
        .map(ItemResponse::from)
        .collect();
    sort_for_display(&mut items);
    Ok(items)
}

// --- owner handlers ---

#[instrument(skip(state))]
pub async fn list_wishlists(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<WishlistResponse>>, AppError> {
    let wishlists = Wishlist::list_by_user(&state.db, user_id).await?;
    Ok(Json(
        wishlists
            .into_iter()
            .map(|w| WishlistResponse::new(w, Vec::new()))
            .collect(),
    ))
}

#[instrument(skip(state, payload))]
pub async fn create_wishlist(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateWishlistRequest>,
) -> Result<(StatusCode, [(HeaderName, String); 1], Json<WishlistResponse>), AppError> {
    let new = NewWishlist {
        name: require_name(&payload.name, "Wishlist")?,
        description: payload
            .description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty()),
        is_public: payload.is_public,
    };

    let wishlist = Wishlist::create(&state.db, user_id, &new).await?;
    info!(%user_id, wishlist_id = %wishlist.id, "wishlist created");

    let location = format!("/api/v1/wishlists/{}", wishlist.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(WishlistResponse::new(wishlist, Vec::new())),
    ))
}

#[instrument(skip(state))]
pub async fn get_wishlist(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<WishlistResponse>, AppError> {
    let wishlist = Wishlist::find_owned(&state.db, user_id, id)
        .await?
        .ok_or_else(not_found)?;

    let mut items = load_items(&state.db, wishlist.id).await?;
    let hides_reserved = User::find_by_id(&state.db, user_id)
        .await?
        .is_some_and(|u| u.hide_reserved_items);
    if hides_reserved {
        hide_reserved(&mut items, user_id);
        sort_for_display(&mut items);
    }

    Ok(Json(WishlistResponse::new(wishlist, items)))
}

#[instrument(skip(state))]
pub async fn delete_wishlist(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !Wishlist::delete_owned(&state.db, user_id, id).await? {
        return Err(not_found());
    }
    info!(%user_id, wishlist_id = %id, "wishlist deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn set_visibility(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<VisibilityRequest>,
) -> Result<Json<VisibilityResponse>, AppError> {
    let wishlist = Wishlist::set_visibility(&state.db, user_id, id, payload.is_public)
        .await?
        .ok_or_else(not_found)?;
    info!(%user_id, wishlist_id = %id, is_public = wishlist.is_public, "wishlist visibility changed");
    Ok(Json(VisibilityResponse {
        id: wishlist.id,
        is_public: wishlist.is_public,
        share_path: share_path(wishlist.id),
    }))
}

#[instrument(skip(state, payload))]
pub async fn add_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), AppError> {
    let new = NewItem {
        name: require_name(&payload.name, "Item")?,
        description: payload.description.unwrap_or_default().trim().to_owned(),
        price: parse_price(payload.price.as_ref())?,
        priority: parse_priority(payload.priority.as_ref())?,
        url: payload.url.unwrap_or_default().trim().to_owned(),
        notes: payload.notes.unwrap_or_default().trim().to_owned(),
    };

    let item = WishlistItem::add_to_owned(&state.db, user_id, id, &new)
        .await?
        .ok_or_else(not_found)?;
    info!(%user_id, wishlist_id = %id, item_id = %item.id, "item added");
    Ok((StatusCode::CREATED, Json(ItemResponse::from(item))))
}

#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    if !WishlistItem::delete_owned(&state.db, user_id, id, item_id).await? {
        return Err(AppError::NotFound("Item not found".into()));
    }
    info!(%user_id, wishlist_id = %id, %item_id, "item deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn mark_item_purchased(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    if !WishlistItem::mark_purchased_owned(&state.db, user_id, id, item_id).await? {
        return Err(AppError::NotFound("Item not found".into()));
    }
    info!(%user_id, wishlist_id = %id, %item_id, "own item marked purchased");
    Ok(StatusCode::NO_CONTENT)
}

// --- shared handlers ---

#[instrument(skip(state))]
pub async fn get_shared_wishlist(
    State(state): State<AppState>,
    AuthUser(_viewer): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SharedWishlistResponse>, AppError> {
    let wishlist = Wishlist::find_public(&state.db, id)
        .await?
        .ok_or_else(not_found)?;
    let owner = User::find_by_id(&state.db, wishlist.user_id)
        .await?
        .ok_or_else(not_found)?;

    let items = load_items(&state.db, wishlist.id).await?;
    Ok(Json(SharedWishlistResponse {
        wishlist: WishlistResponse::new(wishlist, items),
        owner: public_owner(&state, owner).await?,
    }))
}

#[instrument(skip(state))]
pub async fn mark_shared_item_purchased(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    match WishlistItem::mark_purchased_shared(&state.db, viewer, id, item_id).await? {
        SharedPurchase::Marked => {
            info!(purchaser = %viewer, wishlist_id = %id, %item_id, "shared item marked purchased");
            Ok(StatusCode::NO_CONTENT)
        }
        SharedPurchase::AlreadyPurchased => {
            Err(AppError::Conflict("Item has already been purchased".into()))
        }
        SharedPurchase::NotFound => Err(AppError::NotFound("Item not found".into())),
    }
}
