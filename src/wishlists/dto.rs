use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{Wishlist, WishlistItem};
use super::services::NumberOrText;
use crate::users::dto::PublicOwner;

#[derive(Debug, Deserialize)]
pub struct CreateWishlistRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<NumberOrText>,
    #[serde(default)]
    pub priority: Option<NumberOrText>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub is_public: bool,
}

#[derive(Debug, Serialize)]
pub struct VisibilityResponse {
    pub id: Uuid,
    pub is_public: bool,
    pub share_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub wishlist_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub priority: u8,
    pub url: String,
    pub notes: String,
    pub is_purchased: bool,
    pub purchased_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub purchased_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<WishlistItem> for ItemResponse {
    fn from(i: WishlistItem) -> Self {
        Self {
            id: i.id,
            wishlist_id: i.wishlist_id,
            name: i.name,
            description: i.description,
            price: i.price,
            priority: i.priority.clamp(1, 5) as u8,
            url: i.url,
            notes: i.notes,
            is_purchased: i.is_purchased,
            purchased_by: i.purchased_by,
            purchased_at: i.purchased_at,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WishlistResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub item_count: i32,
    pub items: Vec<ItemResponse>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl WishlistResponse {
    pub fn new(w: Wishlist, items: Vec<ItemResponse>) -> Self {
        Self {
            id: w.id,
            user_id: w.user_id,
            name: w.name,
            description: w.description,
            is_public: w.is_public,
            item_count: w.item_count,
            items,
            created_at: w.created_at,
            updated_at: w.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SharedWishlistResponse {
    pub wishlist: WishlistResponse,
    pub owner: PublicOwner,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn row(priority: i16) -> WishlistItem {
        WishlistItem {
            id: Uuid::new_v4(),
            wishlist_id: Uuid::new_v4(),
            name: "Bike".into(),
            description: String::new(),
            price: 120.5,
            priority,
            url: String::new(),
            notes: String::new(),
            is_purchased: false,
            purchased_by: None,
            purchased_at: None,
            created_at: datetime!(2024-01-01 10:00 UTC),
            updated_at: datetime!(2024-01-02 10:00 UTC),
        }
    }

    #[test]
    fn item_response_carries_parent_and_timestamps() {
        let r = row(4);
        let json = serde_json::to_value(ItemResponse::from(r.clone())).unwrap();
        assert_eq!(json["wishlist_id"], r.wishlist_id.to_string());
        assert_eq!(json["created_at"], "2024-01-01T10:00:00Z");
        assert_eq!(json["updated_at"], "2024-01-02T10:00:00Z");
        assert_eq!(json["purchased_at"], serde_json::Value::Null);
        assert_eq!(json["priority"], 4);
    }

    #[test]
    fn out_of_range_stored_priority_is_clamped() {
        assert_eq!(ItemResponse::from(row(9)).priority, 5);
        assert_eq!(ItemResponse::from(row(0)).priority, 1);
    }
}
