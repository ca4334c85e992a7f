use anyhow::Context;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::services::Priority;

#[derive(Debug, Clone, FromRow)]
pub struct Wishlist {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub item_count: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct WishlistItem {
    pub id: Uuid,
    pub wishlist_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub priority: i16,
    pub url: String,
    pub notes: String,
    pub is_purchased: bool,
    pub purchased_by: Option<Uuid>,
    pub purchased_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewWishlist {
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub priority: Priority,
    pub url: String,
    pub notes: String,
}

/// Result of a shared viewer trying to claim an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedPurchase {
    Marked,
    AlreadyPurchased,
    NotFound,
}

const WISHLIST_COLUMNS: &str =
    "id, user_id, name, description, is_public, item_count, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, wishlist_id, name, description, price, priority, url, notes, \
     is_purchased, purchased_by, purchased_at, created_at, updated_at";

impl Wishlist {
    /// Owner's wishlists, newest first.
    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Wishlist>> {
        let rows = sqlx::query_as::<_, Wishlist>(&format!(
            r#"
            SELECT {WISHLIST_COLUMNS}
            FROM wishlists
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(db)
        .await
        .context("list wishlists by user")?;
        Ok(rows)
    }

    pub async fn create(db: &PgPool, user_id: Uuid, new: &NewWishlist) -> anyhow::Result<Wishlist> {
        let row = sqlx::query_as::<_, Wishlist>(&format!(
            r#"
            INSERT INTO wishlists (id, user_id, name, description, is_public)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {WISHLIST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&new.name)
        .bind(new.description.as_deref())
        .bind(new.is_public)
        .fetch_one(db)
        .await
        .context("insert wishlist")?;
        Ok(row)
    }

    pub async fn find_owned(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Wishlist>> {
        let row = sqlx::query_as::<_, Wishlist>(&format!(
            "SELECT {WISHLIST_COLUMNS} FROM wishlists WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find owned wishlist")?;
        Ok(row)
    }

    pub async fn find_public(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Wishlist>> {
        let row = sqlx::query_as::<_, Wishlist>(&format!(
            "SELECT {WISHLIST_COLUMNS} FROM wishlists WHERE id = $1 AND is_public"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find public wishlist")?;
        Ok(row)
    }

    /// Items go with it (`ON DELETE CASCADE`).
    pub async fn delete_owned(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM wishlists WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await
            .context("delete wishlist")?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn set_visibility(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        is_public: bool,
    ) -> anyhow::Result<Option<Wishlist>> {
        let row = sqlx::query_as::<_, Wishlist>(&format!(
            r#"
            UPDATE wishlists
               SET is_public = $3, updated_at = now()
             WHERE id = $1 AND user_id = $2
            RETURNING {WISHLIST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(is_public)
        .fetch_optional(db)
        .await
        .context("set wishlist visibility")?;
        Ok(row)
    }
}

impl WishlistItem {
    pub async fn list_by_wishlist(db: &PgPool, wishlist_id: Uuid) -> anyhow::Result<Vec<WishlistItem>> {
        let rows = sqlx::query_as::<_, WishlistItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM wishlist_items
            WHERE wishlist_id = $1
            ORDER BY created_at ASC
            "#
        ))
        .bind(wishlist_id)
        .fetch_all(db)
        .await
        .context("list wishlist items")?;
        Ok(rows)
    }

    /// Insert an item and bump `item_count` together. `None` if the caller
    /// does not own the wishlist.
    pub async fn add_to_owned(
        db: &PgPool,
        user_id: Uuid,
        wishlist_id: Uuid,
        new: &NewItem,
    ) -> anyhow::Result<Option<WishlistItem>> {
        let mut tx = db.begin().await.context("begin tx")?;

        let owned = sqlx::query_as::<_, (Uuid,)>(
            r#"
            UPDATE wishlists
               SET item_count = item_count + 1, updated_at = now()
             WHERE id = $1 AND user_id = $2
            RETURNING id
            "#,
        )
        .bind(wishlist_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("bump item count")?;

        if owned.is_none() {
            tx.rollback().await.context("rollback tx")?;
            return Ok(None);
        }

        let item = sqlx::query_as::<_, WishlistItem>(&format!(
            r#"
            INSERT INTO wishlist_items (id, wishlist_id, name, description, price, priority, url, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(wishlist_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(i16::from(new.priority.get()))
        .bind(&new.url)
        .bind(&new.notes)
        .fetch_one(&mut *tx)
        .await
        .context("insert wishlist item")?;

        tx.commit().await.context("commit tx")?;
        Ok(Some(item))
    }

    /// Remove an item and drop `item_count` together.
    ///
    /// The wishlist row is locked before the item row, the same order as
    /// `add_to_owned` and the cascade from `Wishlist::delete_owned`.
    pub async fn delete_owned(
        db: &PgPool,
        user_id: Uuid,
        wishlist_id: Uuid,
        item_id: Uuid,
    ) -> anyhow::Result<bool> {
        let mut tx = db.begin().await.context("begin tx")?;

        let owned = sqlx::query_as::<_, (Uuid,)>(
            r#"
            UPDATE wishlists
               SET item_count = GREATEST(item_count - 1, 0), updated_at = now()
             WHERE id = $1 AND user_id = $2
            RETURNING id
            "#,
        )
        .bind(wishlist_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("drop item count")?;

        if owned.is_none() {
            tx.rollback().await.context("rollback tx")?;
            return Ok(false);
        }

        let deleted = sqlx::query("DELETE FROM wishlist_items WHERE id = $1 AND wishlist_id = $2")
            .bind(item_id)
            .bind(wishlist_id)
            .execute(&mut *tx)
            .await
            .context("delete wishlist item")?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await.context("rollback tx")?;
            return Ok(false);
        }

        tx.commit().await.context("commit tx")?;
        Ok(true)
    }

    /// The owner may (re)mark any of their own items.
    pub async fn mark_purchased_owned(
        db: &PgPool,
        user_id: Uuid,
        wishlist_id: Uuid,
        item_id: Uuid,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE wishlist_items i
               SET is_purchased = TRUE, purchased_by = $3, purchased_at = now(), updated_at = now()
              FROM wishlists w
             WHERE i.id = $1
               AND i.wishlist_id = $2
               AND w.id = i.wishlist_id
               AND w.user_id = $3
            "#,
        )
        .bind(item_id)
        .bind(wishlist_id)
        .bind(user_id)
        .execute(db)
        .await
        .context("mark own item purchased")?;
        Ok(res.rows_affected() > 0)
    }

    /// A viewer of a public wishlist claims an item nobody has bought yet.
    pub async fn mark_purchased_shared(
        db: &PgPool,
        purchaser: Uuid,
        wishlist_id: Uuid,
        item_id: Uuid,
    ) -> anyhow::Result<SharedPurchase> {
        let res = sqlx::query(
            r#"
            UPDATE wishlist_items i
               SET is_purchased = TRUE, purchased_by = $3, purchased_at = now(), updated_at = now()
              FROM wishlists w
             WHERE i.id = $1
               AND i.wishlist_id = $2
               AND w.id = i.wishlist_id
               AND w.is_public
               AND NOT i.is_purchased
            "#,
        )
        .bind(item_id)
        .bind(wishlist_id)
        .bind(purchaser)
        .execute(db)
        .await
        .context("mark shared item purchased")?;

        if res.rows_affected() > 0 {
            return Ok(SharedPurchase::Marked);
        }

        let exists = sqlx::query_as::<_, (bool,)>(
            r#"
            SELECT i.is_purchased
              FROM wishlist_items i
              JOIN wishlists w ON w.id = i.wishlist_id
             WHERE i.id = $1 AND i.wishlist_id = $2 AND w.is_public
            "#,
        )
        .bind(item_id)
        .bind(wishlist_id)
        .fetch_optional(db)
        .await
        .context("check shared item")?;

        Ok(match exists {
            Some((true,)) => SharedPurchase::AlreadyPurchased,
            _ => SharedPurchase::NotFound,
        })
    }
}
