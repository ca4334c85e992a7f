use std::cmp::Reverse;

use serde::Deserialize;
use uuid::Uuid;

use super::dto::ItemResponse;
use crate::error::AppError;

/// Gift preference strength, 1 (nice to have) through 5 (most wanted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(u8);

impl Priority {
    pub const DEFAULT: Priority = Priority(3);

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Priority {
    type Error = AppError;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            1..=5 => Ok(Priority(v as u8)),
            _ => Err(AppError::BadRequest("Priority must be between 1 and 5".into())),
        }
    }
}

/// Form fields arrive as numbers or as the raw text of an input box.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Coerce a submitted price: absent or blank means 0.
pub fn parse_price(input: Option<&NumberOrText>) -> Result<f64, AppError> {
    let price = match input {
        None => 0.0,
        Some(NumberOrText::Number(n)) => *n,
        Some(NumberOrText::Text(s)) if s.trim().is_empty() => 0.0,
        Some(NumberOrText::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::BadRequest("Price must be a number".into()))?,
    };
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::BadRequest("Price must be a non-negative number".into()));
    }
    Ok(price)
}

pub fn parse_priority(input: Option<&NumberOrText>) -> Result<Priority, AppError> {
    let raw = match input {
        None => return Ok(Priority::DEFAULT),
        Some(NumberOrText::Number(n)) => *n,
        Some(NumberOrText::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::BadRequest("Priority must be between 1 and 5".into()))?,
    };
    if raw.fract() != 0.0 {
        return Err(AppError::BadRequest("Priority must be between 1 and 5".into()));
    }
    Priority::try_from(raw as i64)
}

pub fn require_name(name: &str, what: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest(format!("{what} name is required")));
    }
    Ok(name.to_owned())
}

/// Unpurchased first, then most wanted, then oldest.
pub fn sort_for_display(items: &mut [ItemResponse]) {
    items.sort_by_key(|i| (i.is_purchased, Reverse(i.priority), i.created_at));
}

/// Keep the surprise: the owner does not see what others bought for them.
pub fn hide_reserved(items: &mut [ItemResponse], owner_id: Uuid) {
    for item in items.iter_mut() {
        if item.is_purchased && item.purchased_by != Some(owner_id) {
            item.is_purchased = false;
            item.purchased_by = None;
            item.purchased_at = None;
        }
    }
}

pub fn share_path(wishlist_id: Uuid) -> String {
    format!("/dashboard/shared/wishlist/{wishlist_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{macros::datetime, OffsetDateTime};

    fn item(priority: u8, is_purchased: bool, created_at: OffsetDateTime) -> ItemResponse {
        ItemResponse {
            id: Uuid::new_v4(),
            wishlist_id: Uuid::nil(),
            name: format!("p{priority}"),
            description: String::new(),
            price: 0.0,
            priority,
            url: String::new(),
            notes: String::new(),
            is_purchased,
            purchased_by: None,
            purchased_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn priority_accepts_only_one_through_five() {
        for ok in 1i64..=5 {
            assert_eq!(Priority::try_from(ok).unwrap().get(), ok as u8);
        }
        assert!(Priority::try_from(0i64).is_err());
        assert!(Priority::try_from(6i64).is_err());
    }

    #[test]
    fn priority_parses_numbers_and_text() {
        assert_eq!(parse_priority(None).unwrap(), Priority::DEFAULT);
        assert_eq!(parse_priority(Some(&NumberOrText::Number(5.0))).unwrap().get(), 5);
        assert_eq!(parse_priority(Some(&NumberOrText::Text(" 2 ".into()))).unwrap().get(), 2);
        assert!(parse_priority(Some(&NumberOrText::Number(2.5))).is_err());
        assert!(parse_priority(Some(&NumberOrText::Text("high".into()))).is_err());
    }

    #[test]
    fn price_coercion() {
        assert_eq!(parse_price(None).unwrap(), 0.0);
        assert_eq!(parse_price(Some(&NumberOrText::Text("".into()))).unwrap(), 0.0);
        assert_eq!(parse_price(Some(&NumberOrText::Text("12.50".into()))).unwrap(), 12.5);
        assert_eq!(parse_price(Some(&NumberOrText::Number(9.99))).unwrap(), 9.99);
        assert!(parse_price(Some(&NumberOrText::Text("cheap".into()))).is_err());
        assert!(parse_price(Some(&NumberOrText::Number(-1.0))).is_err());
    }

    #[test]
    fn number_or_text_deserializes_both_shapes() {
        let n: NumberOrText = serde_json::from_str("4").unwrap();
        let t: NumberOrText = serde_json::from_str("\"4\"").unwrap();
        assert!(matches!(n, NumberOrText::Number(v) if v == 4.0));
        assert!(matches!(t, NumberOrText::Text(ref s) if s == "4"));
    }

    #[test]
    fn require_name_trims() {
        assert_eq!(require_name("  Bike ", "Item").unwrap(), "Bike");
        assert!(require_name("   ", "Item").is_err());
    }

    #[test]
    fn display_order_is_unpurchased_then_priority_then_age() {
        let t0 = datetime!(2024-01-01 0:00 UTC);
        let t1 = datetime!(2024-01-02 0:00 UTC);
        let mut items = vec![
            item(5, true, t0),
            item(2, false, t0),
            item(4, false, t1),
            item(4, false, t0),
        ];
        sort_for_display(&mut items);
        let order: Vec<_> = items.iter().map(|i| (i.priority, i.is_purchased, i.created_at)).collect();
        assert_eq!(
            order,
            vec![(4, false, t0), (4, false, t1), (2, false, t0), (5, true, t0)]
        );
    }

    #[test]
    fn hide_reserved_masks_only_other_buyers() {
        let owner = Uuid::new_v4();
        let friend = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let mut items = vec![item(3, true, now), item(3, true, now)];
        items[0].purchased_by = Some(friend);
        items[0].purchased_at = Some(now);
        items[1].purchased_by = Some(owner);

        hide_reserved(&mut items, owner);
        assert!(!items[0].is_purchased);
        assert!(items[0].purchased_by.is_none());
        assert!(items[0].purchased_at.is_none());
        assert!(items[1].is_purchased);
    }

    #[test]
    fn share_path_points_at_shared_view() {
        let id = Uuid::nil();
        assert_eq!(share_path(id), format!("/dashboard/shared/wishlist/{id}"));
    }
}
