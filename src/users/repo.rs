use anyhow::Context;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::Preferences;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub subject: String, // identity-provider `sub`
    pub email: String,
    pub name: String,
    pub picture: String,            // provider avatar URL
    pub avatar_key: Option<String>, // uploaded avatar, wins over `picture`
    pub bio: String,
    pub notify_on_share: bool,
    pub public_profile: bool,
    pub hide_reserved_items: bool,
    pub profile_completed: bool,
    pub created_at: OffsetDateTime,
    pub last_login: OffsetDateTime,
}

impl User {
    pub fn preferences(&self) -> Preferences {
        Preferences {
            notify_on_share: self.notify_on_share,
            public_profile: self.public_profile,
            hide_reserved_items: self.hide_reserved_items,
        }
    }
}

/// Fields the identity provider hands us on every login.
#[derive(Debug, Clone)]
pub struct LoginProfile<'a> {
    pub subject: &'a str,
    pub email: &'a str,
    pub name: &'a str,
    pub picture: &'a str,
}

/// A full profile edit; preferences are written as given.
#[derive(Debug, Clone)]
pub struct ProfileUpdate<'a> {
    pub name: &'a str,
    pub bio: &'a str,
    pub preferences: Preferences,
    pub mark_completed: bool,
}

const USER_COLUMNS: &str = "id, subject, email, name, picture, avatar_key, bio, notify_on_share, \
     public_profile, hide_reserved_items, profile_completed, created_at, last_login";

#[derive(FromRow)]
struct UpsertedUser {
    #[sqlx(flatten)]
    user: User,
    inserted: bool,
}

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    /// Insert on first login, otherwise refresh the login fields.
    ///
    /// A name the user picked while completing their profile survives later
    /// logins; empty provider values never clobber stored ones.
    /// Returns the user and whether the row was created.
    pub async fn upsert_login(db: &PgPool, login: &LoginProfile<'_>) -> anyhow::Result<(User, bool)> {
        let row = sqlx::query_as::<_, UpsertedUser>(&format!(
            r#"
            INSERT INTO users (subject, email, name, picture)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (subject) DO UPDATE SET
                last_login = now(),
                email = COALESCE(NULLIF(EXCLUDED.email, ''), users.email),
                picture = COALESCE(NULLIF(EXCLUDED.picture, ''), users.picture),
                name = CASE
                    WHEN users.profile_completed OR EXCLUDED.name = '' THEN users.name
                    ELSE EXCLUDED.name
                END
            RETURNING {USER_COLUMNS}, (xmax = 0) AS inserted
            "#
        ))
        .bind(login.subject)
        .bind(login.email)
        .bind(login.name)
        .bind(login.picture)
        .fetch_one(db)
        .await
        .context("upsert user on login")?;
        Ok((row.user, row.inserted))
    }

    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        update: &ProfileUpdate<'_>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                name = $2,
                bio = $3,
                notify_on_share = $4,
                public_profile = $5,
                hide_reserved_items = $6,
                profile_completed = profile_completed OR $7
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.bio)
        .bind(update.preferences.notify_on_share)
        .bind(update.preferences.public_profile)
        .bind(update.preferences.hide_reserved_items)
        .bind(update.mark_completed)
        .fetch_optional(db)
        .await
        .context("update user profile")?;
        Ok(user)
    }

    /// Point the user at a new avatar object. Returns the key it replaced,
    /// or `None` when the user does not exist.
    pub async fn replace_avatar_key(
        db: &PgPool,
        id: Uuid,
        key: &str,
    ) -> anyhow::Result<Option<Option<String>>> {
        let previous = sqlx::query_as::<_, (Option<String>,)>(
            r#"
            UPDATE users u
               SET avatar_key = $2
              FROM (SELECT id, avatar_key FROM users WHERE id = $1 FOR UPDATE) old
             WHERE u.id = old.id
            RETURNING old.avatar_key
            "#,
        )
        .bind(id)
        .bind(key)
        .fetch_optional(db)
        .await
        .context("replace avatar key")?;
        Ok(previous.map(|(k,)| k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login<'a>(subject: &'a str, email: &'a str, name: &'a str) -> LoginProfile<'a> {
        LoginProfile {
            subject,
            email,
            name,
            picture: "https://cdn.example.com/a.png",
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn first_login_inserts_and_later_logins_update(db: PgPool) {
        let (first, created) = User::upsert_login(&db, &login("auth0|1", "a@x.com", "Ann"))
            .await
            .unwrap();
        assert!(created);
        assert_eq!(first.name, "Ann");
        assert_eq!(first.preferences(), Preferences::default());
        assert!(!first.profile_completed);

        let (again, created) = User::upsert_login(&db, &login("auth0|1", "ann@x.com", "Annie"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(again.id, first.id);
        assert_eq!(again.email, "ann@x.com");
        assert_eq!(again.name, "Annie");
        assert!(again.last_login >= first.last_login);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn empty_provider_fields_keep_stored_values(db: PgPool) {
        let (user, _) = User::upsert_login(&db, &login("auth0|2", "b@x.com", "Bo")).await.unwrap();
        let blank = LoginProfile {
            subject: "auth0|2",
            email: "",
            name: "",
            picture: "",
        };
        let (again, _) = User::upsert_login(&db, &blank).await.unwrap();
        assert_eq!(again.id, user.id);
        assert_eq!(again.email, "b@x.com");
        assert_eq!(again.name, "Bo");
        assert_eq!(again.picture, "https://cdn.example.com/a.png");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn completed_profile_keeps_chosen_name_on_relogin(db: PgPool) {
        let (user, _) = User::upsert_login(&db, &login("auth0|3", "c@x.com", "c")).await.unwrap();

        let prefs = Preferences {
            notify_on_share: false,
            public_profile: true,
            hide_reserved_items: true,
        };
        let update = ProfileUpdate {
            name: "Cleo Carter",
            bio: "likes bikes",
            preferences: prefs,
            mark_completed: true,
        };
        let saved = User::update_profile(&db, user.id, &update).await.unwrap().unwrap();
        assert!(saved.profile_completed);
        assert_eq!(saved.preferences(), prefs);

        let (again, _) = User::upsert_login(&db, &login("auth0|3", "c@x.com", "c-from-provider"))
            .await
            .unwrap();
        assert_eq!(again.name, "Cleo Carter");
        assert_eq!(again.bio, "likes bikes");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn plain_update_does_not_complete_or_uncomplete(db: PgPool) {
        let (user, _) = User::upsert_login(&db, &login("auth0|4", "d@x.com", "Dee")).await.unwrap();
        let mut update = ProfileUpdate {
            name: "Dee",
            bio: "",
            preferences: Preferences::default(),
            mark_completed: false,
        };
        let saved = User::update_profile(&db, user.id, &update).await.unwrap().unwrap();
        assert!(!saved.profile_completed);

        update.mark_completed = true;
        User::update_profile(&db, user.id, &update).await.unwrap();
        update.mark_completed = false;
        let saved = User::update_profile(&db, user.id, &update).await.unwrap().unwrap();
        assert!(saved.profile_completed);

        assert!(User::update_profile(&db, Uuid::new_v4(), &update).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn replace_avatar_key_returns_previous_key(db: PgPool) {
        let (user, _) = User::upsert_login(&db, &login("auth0|5", "e@x.com", "Eve")).await.unwrap();

        let prev = User::replace_avatar_key(&db, user.id, "avatars/1.png").await.unwrap();
        assert_eq!(prev, Some(None));
        let prev = User::replace_avatar_key(&db, user.id, "avatars/2.png").await.unwrap();
        assert_eq!(prev, Some(Some("avatars/1.png".to_owned())));

        let stored = User::find_by_id(&db, user.id).await.unwrap().unwrap();
        assert_eq!(stored.avatar_key.as_deref(), Some("avatars/2.png"));

        assert_eq!(User::replace_avatar_key(&db, Uuid::new_v4(), "x").await.unwrap(), None);
    }
}
