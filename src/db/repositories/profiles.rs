use std::future::Future;

use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Row};

use crate::{
    auth::{ProfileStore, SessionUser},
    db::{helpers::parse_datetime, models::Profile, Database},
};

fn row_to_profile(row: &Row) -> Result<Profile> {
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Profile {
        user_id: row.get("user_id")?,
        email: row.get("email")?,
        display_name: row.get("display_name")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    /// Insert or merge the profile document; `created_at` survives updates.
    pub async fn save_profile(&self, user: &SessionUser) -> Result<Profile> {
        let user = user.clone();
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO profiles (user_id, email, display_name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                     email = excluded.email,
                     display_name = excluded.display_name,
                     updated_at = excluded.updated_at",
                params![user.user_id, user.email, user.display_name, now],
            )?;

            let mut stmt = conn.prepare(
                "SELECT user_id, email, display_name, created_at, updated_at
                 FROM profiles
                 WHERE user_id = ?1",
            )?;
            let mut rows = stmt.query(params![user.user_id])?;
            let profile = match rows.next()? {
                Some(row) => row_to_profile(row)?,
                None => return Err(anyhow!("profile not found after upsert")),
            };
            Ok(profile)
        })
        .await
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, email, display_name, created_at, updated_at
                 FROM profiles
                 WHERE user_id = ?1",
            )?;
            let mut rows = stmt.query(params![user_id])?;
            let profile = rows.next()?.map(row_to_profile).transpose()?;
            Ok(profile)
        })
        .await
    }
}

impl ProfileStore for Database {
    fn upsert_profile(&self, user: &SessionUser) -> impl Future<Output = Result<()>> + Send {
        let user = user.clone();
        let db = self.clone();
        async move {
            db.save_profile(&user).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn user(name: &str) -> SessionUser {
        SessionUser {
            user_id: "uid-1".into(),
            email: Some("asha@example.com".into()),
            display_name: name.into(),
        }
    }

    #[tokio::test]
    async fn upsert_merges_existing_profile() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in(dir.path()).unwrap();

        let first = db.save_profile(&user("asha")).await.unwrap();
        db.upsert_profile(&user("Asha Rao")).await.unwrap();

        let stored = db.get_profile("uid-1").await.unwrap().unwrap();
        assert_eq!(stored.display_name, "Asha Rao");
        assert_eq!(stored.created_at, first.created_at);
        assert!(stored.updated_at >= first.updated_at);
        assert!(db.get_profile("uid-2").await.unwrap().is_none());
    }
}
