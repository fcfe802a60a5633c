use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{NewPost, Post, PostStatus};

use super::schema::SCHEMA;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// In-memory database, used by tests.
    pub async fn in_memory() -> Result<Self> {
        Self::new(":memory:").await
    }

    // Post operations

    pub async fn insert_post(&self, post: NewPost) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO posts (guid, orig_link, title, body, image_url, image_sha1,
                                          source, lang_verified, created_at, updated_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)"#,
                    params![
                        post.guid,
                        post.orig_link,
                        post.title,
                        post.body,
                        post.image_url,
                        post.image_sha1,
                        post.source,
                        post.lang_verified,
                        now,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn link_exists(&self, link: &str) -> Result<bool> {
        let link = link.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM posts WHERE orig_link = ?1 OR guid = ?1",
                    params![link],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    pub async fn image_sha1_exists(&self, sha1: &str) -> Result<bool> {
        let sha1 = sha1.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM posts WHERE image_sha1 = ?1",
                    params![sha1],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    pub async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let post = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM posts WHERE id = ?1",
                    POST_COLUMNS
                ))?;
                let post = stmt
                    .query_row(params![id], |row| Ok(post_from_row(row)))
                    .optional()?;
                Ok(post)
            })
            .await?;
        Ok(post)
    }

    pub async fn list_by_status(&self, status: PostStatus, limit: i64) -> Result<Vec<Post>> {
        let posts = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM posts WHERE status = ?1 ORDER BY id DESC LIMIT ?2",
                    POST_COLUMNS
                ))?;
                let posts = stmt
                    .query_map(params![status.as_str(), limit], |row| {
                        Ok(post_from_row(row))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(posts)
            })
            .await?;
        Ok(posts)
    }

    pub async fn update_content(
        &self,
        id: i64,
        title: String,
        body: String,
        link: String,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE posts SET title = ?1, body = ?2, orig_link = ?3, updated_at = ?4 WHERE id = ?5",
                    params![title, body, link, now, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn publish(&self, id: i64) -> Result<()> {
        self.set_status(id, PostStatus::Published, None).await
    }

    /// Return a published or scheduled post to draft. Clears publish_at.
    pub async fn unpublish(&self, id: i64) -> Result<()> {
        self.set_status(id, PostStatus::Draft, None).await
    }

    pub async fn schedule(&self, id: i64, publish_at: DateTime<Utc>) -> Result<()> {
        self.set_status(id, PostStatus::Scheduled, Some(publish_at))
            .await
    }

    async fn set_status(
        &self,
        id: i64,
        status: PostStatus,
        publish_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE posts SET status = ?1, publish_at = ?2, updated_at = ?3 WHERE id = ?4",
                    params![
                        status.as_str(),
                        publish_at.map(|dt| dt.to_rfc3339()),
                        now,
                        id
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn delete_post(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Flip scheduled posts whose publish time has passed. Returns how many
    /// rows changed.
    pub async fn publish_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let now_str = now.to_rfc3339();
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE posts SET status = 'published', updated_at = ?1
                     WHERE status = 'scheduled' AND publish_at IS NOT NULL AND publish_at <= ?1",
                    params![now_str],
                )?;
                Ok(changed)
            })
            .await?;
        Ok(changed)
    }

    // Settings operations

    pub async fn get_settings_map(&self) -> Result<HashMap<String, String>> {
        let map = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
                let map = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<std::result::Result<HashMap<_, _>, _>>()?;
                Ok(map)
            })
            .await?;
        Ok(map)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO settings (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, value],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

const POST_COLUMNS: &str = "id, guid, orig_link, title, body, image_url, image_sha1, status, \
                            publish_at, source, lang_verified, created_at, updated_at";

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn post_from_row(row: &Row) -> Post {
    Post {
        id: row.get(0).unwrap(),
        guid: row.get(1).unwrap(),
        orig_link: row.get(2).unwrap(),
        title: row.get(3).unwrap(),
        body: row.get(4).unwrap(),
        image_url: row.get(5).unwrap(),
        image_sha1: row.get(6).unwrap(),
        status: row
            .get::<_, String>(7)
            .ok()
            .and_then(|s| PostStatus::parse(&s))
            .unwrap_or_default(),
        publish_at: row
            .get::<_, Option<String>>(8)
            .unwrap()
            .and_then(|s| parse_datetime(&s)),
        source: row.get(9).unwrap(),
        lang_verified: row.get::<_, i64>(10).unwrap() != 0,
        created_at: row
            .get::<_, String>(11)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        updated_at: row
            .get::<_, String>(12)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}
