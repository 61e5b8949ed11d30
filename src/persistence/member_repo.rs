//! Member birthday repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::member::MemberBirthday;
use crate::Result;

use super::db::Database;

/// Repository wrapper around `SQLite` for member birthdays.
#[derive(Clone)]
pub struct MemberRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: String,
    name: String,
    birthday: String,
    last_celebrated_year: i64,
}

impl From<MemberRow> for MemberBirthday {
    fn from(row: MemberRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            birthday: row.birthday,
            last_celebrated_year: i32::try_from(row.last_celebrated_year).unwrap_or(0),
        }
    }
}

impl MemberRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a member or update the birthday of an existing one.
    ///
    /// `last_celebrated_year` of an existing member is kept.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the upsert fails.
    pub async fn upsert_birthday(&self, name: &str, birthday: &str) -> Result<MemberBirthday> {
        let fresh = MemberBirthday::new(name.to_owned(), birthday.to_owned());
        sqlx::query(
            "INSERT INTO member_birthday (id, name, birthday, last_celebrated_year)
             VALUES (?1, ?2, ?3, 0)
             ON CONFLICT(name) DO UPDATE SET birthday = excluded.birthday",
        )
        .bind(&fresh.id)
        .bind(name)
        .bind(birthday)
        .execute(self.db.as_ref())
        .await?;

        let row: MemberRow = sqlx::query_as("SELECT * FROM member_birthday WHERE name = ?1")
            .bind(name)
            .fetch_one(self.db.as_ref())
            .await?;
        Ok(row.into())
    }

    /// Members whose birthday is `mmdd`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_birthdays_on(&self, mmdd: &str) -> Result<Vec<MemberBirthday>> {
        let rows: Vec<MemberRow> =
            sqlx::query_as("SELECT * FROM member_birthday WHERE birthday = ?1 ORDER BY name")
                .bind(mmdd)
                .fetch_all(self.db.as_ref())
                .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// All members ordered by birthday.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self) -> Result<Vec<MemberBirthday>> {
        let rows: Vec<MemberRow> =
            sqlx::query_as("SELECT * FROM member_birthday ORDER BY birthday, name")
                .fetch_all(self.db.as_ref())
                .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Record that `id` was congratulated in `year`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn mark_celebrated(&self, id: &str, year: i32) -> Result<()> {
        sqlx::query("UPDATE member_birthday SET last_celebrated_year = ?1 WHERE id = ?2")
            .bind(i64::from(year))
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }
}
