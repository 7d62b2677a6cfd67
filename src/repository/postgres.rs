//! PostgreSQL document store
//!
//! Users, books and libraries each live in their own table. A library's
//! inventory is stored as a JSONB array next to the library row so it is
//! read and written as one document.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgConnection, Pool, Postgres};
use uuid::Uuid;

use super::{Repository, Write, WriteBatch};
use crate::{
    error::{AppError, AppResult},
    i18n::MessageKey,
    models::{Book, InventoryEntry, Library, Role, User},
};

const USER_COLUMNS: &str = "id, name, email, password_hash, roles, books_written, borrowed_books, \
     libraries_owned, refresh_token_hash, created_at, revision";

const BOOK_COLUMNS: &str = "id, title, author_id, image_url, is_available, created_at, revision";

const LIBRARY_COLUMNS: &str = "id, name, owner_id, inventory, created_at, revision";

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    roles: Vec<String>,
    books_written: Vec<Uuid>,
    borrowed_books: Vec<Uuid>,
    libraries_owned: Vec<Uuid>,
    refresh_token_hash: Option<String>,
    created_at: DateTime<Utc>,
    revision: i64,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> AppResult<Self> {
        let roles: BTreeSet<Role> = row
            .roles
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<Result<_, _>>()
            .map_err(AppError::Internal)?;

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            roles,
            books_written: row.books_written,
            borrowed_books: row.borrowed_books,
            libraries_owned: row.libraries_owned,
            refresh_token_hash: row.refresh_token_hash,
            created_at: row.created_at,
            revision: row.revision,
        })
    }
}

#[derive(Debug, FromRow)]
struct LibraryRow {
    id: Uuid,
    name: String,
    owner_id: Uuid,
    inventory: Json<Vec<InventoryEntry>>,
    created_at: DateTime<Utc>,
    revision: i64,
}

impl From<LibraryRow> for Library {
    fn from(row: LibraryRow) -> Self {
        Library {
            id: row.id,
            name: row.name,
            owner_id: row.owner_id,
            inventory: row.inventory.0,
            created_at: row.created_at,
            revision: row.revision,
        }
    }
}

fn role_names(user: &User) -> Vec<String> {
    user.roles.iter().map(|r| r.as_str().to_string()).collect()
}

/// Translate unique-index violations into the matching conflict
fn map_write_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let key = match db.constraint() {
                Some("users_email_lower_key") => MessageKey::EmailTaken,
                Some("books_title_key") => MessageKey::BookTitleTaken,
                Some("libraries_name_key") => MessageKey::LibraryNameTaken,
                _ => MessageKey::DuplicateRecord,
            };
            return AppError::Conflict(key);
        }
    }
    AppError::Database(err)
}

fn expect_one(rows_affected: u64) -> AppResult<()> {
    if rows_affected == 1 {
        Ok(())
    } else {
        Err(AppError::Conflict(MessageKey::ConcurrentModification))
    }
}

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgRepository {
    pool: Pool<Postgres>,
}

impl PgRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn apply(conn: &mut PgConnection, write: Write) -> AppResult<()> {
        match write {
            Write::InsertUser(user) => {
                sqlx::query(
                    r#"
                    INSERT INTO users (id, name, email, password_hash, roles, books_written,
                                       borrowed_books, libraries_owned, refresh_token_hash,
                                       created_at, revision)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0)
                    "#,
                )
                .bind(user.id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(role_names(&user))
                .bind(&user.books_written)
                .bind(&user.borrowed_books)
                .bind(&user.libraries_owned)
                .bind(&user.refresh_token_hash)
                .bind(user.created_at)
                .execute(conn)
                .await
                .map_err(map_write_error)?;
            }
            Write::UpdateUser(user) => {
                let result = sqlx::query(
                    r#"
                    UPDATE users
                    SET name = $2, email = $3, password_hash = $4, roles = $5,
                        books_written = $6, borrowed_books = $7, libraries_owned = $8,
                        refresh_token_hash = $9, revision = revision + 1
                    WHERE id = $1 AND revision = $10
                    "#,
                )
                .bind(user.id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(role_names(&user))
                .bind(&user.books_written)
                .bind(&user.borrowed_books)
                .bind(&user.libraries_owned)
                .bind(&user.refresh_token_hash)
                .bind(user.revision)
                .execute(conn)
                .await
                .map_err(map_write_error)?;
                expect_one(result.rows_affected())?;
            }
            Write::InsertBook(book) => {
                sqlx::query(
                    r#"
                    INSERT INTO books (id, title, author_id, image_url, is_available, created_at, revision)
                    VALUES ($1, $2, $3, $4, $5, $6, 0)
                    "#,
                )
                .bind(book.id)
                .bind(&book.title)
                .bind(book.author_id)
                .bind(&book.image_url)
                .bind(book.is_available)
                .bind(book.created_at)
                .execute(conn)
                .await
                .map_err(map_write_error)?;
            }
            Write::UpdateBook(book) => {
                let result = sqlx::query(
                    r#"
                    UPDATE books
                    SET title = $2, image_url = $3, is_available = $4, revision = revision + 1
                    WHERE id = $1 AND revision = $5
                    "#,
                )
                .bind(book.id)
                .bind(&book.title)
                .bind(&book.image_url)
                .bind(book.is_available)
                .bind(book.revision)
                .execute(conn)
                .await
                .map_err(map_write_error)?;
                expect_one(result.rows_affected())?;
            }
            Write::DeleteBook(book) => {
                let result = sqlx::query("DELETE FROM books WHERE id = $1 AND revision = $2")
                    .bind(book.id)
                    .bind(book.revision)
                    .execute(conn)
                    .await?;
                expect_one(result.rows_affected())?;
            }
            Write::InsertLibrary(library) => {
                sqlx::query(
                    r#"
                    INSERT INTO libraries (id, name, owner_id, inventory, created_at, revision)
                    VALUES ($1, $2, $3, $4, $5, 0)
                    "#,
                )
                .bind(library.id)
                .bind(&library.name)
                .bind(library.owner_id)
                .bind(Json(&library.inventory))
                .bind(library.created_at)
                .execute(conn)
                .await
                .map_err(map_write_error)?;
            }
            Write::UpdateLibrary(library) => {
                let result = sqlx::query(
                    r#"
                    UPDATE libraries
                    SET name = $2, inventory = $3, revision = revision + 1
                    WHERE id = $1 AND revision = $4
                    "#,
                )
                .bind(library.id)
                .bind(&library.name)
                .bind(Json(&library.inventory))
                .bind(library.revision)
                .execute(conn)
                .await
                .map_err(map_write_error)?;
                expect_one(result.rows_affected())?;
            }
            Write::DeleteLibrary(library) => {
                let result = sqlx::query("DELETE FROM libraries WHERE id = $1 AND revision = $2")
                    .bind(library.id)
                    .bind(library.revision)
                    .execute(conn)
                    .await?;
                expect_one(result.rows_affected())?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    async fn book_by_id(&self, id: Uuid) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn book_by_title(&self, title: &str) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE title = $1"
        ))
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    async fn books(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn books_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Book>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn library_by_id(&self, id: Uuid) -> AppResult<Option<Library>> {
        let row = sqlx::query_as::<_, LibraryRow>(&format!(
            "SELECT {LIBRARY_COLUMNS} FROM libraries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Library::from))
    }

    async fn library_by_name(&self, name: &str) -> AppResult<Option<Library>> {
        let row = sqlx::query_as::<_, LibraryRow>(&format!(
            "SELECT {LIBRARY_COLUMNS} FROM libraries WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Library::from))
    }

    async fn libraries(&self) -> AppResult<Vec<Library>> {
        let rows = sqlx::query_as::<_, LibraryRow>(&format!(
            "SELECT {LIBRARY_COLUMNS} FROM libraries ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Library::from).collect())
    }

    async fn libraries_stocking(&self, book_id: Uuid) -> AppResult<Vec<Library>> {
        let probe = serde_json::json!([{ "bookId": book_id }]);
        let rows = sqlx::query_as::<_, LibraryRow>(&format!(
            "SELECT {LIBRARY_COLUMNS} FROM libraries WHERE inventory @> $1 ORDER BY created_at, id"
        ))
        .bind(Json(probe))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Library::from).collect())
    }

    async fn commit(&self, batch: WriteBatch) -> AppResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for write in batch {
            // Dropping the transaction on error rolls it back
            Self::apply(&mut tx, write).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
