//! Repository layer for document storage
//!
//! Reads return whole documents. Every mutation is expressed as a
//! [`WriteBatch`] handed to [`Repository::commit`], which applies the batch
//! atomically: either every write lands or none does. Updates and deletes
//! carry the revision they were read at and fail the batch with
//! `concurrent_modification` when the stored document has moved on.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Book, Library, User},
};

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

/// A single document write
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    InsertUser(User),
    UpdateUser(User),
    InsertBook(Book),
    UpdateBook(Book),
    DeleteBook(Book),
    InsertLibrary(Library),
    UpdateLibrary(Library),
    DeleteLibrary(Library),
}

/// Ordered list of writes committed together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, write: Write) -> Self {
        self.writes.push(write);
        self
    }

    pub fn insert_user(self, user: User) -> Self {
        self.push(Write::InsertUser(user))
    }

    pub fn update_user(self, user: User) -> Self {
        self.push(Write::UpdateUser(user))
    }

    pub fn insert_book(self, book: Book) -> Self {
        self.push(Write::InsertBook(book))
    }

    pub fn update_book(self, book: Book) -> Self {
        self.push(Write::UpdateBook(book))
    }

    pub fn delete_book(self, book: Book) -> Self {
        self.push(Write::DeleteBook(book))
    }

    pub fn insert_library(self, library: Library) -> Self {
        self.push(Write::InsertLibrary(library))
    }

    pub fn update_library(self, library: Library) -> Self {
        self.push(Write::UpdateLibrary(library))
    }

    pub fn delete_library(self, library: Library) -> Self {
        self.push(Write::DeleteLibrary(library))
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }
}

impl IntoIterator for WriteBatch {
    type Item = Write;
    type IntoIter = std::vec::IntoIter<Write>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

/// Document store used by every service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    /// Cheap round trip used by the readiness probe
    async fn ping(&self) -> AppResult<()>;

    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Case-insensitive lookup
    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Users for the given ids; unknown ids are skipped
    async fn users_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<User>>;

    async fn book_by_id(&self, id: Uuid) -> AppResult<Option<Book>>;

    /// Exact, case-sensitive title match
    async fn book_by_title(&self, title: &str) -> AppResult<Option<Book>>;

    /// Every book, oldest first
    async fn books(&self) -> AppResult<Vec<Book>>;

    async fn books_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Book>>;

    async fn library_by_id(&self, id: Uuid) -> AppResult<Option<Library>>;

    async fn library_by_name(&self, name: &str) -> AppResult<Option<Library>>;

    /// Every library, oldest first
    async fn libraries(&self) -> AppResult<Vec<Library>>;

    /// Libraries whose inventory references `book_id`, oldest first
    async fn libraries_stocking(&self, book_id: Uuid) -> AppResult<Vec<Library>>;

    /// Apply every write in `batch` or none of them
    async fn commit(&self, batch: WriteBatch) -> AppResult<()>;
}
