//! In-process document store
//!
//! Backs the test suites and `database.url = "memory"`. A commit works on a
//! copy of the documents and only swaps it in once every write has passed
//! its checks, which gives the same all-or-nothing result as the
//! PostgreSQL transaction.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Repository, Write, WriteBatch};
use crate::{
    error::{AppError, AppResult},
    i18n::MessageKey,
    models::{Book, Library, User},
};

/// Email equality as PostgreSQL's `LOWER(email)` index sees it
fn same_email(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[derive(Debug, Clone, Default)]
struct Documents {
    users: HashMap<Uuid, User>,
    books: HashMap<Uuid, Book>,
    libraries: HashMap<Uuid, Library>,
}

impl Documents {
    fn apply(&mut self, write: Write) -> AppResult<()> {
        match write {
            Write::InsertUser(user) => {
                self.ensure_email_free(&user)?;
                insert_new(&mut self.users, user.id, user)
            }
            Write::UpdateUser(user) => {
                self.ensure_email_free(&user)?;
                let revision = user.revision;
                replace(&mut self.users, user.id, revision, user, |u| u.revision, |u, r| u.revision = r)
            }
            Write::InsertBook(book) => {
                self.ensure_title_free(&book)?;
                insert_new(&mut self.books, book.id, book)
            }
            Write::UpdateBook(book) => {
                self.ensure_title_free(&book)?;
                let revision = book.revision;
                replace(&mut self.books, book.id, revision, book, |b| b.revision, |b, r| b.revision = r)
            }
            Write::DeleteBook(book) => remove(&mut self.books, book.id, book.revision, |b| b.revision),
            Write::InsertLibrary(library) => {
                self.ensure_library_name_free(&library)?;
                insert_new(&mut self.libraries, library.id, library)
            }
            Write::UpdateLibrary(library) => {
                self.ensure_library_name_free(&library)?;
                let revision = library.revision;
                replace(
                    &mut self.libraries,
                    library.id,
                    revision,
                    library,
                    |l| l.revision,
                    |l, r| l.revision = r,
                )
            }
            Write::DeleteLibrary(library) => {
                remove(&mut self.libraries, library.id, library.revision, |l| l.revision)
            }
        }
    }

    fn ensure_email_free(&self, user: &User) -> AppResult<()> {
        let taken = self
            .users
            .values()
            .any(|u| u.id != user.id && same_email(&u.email, &user.email));
        if taken {
            return Err(AppError::Conflict(MessageKey::EmailTaken));
        }
        Ok(())
    }

    fn ensure_title_free(&self, book: &Book) -> AppResult<()> {
        if self.books.values().any(|b| b.id != book.id && b.title == book.title) {
            return Err(AppError::Conflict(MessageKey::BookTitleTaken));
        }
        Ok(())
    }

    fn ensure_library_name_free(&self, library: &Library) -> AppResult<()> {
        if self
            .libraries
            .values()
            .any(|l| l.id != library.id && l.name == library.name)
        {
            return Err(AppError::Conflict(MessageKey::LibraryNameTaken));
        }
        Ok(())
    }
}

fn insert_new<T>(docs: &mut HashMap<Uuid, T>, id: Uuid, doc: T) -> AppResult<()> {
    if docs.contains_key(&id) {
        return Err(AppError::Conflict(MessageKey::DuplicateRecord));
    }
    docs.insert(id, doc);
    Ok(())
}

fn replace<T>(
    docs: &mut HashMap<Uuid, T>,
    id: Uuid,
    expected: i64,
    mut doc: T,
    revision: impl Fn(&T) -> i64,
    set_revision: impl Fn(&mut T, i64),
) -> AppResult<()> {
    match docs.get(&id) {
        Some(current) if revision(current) == expected => {
            set_revision(&mut doc, expected + 1);
            docs.insert(id, doc);
            Ok(())
        }
        _ => Err(AppError::Conflict(MessageKey::ConcurrentModification)),
    }
}

fn remove<T>(
    docs: &mut HashMap<Uuid, T>,
    id: Uuid,
    expected: i64,
    revision: impl Fn(&T) -> i64,
) -> AppResult<()> {
    match docs.get(&id) {
        Some(current) if revision(current) == expected => {
            docs.remove(&id);
            Ok(())
        }
        _ => Err(AppError::Conflict(MessageKey::ConcurrentModification)),
    }
}

/// In-memory repository
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    documents: Arc<RwLock<Documents>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn oldest_first<T: Clone>(
    docs: impl Iterator<Item = T>,
    key: impl Fn(&T) -> (chrono::DateTime<chrono::Utc>, Uuid),
) -> Vec<T> {
    let mut docs: Vec<T> = docs.collect();
    docs.sort_by_key(|d| key(d));
    docs
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let docs = self.documents.read().await;
        Ok(docs.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let docs = self.documents.read().await;
        Ok(docs
            .users
            .values()
            .find(|u| same_email(&u.email, email))
            .cloned())
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        let docs = self.documents.read().await;
        Ok(ids.iter().filter_map(|id| docs.users.get(id).cloned()).collect())
    }

    async fn book_by_id(&self, id: Uuid) -> AppResult<Option<Book>> {
        let docs = self.documents.read().await;
        Ok(docs.books.get(&id).cloned())
    }

    async fn book_by_title(&self, title: &str) -> AppResult<Option<Book>> {
        let docs = self.documents.read().await;
        Ok(docs.books.values().find(|b| b.title == title).cloned())
    }

    async fn books(&self) -> AppResult<Vec<Book>> {
        let docs = self.documents.read().await;
        Ok(oldest_first(docs.books.values().cloned(), |b| (b.created_at, b.id)))
    }

    async fn books_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Book>> {
        let docs = self.documents.read().await;
        Ok(ids.iter().filter_map(|id| docs.books.get(id).cloned()).collect())
    }

    async fn library_by_id(&self, id: Uuid) -> AppResult<Option<Library>> {
        let docs = self.documents.read().await;
        Ok(docs.libraries.get(&id).cloned())
    }

    async fn library_by_name(&self, name: &str) -> AppResult<Option<Library>> {
        let docs = self.documents.read().await;
        Ok(docs.libraries.values().find(|l| l.name == name).cloned())
    }

    async fn libraries(&self) -> AppResult<Vec<Library>> {
        let docs = self.documents.read().await;
        Ok(oldest_first(docs.libraries.values().cloned(), |l| (l.created_at, l.id)))
    }

    async fn libraries_stocking(&self, book_id: Uuid) -> AppResult<Vec<Library>> {
        let docs = self.documents.read().await;
        Ok(oldest_first(
            docs.libraries
                .values()
                .filter(|l| l.entry(book_id).is_some())
                .cloned(),
            |l| (l.created_at, l.id),
        ))
    }

    async fn commit(&self, batch: WriteBatch) -> AppResult<()> {
        let mut docs = self.documents.write().await;
        let mut staged = docs.clone();
        for write in batch {
            staged.apply(write)?;
        }
        *docs = staged;
        Ok(())
    }
}
