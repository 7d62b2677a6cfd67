//! Business logic services

pub mod catalog;
pub mod covers;
pub mod libraries;
pub mod loans;
pub mod users;

use std::{collections::HashMap, sync::Arc};

use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    i18n::MessageKey,
    models::{Book, Library, User, UserSummary},
    repository::Repository,
};

pub use covers::{CoverStore, LocalCoverStore};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub libraries: libraries::LibrariesService,
    pub loans: loans::LoansService,
    repository: Arc<dyn Repository>,
}

impl Services {
    /// Create all services over one repository and cover store
    pub fn new(
        repository: Arc<dyn Repository>,
        covers: Arc<dyn CoverStore>,
        config: &AppConfig,
    ) -> Self {
        Self {
            users: users::UsersService::new(repository.clone(), config.auth.clone()),
            catalog: catalog::CatalogService::new(repository.clone(), covers, config.catalog.clone()),
            libraries: libraries::LibrariesService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone()),
            repository,
        }
    }

    /// Readiness check against the backing store
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}

pub(crate) async fn require_user(repository: &dyn Repository, id: Uuid) -> AppResult<User> {
    repository
        .user_by_id(id)
        .await?
        .ok_or(AppError::NotFound(MessageKey::UserNotFound))
}

pub(crate) async fn require_book(repository: &dyn Repository, id: Uuid) -> AppResult<Book> {
    repository
        .book_by_id(id)
        .await?
        .ok_or(AppError::NotFound(MessageKey::BookNotFound))
}

pub(crate) async fn require_library(repository: &dyn Repository, id: Uuid) -> AppResult<Library> {
    repository
        .library_by_id(id)
        .await?
        .ok_or(AppError::NotFound(MessageKey::LibraryNotFound))
}

/// Whether `user_id` has `book_id` out from some library other than `except`.
/// `borrowedBooks` is a set, so a book only leaves it with the last copy held.
pub(crate) async fn borrowed_elsewhere(
    repository: &dyn Repository,
    user_id: Uuid,
    book_id: Uuid,
    except: Uuid,
) -> AppResult<bool> {
    Ok(repository
        .libraries_stocking(book_id)
        .await?
        .iter()
        .any(|library| {
            library.id != except
                && library.entry(book_id).and_then(|e| e.borrower()) == Some(user_id)
        }))
}

/// Resolve user ids to their public summaries in one read
pub(crate) async fn user_summaries(
    repository: &dyn Repository,
    ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<HashMap<Uuid, UserSummary>> {
    let mut ids: Vec<Uuid> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();

    Ok(repository
        .users_by_ids(&ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.summary()))
        .collect())
}
