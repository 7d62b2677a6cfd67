//! Book catalog: create, read, update and delete books

use std::sync::Arc;

use uuid::Uuid;

use super::{covers::CoverStore, require_book, require_user, user_summaries};
use crate::{
    config::CatalogConfig,
    error::{AppError, AppResult},
    i18n::MessageKey,
    models::{
        book::{BookAvailability, BookDetail, BookProjection, BookRecord},
        normalize_name, Book, RoleEvent,
    },
    repository::{Repository, WriteBatch},
};

/// Uploaded cover image
#[derive(Debug, Clone)]
pub struct NewCover {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Fields accepted by create and update
#[derive(Debug, Clone, Default)]
pub struct BookInput {
    pub title: Option<String>,
    pub cover: Option<NewCover>,
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Arc<dyn Repository>,
    covers: Arc<dyn CoverStore>,
    config: CatalogConfig,
}

impl CatalogService {
    pub fn new(
        repository: Arc<dyn Repository>,
        covers: Arc<dyn CoverStore>,
        config: CatalogConfig,
    ) -> Self {
        Self {
            repository,
            covers,
            config,
        }
    }

    /// List every book, oldest first
    pub async fn list(&self) -> AppResult<Vec<BookRecord>> {
        let books = self.repository.books().await?;
        Ok(books.iter().map(Book::record).collect())
    }

    /// Book with its author and every library copy
    pub async fn get(&self, id: Uuid) -> AppResult<BookDetail> {
        let book = require_book(self.repository.as_ref(), id).await?;
        let libraries = self.repository.libraries_stocking(id).await?;

        let borrowers = libraries
            .iter()
            .filter_map(|l| l.entry(id).and_then(|e| e.borrower()));
        let users = user_summaries(
            self.repository.as_ref(),
            borrowers.chain(std::iter::once(book.author_id)),
        )
        .await?;

        let copies = libraries
            .iter()
            .filter_map(|library| {
                let entry = library.entry(id)?;
                Some(BookAvailability {
                    library_id: library.id,
                    library_name: library.name.clone(),
                    is_available: entry.is_available(),
                    charge: entry.charge(),
                    borrower: entry.borrower().and_then(|b| users.get(&b).cloned()),
                    borrowed_at: entry.borrowed_at(),
                })
            })
            .collect();

        Ok(BookDetail {
            id: book.id,
            title: book.title,
            image_url: book.image_url,
            is_available: book.is_available,
            created_at: book.created_at,
            author: users.get(&book.author_id).cloned(),
            libraries: copies,
        })
    }

    /// Publish a new book; the caller becomes its author
    pub async fn create(&self, author_id: Uuid, input: BookInput) -> AppResult<BookProjection> {
        let title = input
            .title
            .as_deref()
            .and_then(normalize_name)
            .ok_or(AppError::Validation(MessageKey::TitleRequired))?;
        if self.config.require_cover_image && input.cover.is_none() {
            return Err(AppError::Validation(MessageKey::CoverImageRequired));
        }

        if self.repository.book_by_title(&title).await?.is_some() {
            return Err(AppError::Conflict(MessageKey::BookTitleTaken));
        }
        let mut author = require_user(self.repository.as_ref(), author_id).await?;

        let image_url = match input.cover {
            Some(cover) => Some(self.covers.store(cover.bytes, &cover.content_type).await?),
            None => None,
        };

        let book = Book::new(title, author_id, image_url);
        author.apply(RoleEvent::BookCreated);
        author.record_book_written(book.id);

        let batch = WriteBatch::new()
            .insert_book(book.clone())
            .update_user(author.clone());
        if let Err(e) = self.repository.commit(batch).await {
            self.discard_cover(book.image_url.as_deref()).await;
            return Err(e);
        }

        tracing::info!(book_id = %book.id, author_id = %author_id, "Book created");
        Ok(book.projection(Some(author.name)))
    }

    /// Change title and optionally the cover; author only
    pub async fn update(
        &self,
        caller_id: Uuid,
        id: Uuid,
        input: BookInput,
    ) -> AppResult<BookProjection> {
        let mut book = require_book(self.repository.as_ref(), id).await?;
        if !book.is_written_by(caller_id) {
            tracing::warn!(book_id = %id, caller = %caller_id, "Rejected book update by non-author");
            return Err(AppError::Authorization(MessageKey::NotBookAuthor));
        }

        let title = input
            .title
            .as_deref()
            .and_then(normalize_name)
            .ok_or(AppError::Validation(MessageKey::TitleRequired))?;
        if title != book.title && self.repository.book_by_title(&title).await?.is_some() {
            return Err(AppError::Conflict(MessageKey::BookTitleTaken));
        }

        let previous_cover = book.image_url.clone();
        let new_cover = match input.cover {
            Some(cover) => Some(self.covers.store(cover.bytes, &cover.content_type).await?),
            None => None,
        };

        book.title = title;
        if new_cover.is_some() {
            book.image_url = new_cover.clone();
        }

        if let Err(e) = self
            .repository
            .commit(WriteBatch::new().update_book(book.clone()))
            .await
        {
            self.discard_cover(new_cover.as_deref()).await;
            return Err(e);
        }
        if new_cover.is_some() {
            self.discard_cover(previous_cover.as_deref()).await;
        }

        let author = self.repository.user_by_id(book.author_id).await?;
        tracing::info!(book_id = %id, "Book updated");
        Ok(book.projection(author.map(|a| a.name)))
    }

    /// Remove a book; author only.
    ///
    /// Inventory entries referencing the book are left in place unless
    /// `catalog.cascade_book_delete` is set, in which case they are removed
    /// too and the delete is refused while any copy is on loan.
    pub async fn delete(&self, caller_id: Uuid, id: Uuid) -> AppResult<Uuid> {
        let book = require_book(self.repository.as_ref(), id).await?;
        if !book.is_written_by(caller_id) {
            tracing::warn!(book_id = %id, caller = %caller_id, "Rejected book delete by non-author");
            return Err(AppError::Authorization(MessageKey::NotBookAuthor));
        }

        let mut batch = WriteBatch::new().delete_book(book.clone());

        if let Some(mut author) = self.repository.user_by_id(book.author_id).await? {
            author.forget_book_written(id);
            batch = batch.update_user(author);
        }

        if self.config.cascade_book_delete {
            for mut library in self.repository.libraries_stocking(id).await? {
                if library.entry(id).and_then(|e| e.borrower()).is_some() {
                    return Err(AppError::Conflict(MessageKey::BookCurrentlyBorrowed));
                }
                library.unstock(id)?;
                batch = batch.update_library(library);
            }
        }

        self.repository.commit(batch).await?;
        self.discard_cover(book.image_url.as_deref()).await;

        tracing::info!(book_id = %id, "Book deleted");
        Ok(id)
    }

    /// Best-effort cover cleanup; failures are only logged
    async fn discard_cover(&self, url: Option<&str>) {
        if let Some(url) = url {
            if let Err(e) = self.covers.remove(url).await {
                tracing::warn!("Failed to remove cover {}: {}", url, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        config::AppConfig,
        models::{Library, Role},
        services::test_support::{png, Fixture},
    };

    fn input(title: &str) -> BookInput {
        BookInput {
            title: Some(title.to_string()),
            cover: png(),
        }
    }

    #[tokio::test]
    async fn blank_titles_are_rejected() {
        let fx = Fixture::new();
        let author = fx.user("Ada").await;

        for raw in ["", "   ", "\t\n", "\u{3000}"] {
            let err = fx.services.catalog.create(author.id, input(raw)).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(MessageKey::TitleRequired)), "{:?}", raw);
        }
        let err = fx
            .services
            .catalog
            .create(author.id, BookInput { title: None, cover: png() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(MessageKey::TitleRequired)));
        assert_eq!(fx.cover_count(), 0);
    }

    #[tokio::test]
    async fn cover_is_required_by_default() {
        let fx = Fixture::new();
        let author = fx.user("Ada").await;

        let err = fx
            .services
            .catalog
            .create(author.id, BookInput { title: Some("Dune".into()), cover: None })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(MessageKey::CoverImageRequired)));
    }

    #[tokio::test]
    async fn cover_can_be_optional() {
        let mut config = AppConfig::default();
        config.catalog.require_cover_image = false;
        let fx = Fixture::with_config(config);
        let author = fx.user("Ada").await;

        let book = fx
            .services
            .catalog
            .create(author.id, BookInput { title: Some("Dune".into()), cover: None })
            .await
            .unwrap();
        assert!(book.image_url.is_none());
    }

    #[tokio::test]
    async fn creating_books_grants_author_once() {
        let fx = Fixture::new();
        let author = fx.user("Ada").await;
        let catalog = &fx.services.catalog;

        let first = catalog.create(author.id, input("Dune")).await.unwrap();
        assert_eq!(first.author.as_deref(), Some("Ada"));
        assert_eq!(first.title, "Dune");

        let stored = fx.reload_user(author.id).await;
        assert_eq!(stored.books_written, vec![first.id]);
        assert_eq!(stored.roles.iter().copied().collect::<Vec<_>>(), vec![Role::Author]);

        let second = catalog.create(author.id, input("Emma")).await.unwrap();
        let stored = fx.reload_user(author.id).await;
        assert_eq!(stored.books_written, vec![first.id, second.id]);
        assert_eq!(stored.roles.len(), 1);
        assert_eq!(fx.cover_count(), 2);
    }

    #[tokio::test]
    async fn duplicate_titles_conflict_exactly() {
        let fx = Fixture::new();
        let author = fx.user("Ada").await;
        let catalog = &fx.services.catalog;
        catalog.create(author.id, input("Dune")).await.unwrap();

        let err = catalog.create(author.id, input("  Dune ")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(MessageKey::BookTitleTaken)));
        assert_eq!(fx.reload_user(author.id).await.books_written.len(), 1);

        // Comparison is case-sensitive
        catalog.create(author.id, input("dune")).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_author_is_not_found() {
        let fx = Fixture::new();
        let err = fx
            .services
            .catalog
            .create(Uuid::new_v4(), input("Dune"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(MessageKey::UserNotFound)));
        assert_eq!(fx.cover_count(), 0);
    }

    #[tokio::test]
    async fn only_the_author_may_update() {
        let fx = Fixture::new();
        let author = fx.user("Ada").await;
        let other = fx.user("Bob").await;
        let catalog = &fx.services.catalog;
        let book = catalog.create(author.id, input("Dune")).await.unwrap();

        let err = catalog
            .update(other.id, book.id, BookInput { title: Some("Mine".into()), cover: None })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(MessageKey::NotBookAuthor)));

        let err = catalog
            .update(author.id, book.id, BookInput { title: Some(" ".into()), cover: None })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(MessageKey::TitleRequired)));

        let updated = catalog
            .update(author.id, book.id, BookInput { title: Some("Dune Messiah".into()), cover: png() })
            .await
            .unwrap();
        assert_eq!(updated.title, "Dune Messiah");
        assert_ne!(updated.image_url, book.image_url);
        // The replaced cover was removed
        assert_eq!(fx.cover_count(), 1);
    }

    #[tokio::test]
    async fn update_of_missing_book_is_not_found() {
        let fx = Fixture::new();
        let author = fx.user("Ada").await;
        let err = fx
            .services
            .catalog
            .update(author.id, Uuid::new_v4(), input("Dune"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(MessageKey::BookNotFound)));
    }

    #[tokio::test]
    async fn delete_keeps_role_and_leaves_inventory_by_default() {
        let fx = Fixture::new();
        let author = fx.user("Ada").await;
        let owner = fx.user("Olga").await;
        let catalog = &fx.services.catalog;
        let book = catalog.create(author.id, input("Dune")).await.unwrap();

        let library = fx.services.libraries.create(owner.id, Some("Central".into())).await.unwrap();
        fx.services
            .libraries
            .add_book(owner.id, library.id, Some(book.id), Some(Decimal::from(2)))
            .await
            .unwrap();

        let err = catalog.delete(owner.id, book.id).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(MessageKey::NotBookAuthor)));

        catalog.delete(author.id, book.id).await.unwrap();

        let stored = fx.reload_user(author.id).await;
        assert!(stored.books_written.is_empty());
        assert!(stored.has_role(Role::Author));
        assert!(matches!(catalog.get(book.id).await, Err(AppError::NotFound(MessageKey::BookNotFound))));

        // Dangling entry stays in storage but is hidden from the library view
        assert_eq!(fx.reload_library(library.id).await.inventory.len(), 1);
        let detail = fx.services.libraries.get(library.id).await.unwrap();
        assert!(detail.inventory.is_empty());
    }

    #[tokio::test]
    async fn cascading_delete_cleans_inventories() {
        let mut config = AppConfig::default();
        config.catalog.cascade_book_delete = true;
        let fx = Fixture::with_config(config);
        let author = fx.user("Ada").await;
        let owner = fx.user("Olga").await;
        let reader = fx.user("Dan").await;
        let book = fx.services.catalog.create(author.id, input("Dune")).await.unwrap();

        let library = fx.services.libraries.create(owner.id, Some("Central".into())).await.unwrap();
        fx.services
            .libraries
            .add_book(owner.id, library.id, Some(book.id), Some(Decimal::ONE))
            .await
            .unwrap();
        fx.services.loans.borrow(reader.id, Some(library.id), Some(book.id)).await.unwrap();

        let err = fx.services.catalog.delete(author.id, book.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(MessageKey::BookCurrentlyBorrowed)));
        assert!(fx.services.catalog.get(book.id).await.is_ok());

        fx.services.loans.return_book(reader.id, Some(library.id), Some(book.id)).await.unwrap();
        fx.services.catalog.delete(author.id, book.id).await.unwrap();

        let stored: Library = fx.reload_library(library.id).await;
        assert!(stored.inventory.is_empty());
    }

    #[tokio::test]
    async fn detail_lists_every_library_copy() {
        let fx = Fixture::new();
        let author = fx.user("Ada").await;
        let owner = fx.user("Olga").await;
        let reader = fx.user("Dan").await;
        let book = fx.services.catalog.create(author.id, input("Dune")).await.unwrap();

        let libraries = &fx.services.libraries;
        let central = libraries.create(owner.id, Some("Central".into())).await.unwrap();
        let branch = libraries.create(owner.id, Some("Branch".into())).await.unwrap();
        libraries.add_book(owner.id, central.id, Some(book.id), Some(Decimal::from(5))).await.unwrap();
        libraries.add_book(owner.id, branch.id, Some(book.id), Some(Decimal::ZERO)).await.unwrap();
        fx.services.loans.borrow(reader.id, Some(branch.id), Some(book.id)).await.unwrap();

        let detail = fx.services.catalog.get(book.id).await.unwrap();
        assert_eq!(detail.author.map(|a| a.id), Some(author.id));
        assert_eq!(detail.libraries.len(), 2);

        let central_copy = detail.libraries.iter().find(|c| c.library_id == central.id).unwrap();
        assert!(central_copy.is_available);
        assert_eq!(central_copy.charge, Decimal::from(5));
        assert!(central_copy.borrower.is_none());

        let branch_copy = detail.libraries.iter().find(|c| c.library_id == branch.id).unwrap();
        assert!(!branch_copy.is_available);
        assert_eq!(branch_copy.library_name, "Branch");
        assert_eq!(branch_copy.borrower.as_ref().map(|b| b.id), Some(reader.id));
    }

    #[tokio::test]
    async fn list_is_empty_without_books() {
        let fx = Fixture::new();
        assert!(fx.services.catalog.list().await.unwrap().is_empty());
    }
}
