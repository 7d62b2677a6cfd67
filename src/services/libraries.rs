//! Libraries and their inventories

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use rust_decimal::Decimal;
use uuid::Uuid;

use super::{borrowed_elsewhere, require_book, require_library, require_user, user_summaries};
use crate::{
    error::{AppError, AppResult},
    i18n::MessageKey,
    models::{
        library::{InventoryItem, LibraryDetail, LibrarySummary},
        normalize_name, Library, RoleEvent, User,
    },
    repository::{Repository, WriteBatch},
};

#[derive(Clone)]
pub struct LibrariesService {
    repository: Arc<dyn Repository>,
}

impl LibrariesService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> AppResult<Vec<LibrarySummary>> {
        let libraries = self.repository.libraries().await?;
        self.summarize(&libraries).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<LibraryDetail> {
        let library = require_library(self.repository.as_ref(), id).await?;
        let inventory = self.resolve_inventory(&library).await?;
        Ok(LibraryDetail {
            id: library.id,
            name: library.name,
            owner_id: library.owner_id,
            created_at: library.created_at,
            inventory,
        })
    }

    /// Open a library owned by the caller
    pub async fn create(&self, owner_id: Uuid, name: Option<String>) -> AppResult<LibrarySummary> {
        let name = name
            .as_deref()
            .and_then(normalize_name)
            .ok_or(AppError::Validation(MessageKey::LibraryNameRequired))?;

        let mut owner = require_user(self.repository.as_ref(), owner_id).await?;
        if self.repository.library_by_name(&name).await?.is_some() {
            return Err(AppError::Conflict(MessageKey::LibraryNameTaken));
        }

        let library = Library::new(name, owner_id);
        owner.apply(RoleEvent::LibraryCreated);
        owner.record_library_owned(library.id);

        self.repository
            .commit(
                WriteBatch::new()
                    .insert_library(library.clone())
                    .update_user(owner),
            )
            .await?;

        tracing::info!(library_id = %library.id, owner_id = %owner_id, "Library created");
        Ok(library.summary(|_| false))
    }

    /// Rename a library; owner only. A missing name leaves it unchanged.
    pub async fn update(
        &self,
        caller_id: Uuid,
        id: Uuid,
        name: Option<String>,
    ) -> AppResult<LibrarySummary> {
        let name = match name {
            Some(raw) => Some(
                normalize_name(&raw).ok_or(AppError::Validation(MessageKey::LibraryNameRequired))?,
            ),
            None => None,
        };

        let (mut library, _) = self.owned_library(caller_id, id).await?;

        if let Some(name) = name {
            if name != library.name && self.repository.library_by_name(&name).await?.is_some() {
                return Err(AppError::Conflict(MessageKey::LibraryNameTaken));
            }
            library.name = name;
        }

        self.repository
            .commit(WriteBatch::new().update_library(library.clone()))
            .await?;

        tracing::info!(library_id = %id, "Library updated");
        let mut summaries = self.summarize(std::slice::from_ref(&library)).await?;
        summaries.pop().ok_or(AppError::NotFound(MessageKey::LibraryNotFound))
    }

    /// Close a library; owner only. Books on loan from it are released.
    pub async fn delete(&self, caller_id: Uuid, id: Uuid) -> AppResult<Uuid> {
        let (library, mut owner) = self.owned_library(caller_id, id).await?;
        owner.forget_library_owned(id);

        let mut held: BTreeMap<Uuid, Vec<Uuid>> = BTreeMap::new();
        for (book_id, borrower) in library.loans() {
            held.entry(borrower).or_default().push(book_id);
        }

        if let Some(books) = held.remove(&owner.id) {
            for book_id in books {
                if !borrowed_elsewhere(self.repository.as_ref(), owner.id, book_id, id).await? {
                    owner.forget_borrowed(book_id);
                }
            }
        }

        let borrower_ids: Vec<Uuid> = held.keys().copied().collect();
        let mut batch = WriteBatch::new()
            .delete_library(library)
            .update_user(owner);
        for mut borrower in self.repository.users_by_ids(&borrower_ids).await? {
            for book_id in held.get(&borrower.id).into_iter().flatten() {
                if !borrowed_elsewhere(self.repository.as_ref(), borrower.id, *book_id, id).await? {
                    borrower.forget_borrowed(*book_id);
                }
            }
            batch = batch.update_user(borrower);
        }

        self.repository.commit(batch).await?;
        tracing::info!(library_id = %id, "Library deleted");
        Ok(id)
    }

    pub async fn inventory(&self, id: Uuid) -> AppResult<Vec<InventoryItem>> {
        let library = require_library(self.repository.as_ref(), id).await?;
        self.resolve_inventory(&library).await
    }

    /// Stock a book at the given per-borrow charge; owner only
    pub async fn add_book(
        &self,
        caller_id: Uuid,
        library_id: Uuid,
        book_id: Option<Uuid>,
        charge: Option<Decimal>,
    ) -> AppResult<Vec<InventoryItem>> {
        let book_id = book_id.ok_or(AppError::Validation(MessageKey::BookIdRequired))?;
        let charge = charge.ok_or(AppError::Validation(MessageKey::ChargeRequired))?;
        if charge < Decimal::ZERO {
            return Err(AppError::Validation(MessageKey::ChargeNegative));
        }

        let (mut library, _) = self.owned_library(caller_id, library_id).await?;
        require_book(self.repository.as_ref(), book_id).await?;

        library.stock(book_id, charge)?;
        self.repository
            .commit(WriteBatch::new().update_library(library.clone()))
            .await?;

        tracing::info!(library_id = %library_id, book_id = %book_id, %charge, "Book stocked");
        self.resolve_inventory(&library).await
    }

    /// Withdraw a book from the inventory; owner only
    pub async fn remove_book(
        &self,
        caller_id: Uuid,
        library_id: Uuid,
        book_id: Uuid,
    ) -> AppResult<Vec<InventoryItem>> {
        let (mut library, _) = self.owned_library(caller_id, library_id).await?;
        let entry = library.unstock(book_id)?;

        let mut batch = WriteBatch::new().update_library(library.clone());
        if let Some(borrower_id) = entry.borrower() {
            // The copy leaves circulation, so it no longer counts as held
            if !borrowed_elsewhere(self.repository.as_ref(), borrower_id, book_id, library_id).await? {
                if let Some(mut borrower) = self.repository.user_by_id(borrower_id).await? {
                    borrower.forget_borrowed(book_id);
                    batch = batch.update_user(borrower);
                }
            }
        }

        self.repository.commit(batch).await?;
        tracing::info!(library_id = %library_id, book_id = %book_id, "Book withdrawn");
        self.resolve_inventory(&library).await
    }

    async fn summarize(&self, libraries: &[Library]) -> AppResult<Vec<LibrarySummary>> {
        let book_ids: Vec<Uuid> = libraries
            .iter()
            .flat_map(|l| l.inventory.iter().map(|e| e.book_id()))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let existing: HashSet<Uuid> = self
            .repository
            .books_by_ids(&book_ids)
            .await?
            .into_iter()
            .map(|b| b.id)
            .collect();
        Ok(libraries
            .iter()
            .map(|l| l.summary(|id| existing.contains(&id)))
            .collect())
    }

    /// Load a library and its owner, checking that the caller owns it
    async fn owned_library(&self, caller_id: Uuid, id: Uuid) -> AppResult<(Library, User)> {
        let library = require_library(self.repository.as_ref(), id).await?;
        let caller = require_user(self.repository.as_ref(), caller_id).await?;
        if let Err(e) = library.require_owner(caller.id) {
            tracing::warn!(library_id = %id, caller = %caller_id, "Rejected library change by non-owner");
            return Err(e);
        }
        Ok((library, caller))
    }

    /// Join inventory entries with their books and borrowers.
    /// Entries whose book no longer exists are skipped.
    async fn resolve_inventory(&self, library: &Library) -> AppResult<Vec<InventoryItem>> {
        let book_ids: Vec<Uuid> = library.inventory.iter().map(|e| e.book_id()).collect();
        let books: HashMap<Uuid, _> = self
            .repository
            .books_by_ids(&book_ids)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();
        let users = user_summaries(
            self.repository.as_ref(),
            library.inventory.iter().filter_map(|e| e.borrower()),
        )
        .await?;

        Ok(library
            .inventory
            .iter()
            .filter_map(|entry| {
                let book = books.get(&entry.book_id())?;
                Some(InventoryItem {
                    book_id: book.id,
                    title: book.title.clone(),
                    image_url: book.image_url.clone(),
                    is_available: entry.is_available(),
                    charge: entry.charge(),
                    borrower: entry.borrower().and_then(|b| users.get(&b).cloned()),
                    borrowed_at: entry.borrowed_at(),
                })
            })
            .collect())
    }
}
