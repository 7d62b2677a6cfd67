//! Borrowing workflow
//!
//! A borrow or return touches two documents, the library holding the
//! inventory entry and the borrowing user. Both updates go out in one
//! batch, and the library update is conditional on the revision that was
//! read, so two racing borrows of the same copy cannot both succeed.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::{borrowed_elsewhere, require_library, require_user};
use crate::{
    error::{AppError, AppResult},
    i18n::MessageKey,
    models::{
        loan::{BorrowedBook, ReturnedBook},
        RoleEvent,
    },
    repository::{Repository, WriteBatch},
};

#[derive(Clone)]
pub struct LoansService {
    repository: Arc<dyn Repository>,
}

impl LoansService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Check out a library's copy of a book to the caller
    pub async fn borrow(
        &self,
        caller_id: Uuid,
        library_id: Option<Uuid>,
        book_id: Option<Uuid>,
    ) -> AppResult<BorrowedBook> {
        let (Some(library_id), Some(book_id)) = (library_id, book_id) else {
            return Err(AppError::Validation(MessageKey::LibraryIdAndBookIdRequired));
        };

        let mut library = require_library(self.repository.as_ref(), library_id).await?;
        let entry = library
            .entry(book_id)
            .ok_or(AppError::NotFound(MessageKey::BookNotInInventory))?;
        if !entry.is_available() {
            return Err(AppError::BadRequest(MessageKey::BookAlreadyBorrowed));
        }
        let mut borrower = require_user(self.repository.as_ref(), caller_id).await?;

        let entry = library.entry_mut(book_id)?;
        entry.check_out(caller_id, Utc::now())?;
        let charge = entry.charge();

        borrower.apply(RoleEvent::BookBorrowed);
        borrower.record_borrowed(book_id);

        self.repository
            .commit(
                WriteBatch::new()
                    .update_library(library)
                    .update_user(borrower.clone()),
            )
            .await?;

        tracing::info!(
            library_id = %library_id,
            book_id = %book_id,
            borrower_id = %caller_id,
            %charge,
            "Book borrowed"
        );
        Ok(BorrowedBook {
            id: book_id,
            borrower: borrower.summary(),
            charge,
        })
    }

    /// Give a borrowed copy back; only its borrower may do so
    pub async fn return_book(
        &self,
        caller_id: Uuid,
        library_id: Option<Uuid>,
        book_id: Option<Uuid>,
    ) -> AppResult<ReturnedBook> {
        let (Some(library_id), Some(book_id)) = (library_id, book_id) else {
            return Err(AppError::Validation(MessageKey::LibraryIdAndBookIdRequired));
        };

        let mut library = require_library(self.repository.as_ref(), library_id).await?;
        if let Err(e) = library.entry_mut(book_id)?.check_in(caller_id) {
            if matches!(e, AppError::Authorization(_)) {
                tracing::warn!(
                    library_id = %library_id,
                    book_id = %book_id,
                    caller = %caller_id,
                    "Rejected return by someone other than the borrower"
                );
            }
            return Err(e);
        }

        let mut batch = WriteBatch::new().update_library(library);
        if !borrowed_elsewhere(self.repository.as_ref(), caller_id, book_id, library_id).await? {
            if let Some(mut borrower) = self.repository.user_by_id(caller_id).await? {
                borrower.forget_borrowed(book_id);
                batch = batch.update_user(borrower);
            }
        }
        self.repository.commit(batch).await?;

        tracing::info!(
            library_id = %library_id,
            book_id = %book_id,
            borrower_id = %caller_id,
            "Book returned"
        );
        Ok(ReturnedBook {
            id: book_id,
            library_id,
        })
    }
}
