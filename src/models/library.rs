//! Library model and its embedded inventory
//!
//! Each inventory entry is one stocked copy and moves between two states:
//!
//! ```text
//!   Available --check_out(user)--> Borrowed{user, since}
//!   Borrowed  --check_in(user)---> Available
//! ```
//!
//! `is_available`, `borrower` and `borrowed_at` only ever change together,
//! through [`InventoryEntry::check_out`] and [`InventoryEntry::check_in`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::user::UserSummary;
use crate::{
    error::{AppError, AppResult},
    i18n::MessageKey,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Available,
    Borrowed {
        borrower: Uuid,
        since: DateTime<Utc>,
    },
}

/// One stocked copy of a book, embedded in its library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntry {
    book_id: Uuid,
    #[serde(default)]
    borrower: Option<Uuid>,
    #[serde(default)]
    borrowed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_available")]
    is_available: bool,
    /// Fee charged per borrow
    #[serde(with = "rust_decimal::serde::float", default)]
    #[schema(value_type = f64)]
    charge: Decimal,
}

fn default_available() -> bool {
    true
}

impl InventoryEntry {
    pub fn new(book_id: Uuid, charge: Decimal) -> Self {
        Self {
            book_id,
            borrower: None,
            borrowed_at: None,
            is_available: true,
            charge,
        }
    }

    pub fn book_id(&self) -> Uuid {
        self.book_id
    }

    pub fn charge(&self) -> Decimal {
        self.charge
    }

    pub fn is_available(&self) -> bool {
        self.is_available
    }

    pub fn borrower(&self) -> Option<Uuid> {
        self.borrower
    }

    pub fn borrowed_at(&self) -> Option<DateTime<Utc>> {
        self.borrowed_at
    }

    pub fn state(&self) -> EntryState {
        match (self.is_available, self.borrower, self.borrowed_at) {
            (false, Some(borrower), Some(since)) => EntryState::Borrowed { borrower, since },
            _ => EntryState::Available,
        }
    }

    /// Available -> Borrowed
    pub fn check_out(&mut self, borrower: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        if let EntryState::Borrowed { .. } = self.state() {
            return Err(AppError::BadRequest(MessageKey::BookAlreadyBorrowed));
        }
        self.is_available = false;
        self.borrower = Some(borrower);
        self.borrowed_at = Some(at);
        Ok(())
    }

    /// Borrowed -> Available; only the recorded borrower may release the copy
    pub fn check_in(&mut self, caller: Uuid) -> AppResult<()> {
        match self.state() {
            EntryState::Available => Err(AppError::BadRequest(MessageKey::BookNotBorrowed)),
            EntryState::Borrowed { borrower, .. } if borrower != caller => {
                Err(AppError::Authorization(MessageKey::NotBorrower))
            }
            EntryState::Borrowed { .. } => {
                self.is_available = true;
                self.borrower = None;
                self.borrowed_at = None;
                Ok(())
            }
        }
    }
}

/// Library document with its embedded inventory
#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub inventory: Vec<InventoryEntry>,
    pub created_at: DateTime<Utc>,
    pub revision: i64,
}

impl Library {
    pub fn new(name: String, owner_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            owner_id,
            inventory: Vec::new(),
            created_at: Utc::now(),
            revision: 0,
        }
    }

    pub fn require_owner(&self, user_id: Uuid) -> AppResult<()> {
        if self.owner_id == user_id {
            Ok(())
        } else {
            Err(AppError::Authorization(MessageKey::NotLibraryOwner))
        }
    }

    pub fn entry(&self, book_id: Uuid) -> Option<&InventoryEntry> {
        self.inventory.iter().find(|e| e.book_id == book_id)
    }

    pub fn entry_mut(&mut self, book_id: Uuid) -> AppResult<&mut InventoryEntry> {
        self.inventory
            .iter_mut()
            .find(|e| e.book_id == book_id)
            .ok_or(AppError::NotFound(MessageKey::BookNotInInventory))
    }

    /// Add a copy of `book_id`; a library stocks each title at most once
    pub fn stock(&mut self, book_id: Uuid, charge: Decimal) -> AppResult<&InventoryEntry> {
        if self.entry(book_id).is_some() {
            return Err(AppError::Conflict(MessageKey::BookAlreadyInInventory));
        }
        self.inventory.push(InventoryEntry::new(book_id, charge));
        Ok(&self.inventory[self.inventory.len() - 1])
    }

    pub fn unstock(&mut self, book_id: Uuid) -> AppResult<InventoryEntry> {
        let index = self
            .inventory
            .iter()
            .position(|e| e.book_id == book_id)
            .ok_or(AppError::NotFound(MessageKey::BookNotInInventory))?;
        Ok(self.inventory.remove(index))
    }

    /// `(book_id, borrower)` for every copy currently out
    pub fn loans(&self) -> impl Iterator<Item = (Uuid, Uuid)> + '_ {
        self.inventory.iter().filter_map(|e| match e.state() {
            EntryState::Borrowed { borrower, .. } => Some((e.book_id, borrower)),
            EntryState::Available => None,
        })
    }

    /// Listing form; only entries whose book still exists are counted
    pub fn summary(&self, book_exists: impl Fn(Uuid) -> bool) -> LibrarySummary {
        LibrarySummary {
            id: self.id,
            name: self.name.clone(),
            owner_id: self.owner_id,
            inventory_count: self.inventory.iter().filter(|e| book_exists(e.book_id)).count(),
            created_at: self.created_at,
        }
    }
}

/// Library as listed
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySummary {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub inventory_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Inventory entry resolved against the catalog
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub book_id: Uuid,
    pub title: String,
    pub image_url: Option<String>,
    pub is_available: bool,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub charge: Decimal,
    pub borrower: Option<UserSummary>,
    pub borrowed_at: Option<DateTime<Utc>>,
}

/// Library detail aggregate
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LibraryDetail {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub inventory: Vec<InventoryItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library_with_book() -> (Library, Uuid) {
        let mut library = Library::new("Central".into(), Uuid::new_v4());
        let book = Uuid::new_v4();
        library.stock(book, Decimal::from(5)).unwrap();
        (library, book)
    }

    #[test]
    fn new_entries_start_available() {
        let (library, book) = library_with_book();
        let entry = library.entry(book).unwrap();
        assert_eq!(entry.state(), EntryState::Available);
        assert!(entry.is_available());
        assert_eq!(entry.borrower(), None);
        assert_eq!(entry.charge(), Decimal::from(5));
    }

    #[test]
    fn stocking_the_same_book_twice_conflicts() {
        let (mut library, book) = library_with_book();
        let err = library.stock(book, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, AppError::Conflict(MessageKey::BookAlreadyInInventory)));
        assert_eq!(library.inventory.len(), 1);
    }

    #[test]
    fn check_out_moves_all_fields_together() {
        let (mut library, book) = library_with_book();
        let reader = Uuid::new_v4();
        let now = Utc::now();

        library.entry_mut(book).unwrap().check_out(reader, now).unwrap();

        let entry = library.entry(book).unwrap();
        assert_eq!(entry.state(), EntryState::Borrowed { borrower: reader, since: now });
        assert!(!entry.is_available());
        assert_eq!(entry.borrower(), Some(reader));
        assert_eq!(entry.borrowed_at(), Some(now));
    }

    #[test]
    fn second_check_out_fails_and_keeps_first_borrower() {
        let (mut library, book) = library_with_book();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let entry = library.entry_mut(book).unwrap();
        entry.check_out(first, Utc::now()).unwrap();
        let before = entry.clone();

        let err = entry.check_out(second, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(MessageKey::BookAlreadyBorrowed)));
        assert_eq!(*entry, before);
    }

    #[test]
    fn only_the_borrower_can_check_in() {
        let (mut library, book) = library_with_book();
        let reader = Uuid::new_v4();
        let entry = library.entry_mut(book).unwrap();
        entry.check_out(reader, Utc::now()).unwrap();

        let err = entry.check_in(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::Authorization(MessageKey::NotBorrower)));
        assert_eq!(entry.borrower(), Some(reader));

        entry.check_in(reader).unwrap();
        assert_eq!(entry.state(), EntryState::Available);
    }

    #[test]
    fn check_in_of_available_entry_is_rejected() {
        let (mut library, book) = library_with_book();
        let err = library.entry_mut(book).unwrap().check_in(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(MessageKey::BookNotBorrowed)));
    }

    #[test]
    fn borrow_return_restores_the_available_entry() {
        let (mut library, book) = library_with_book();
        let pristine = library.entry(book).unwrap().clone();
        let reader = Uuid::new_v4();

        let entry = library.entry_mut(book).unwrap();
        entry.check_out(reader, Utc::now()).unwrap();
        entry.check_in(reader).unwrap();

        assert_eq!(*library.entry(book).unwrap(), pristine);
    }

    #[test]
    fn unstock_missing_book_is_not_found() {
        let (mut library, _) = library_with_book();
        let err = library.unstock(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(MessageKey::BookNotInInventory)));
        assert_eq!(library.inventory.len(), 1);
    }

    #[test]
    fn loans_lists_borrowed_copies_only() {
        let (mut library, book) = library_with_book();
        let other = Uuid::new_v4();
        library.stock(other, Decimal::ZERO).unwrap();
        let reader = Uuid::new_v4();
        library.entry_mut(book).unwrap().check_out(reader, Utc::now()).unwrap();

        assert_eq!(library.loans().collect::<Vec<_>>(), vec![(book, reader)]);
    }

    #[test]
    fn summary_counts_only_existing_books() {
        let (mut library, kept) = library_with_book();
        let gone = Uuid::new_v4();
        library.stock(gone, Decimal::ZERO).unwrap();

        assert_eq!(library.summary(|id| id == kept).inventory_count, 1);
        assert_eq!(library.summary(|_| true).inventory_count, 2);
    }

    #[test]
    fn inventory_entries_serialize_with_wire_names() {
        let entry = InventoryEntry::new(Uuid::nil(), Decimal::from(5));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["bookId"], Uuid::nil().to_string());
        assert_eq!(json["isAvailable"], true);
        assert_eq!(json["charge"].as_f64(), Some(5.0));
        assert!(json["borrower"].is_null());

        let back: InventoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
