//! Data models for Bookshelf

pub mod book;
pub mod library;
pub mod loan;
pub mod user;

use unicode_normalization::UnicodeNormalization;

// Re-export commonly used types
pub use book::Book;
pub use library::{InventoryEntry, Library};
pub use user::{Role, RoleEvent, User, UserSummary};

/// Trim and NFC-normalise a display name (book title, library name).
///
/// Returns `None` when nothing but whitespace was supplied.
pub fn normalize_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.nfc().collect())
}
