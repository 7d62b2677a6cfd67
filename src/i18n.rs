//! Message catalogues for API responses
//!
//! Every success and error message leaving the server is identified by a
//! [`MessageKey`]. The text is resolved per request from the caller's
//! `Accept-Language` header, falling back to English.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::ACCEPT_LANGUAGE, request::Parts},
};
use once_cell::sync::Lazy;

macro_rules! message_keys {
    ($($variant:ident => $id:literal, $english:literal;)*) => {
        /// Stable identifier of a user-facing message
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum MessageKey {
            $($variant,)*
        }

        impl MessageKey {
            /// Every known key, in declaration order
            #[cfg(test)]
            pub const ALL: &'static [MessageKey] = &[$(MessageKey::$variant,)*];

            /// Snake-case identifier used in catalogues and logs
            pub fn as_str(self) -> &'static str {
                match self {
                    $(MessageKey::$variant => $id,)*
                }
            }

            /// Reference (English) text
            pub fn english(self) -> &'static str {
                match self {
                    $(MessageKey::$variant => $english,)*
                }
            }
        }
    };
}

message_keys! {
    // Validation
    TitleRequired => "title_required", "Book title is required";
    CoverImageRequired => "cover_image_required", "Cover image is required";
    CoverImageInvalid => "cover_image_invalid", "Cover image must be an image file";
    CoverImageTooLarge => "cover_image_too_large", "Cover image is too large";
    LibraryNameRequired => "library_name_required", "Library name is required";
    LibraryIdAndBookIdRequired => "library_id_and_book_id_required", "Library ID and Book ID are required";
    BookIdRequired => "book_id_required", "Book ID is required";
    ChargeRequired => "charge_required", "Charge is required";
    ChargeNegative => "charge_negative", "Charge cannot be negative";
    NameRequired => "name_required", "Name is required";
    InvalidEmail => "invalid_email", "A valid email is required";
    PasswordTooShort => "password_too_short", "Password must be at least 6 characters";
    InvalidRequestBody => "invalid_request_body", "Request body is malformed";
    InvalidPathParameter => "invalid_path_parameter", "Invalid identifier in request path";
    InvalidMultipart => "invalid_multipart", "Malformed multipart form";
    // Not found
    UserNotFound => "user_not_found", "User not found";
    BookNotFound => "book_not_found", "Book not found";
    LibraryNotFound => "library_not_found", "Library not found";
    BookNotInInventory => "book_not_in_inventory", "Book not found in this library inventory";
    RouteNotFound => "route_not_found", "Route not found";
    // Forbidden
    NotBookAuthor => "not_book_author", "Only the author of this book can modify it";
    NotLibraryOwner => "not_library_owner", "You do not have access to this library";
    NotBorrower => "not_borrower", "Only the borrower can return this book";
    // Conflict
    BookTitleTaken => "book_title_taken", "A book with this title already exists";
    LibraryNameTaken => "library_name_taken", "A library with this name already exists";
    BookAlreadyInInventory => "book_already_in_inventory", "Book already exists in the inventory";
    EmailTaken => "email_taken", "User already exists";
    BookCurrentlyBorrowed => "book_currently_borrowed", "Book is currently borrowed from a library";
    ConcurrentModification => "concurrent_modification", "The record was modified by another request, please retry";
    DuplicateRecord => "duplicate_record", "A record with the same unique value already exists";
    // State
    BookAlreadyBorrowed => "book_already_borrowed", "Book is already borrowed";
    BookNotBorrowed => "book_not_borrowed", "Book is not borrowed";
    // Authentication
    NoToken => "no_token", "Not authorized, no token provided";
    InvalidAccessToken => "invalid_access_token", "Invalid access token";
    AccessTokenExpired => "access_token_expired", "Access token expired";
    InvalidRefreshToken => "invalid_refresh_token", "Invalid refresh token";
    InvalidCredentials => "invalid_credentials", "Invalid email or password";
    // Server
    SomethingWentWrong => "something_went_wrong", "Something went wrong, please try again later.";
    // Success
    UserRegistered => "user_registered", "User is created";
    LoginSuccessful => "login_successful", "Logged in successfully";
    LoggedOut => "logged_out", "Logged out successfully";
    ProfileFetched => "profile_fetched", "Profile fetched successfully";
    BooksFetched => "books_fetched", "Books fetched successfully";
    BookFetched => "book_fetched", "Book fetched successfully";
    BookCreated => "book_created", "Book created successfully";
    BookUpdated => "book_updated", "Book updated successfully";
    BookDeleted => "book_deleted", "Book deleted successfully";
    LibrariesFetched => "libraries_fetched", "Libraries fetched successfully";
    LibraryFetched => "library_fetched", "Library fetched successfully";
    LibraryCreated => "library_created", "Library created successfully";
    LibraryUpdated => "library_updated", "Library updated successfully";
    LibraryDeleted => "library_deleted", "Library deleted successfully";
    InventoryFetched => "inventory_fetched", "Inventory fetched successfully";
    BookAddedToInventory => "book_added_to_inventory", "Book added to inventory successfully";
    BookRemovedFromInventory => "book_removed_from_inventory", "Book removed from inventory successfully";
    BookBorrowed => "book_borrowed", "Book borrowed successfully";
    BookReturned => "book_returned", "Book returned successfully";
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported response languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lang {
    #[default]
    En,
    Hi,
}

impl Lang {
    fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.split(['-', '_']).next()?.trim().to_ascii_lowercase();
        match primary.as_str() {
            "en" => Some(Lang::En),
            "hi" => Some(Lang::Hi),
            _ => None,
        }
    }

    /// Pick the highest-weighted supported language from an `Accept-Language` value
    pub fn from_accept_language(header: &str) -> Self {
        let mut candidates: Vec<(f32, Lang)> = header
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.split(';');
                let lang = Lang::from_tag(pieces.next()?)?;
                let weight = pieces
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                // q=0 marks the language as not acceptable
                (weight > 0.0).then_some((weight, lang))
            })
            .collect();

        // Stable sort keeps header order among equal weights
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        candidates.first().map(|(_, lang)| *lang).unwrap_or_default()
    }

    /// Translate a message key into this language
    pub fn t(self, key: MessageKey) -> String {
        translate(key, self).to_string()
    }
}

static HINDI: Lazy<HashMap<MessageKey, &'static str>> = Lazy::new(|| {
    use MessageKey::*;
    HashMap::from([
        (TitleRequired, "पुस्तक का शीर्षक आवश्यक है"),
        (CoverImageRequired, "कवर छवि आवश्यक है"),
        (CoverImageInvalid, "कवर एक छवि फ़ाइल होनी चाहिए"),
        (CoverImageTooLarge, "कवर छवि बहुत बड़ी है"),
        (LibraryNameRequired, "पुस्तकालय का नाम आवश्यक है"),
        (LibraryIdAndBookIdRequired, "पुस्तकालय आईडी और पुस्तक आईडी आवश्यक हैं"),
        (BookIdRequired, "पुस्तक आईडी आवश्यक है"),
        (ChargeRequired, "शुल्क आवश्यक है"),
        (ChargeNegative, "शुल्क ऋणात्मक नहीं हो सकता"),
        (NameRequired, "नाम आवश्यक है"),
        (InvalidEmail, "मान्य ईमेल आवश्यक है"),
        (PasswordTooShort, "पासवर्ड कम से कम 6 अक्षरों का होना चाहिए"),
        (InvalidRequestBody, "अनुरोध का मुख्य भाग गलत है"),
        (InvalidPathParameter, "अनुरोध पथ में अमान्य पहचानकर्ता"),
        (InvalidMultipart, "गलत मल्टीपार्ट फ़ॉर्म"),
        (UserNotFound, "उपयोगकर्ता नहीं मिला"),
        (BookNotFound, "पुस्तक नहीं मिली"),
        (LibraryNotFound, "पुस्तकालय नहीं मिला"),
        (BookNotInInventory, "इस पुस्तकालय की सूची में पुस्तक नहीं मिली"),
        (RouteNotFound, "मार्ग नहीं मिला"),
        (NotBookAuthor, "केवल इस पुस्तक का लेखक इसे बदल सकता है"),
        (NotLibraryOwner, "आपको इस पुस्तकालय तक पहुँच नहीं है"),
        (NotBorrower, "केवल उधारकर्ता ही यह पुस्तक लौटा सकता है"),
        (BookTitleTaken, "इस शीर्षक वाली पुस्तक पहले से मौजूद है"),
        (LibraryNameTaken, "इस नाम का पुस्तकालय पहले से मौजूद है"),
        (BookAlreadyInInventory, "पुस्तक पहले से सूची में मौजूद है"),
        (EmailTaken, "उपयोगकर्ता पहले से मौजूद है"),
        (BookCurrentlyBorrowed, "पुस्तक अभी किसी पुस्तकालय से उधार ली गई है"),
        (ConcurrentModification, "रिकॉर्ड किसी अन्य अनुरोध द्वारा बदला गया, कृपया पुनः प्रयास करें"),
        (DuplicateRecord, "समान अद्वितीय मान वाला रिकॉर्ड पहले से मौजूद है"),
        (BookAlreadyBorrowed, "पुस्तक पहले ही उधार ली जा चुकी है"),
        (BookNotBorrowed, "पुस्तक उधार नहीं ली गई है"),
        (NoToken, "अधिकृत नहीं, कोई टोकन नहीं दिया गया"),
        (InvalidAccessToken, "अमान्य एक्सेस टोकन"),
        (AccessTokenExpired, "एक्सेस टोकन की समय सीमा समाप्त हो गई"),
        (InvalidRefreshToken, "अमान्य रीफ़्रेश टोकन"),
        (InvalidCredentials, "अमान्य ईमेल या पासवर्ड"),
        (SomethingWentWrong, "कुछ गलत हो गया, कृपया बाद में पुनः प्रयास करें।"),
        (UserRegistered, "उपयोगकर्ता बनाया गया"),
        (LoginSuccessful, "सफलतापूर्वक लॉग इन किया गया"),
        (LoggedOut, "सफलतापूर्वक लॉग आउट किया गया"),
        (ProfileFetched, "प्रोफ़ाइल सफलतापूर्वक प्राप्त हुई"),
        (BooksFetched, "पुस्तकें सफलतापूर्वक प्राप्त हुईं"),
        (BookFetched, "पुस्तक सफलतापूर्वक प्राप्त हुई"),
        (BookCreated, "पुस्तक सफलतापूर्वक बनाई गई"),
        (BookUpdated, "पुस्तक सफलतापूर्वक अपडेट की गई"),
        (BookDeleted, "पुस्तक सफलतापूर्वक हटाई गई"),
        (LibrariesFetched, "पुस्तकालय सफलतापूर्वक प्राप्त हुए"),
        (LibraryFetched, "पुस्तकालय सफलतापूर्वक प्राप्त हुआ"),
        (LibraryCreated, "पुस्तकालय सफलतापूर्वक बनाया गया"),
        (LibraryUpdated, "पुस्तकालय सफलतापूर्वक अपडेट किया गया"),
        (LibraryDeleted, "पुस्तकालय सफलतापूर्वक हटाया गया"),
        (InventoryFetched, "सूची सफलतापूर्वक प्राप्त हुई"),
        (BookAddedToInventory, "पुस्तक सफलतापूर्वक सूची में जोड़ी गई"),
        (BookRemovedFromInventory, "पुस्तक सफलतापूर्वक सूची से हटाई गई"),
        (BookBorrowed, "पुस्तक सफलतापूर्वक उधार ली गई"),
        (BookReturned, "पुस्तक सफलतापूर्वक लौटाई गई"),
    ])
});

/// Resolve the text of `key` in `lang`, falling back to English
pub fn translate(key: MessageKey, lang: Lang) -> &'static str {
    match lang {
        Lang::En => key.english(),
        Lang::Hi => HINDI.get(&key).copied().unwrap_or_else(|| key.english()),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Lang
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok())
            .map(Lang::from_accept_language)
            .unwrap_or_default())
    }
}
