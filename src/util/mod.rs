//! Utility functions for common operations.
//!
//! - **URL handling**: scheme validation, resolving relative links against
//!   the page they were found on, and stripping tracking query strings
//!
//! # Examples
//!
//! ```
//! use atomizer::util::{resolve_href, strip_query};
//!
//! let media = resolve_href("https://www.npr.org/story", "/a.mp3?t=1").unwrap();
//! assert_eq!(strip_query(media.as_str()), "https://www.npr.org/a.mp3");
//! ```

mod url;

pub use self::url::{resolve_href, strip_query, validate_url, UrlError};
