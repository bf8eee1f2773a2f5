mod error;
mod key;
mod mime;
mod signing;
mod traits;

pub mod filesystem;
#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::StorageError;
pub use key::{MAX_KEY_LEN, ObjectKey, sanitize_file_name, validate_key};
pub use mime::resolve_mime_type;
pub use signing::{SignatureError, UrlSigner};
pub use traits::{ObjectInfo, ObjectStore};
