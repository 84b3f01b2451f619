//! # ambit-storage
//!
//! The secure storage facade. Records are opaque byte blobs addressed by a
//! logical path (`storage/site.bin`, `storage/session.bin`). A
//! [`StorageBackend`] moves raw ciphertext to and from the local filesystem or
//! an object store; [`SecureStorage`] encrypts on the way in and decrypts on
//! the way out.
//!
//! ```text
//!   caller ── put(path, plaintext) ──▶ Cipher::seal ──▶ backend.save (atomic replace)
//!   caller ◀─ get(path) ── plaintext ◀─ Cipher::open ◀── backend.load
//! ```

pub mod backend;
pub mod cipher;
pub mod secure;
pub mod site;

pub use backend::{LocalStorage, MemoryStorage, ObjectStorage, StorageBackend, backend_for};
pub use cipher::Cipher;
pub use secure::SecureStorage;
pub use site::{SiteData, SiteStore};
