//! Strips embedded metadata (EXIF, XMP, IPTC and similar) from images held
//! in a bucket/file object store, writing the cleaned bytes back under the
//! original identity.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
