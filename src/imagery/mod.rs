//! Local satellite-imagery cache.

mod store;

pub use store::{ImageMeta, ImagePair, ImageStore};
