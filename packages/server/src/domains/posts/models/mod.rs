pub mod document;
pub mod post;

pub use document::PostsDocument;
pub use post::{Post, PostEntry};
