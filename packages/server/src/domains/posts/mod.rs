pub mod models;
pub mod normalize;

// Re-export models (domain models)
pub use models::{Post, PostEntry, PostsDocument};

pub use normalize::{normalize, normalize_value};
