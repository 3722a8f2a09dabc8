// HTTP routes
pub mod files;
pub mod health;
pub mod run;

pub use files::*;
pub use health::*;
pub use run::*;
