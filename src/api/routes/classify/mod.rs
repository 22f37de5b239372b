mod pages;
pub mod public;
mod router;
pub use pages::Pages;
pub use router::router;
