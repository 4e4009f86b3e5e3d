pub mod document;
pub mod extractor;
pub mod interaction;
pub mod page;
pub mod patterns;
pub mod rescan;
pub mod scanner;
