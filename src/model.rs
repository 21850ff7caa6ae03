pub mod display;
pub mod document;
