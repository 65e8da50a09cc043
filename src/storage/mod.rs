pub mod document;
pub mod roster;
