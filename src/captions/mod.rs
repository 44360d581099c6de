pub mod font;
pub mod layout;
