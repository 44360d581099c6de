pub mod decode;
pub mod fit;
pub mod store;
