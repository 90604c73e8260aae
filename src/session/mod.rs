pub mod codec;
pub mod file_store;
pub mod model;
pub mod store;
pub mod token;
