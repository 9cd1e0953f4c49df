pub mod filesystem;

pub use filesystem::ObjectStorage;
