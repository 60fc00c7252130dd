pub mod blob_object;
pub mod file_reference;
