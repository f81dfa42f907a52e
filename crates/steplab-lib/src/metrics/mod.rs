pub mod poles;
pub mod summary;
pub mod transient;
