pub mod error;
pub mod metadata;
pub mod zarr_writer;
