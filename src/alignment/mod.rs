pub mod assembler;
pub mod combined;
pub mod time_axis;
