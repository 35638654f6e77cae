pub mod csv_writer;
pub mod file_naming;
pub mod metadata;
