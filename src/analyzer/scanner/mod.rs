pub mod file_scanner;

pub use file_scanner::{FileScanner, group_by_dir, is_included_file};
