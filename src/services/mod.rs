mod file;

pub use file::FileService;
