/// Filesystem adapters: dependency file access and SBOM output
mod file_writer;
mod local_dep_file;

pub use file_writer::{FileSystemWriter, StdoutPresenter};
pub use local_dep_file::{decode_text, LocalDepFile, LocalFileSystem};
