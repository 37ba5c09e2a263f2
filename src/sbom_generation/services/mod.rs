mod package_grouper;
mod purl;

pub use package_grouper::{GroupedPackages, PackageGrouper};
pub use purl::{normalize_python_name, PackageUrl};
