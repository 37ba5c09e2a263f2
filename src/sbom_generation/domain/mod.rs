pub mod artifact;
pub mod ecosystem;
pub mod file_position;
pub mod lockfile;
pub mod package_component;
pub mod package_record;

pub use artifact::{ArtifactDescriptor, ArtifactDetail};
pub use ecosystem::{Ecosystem, PackageManager};
pub use file_position::{FileLocations, FilePosition, Position};
pub use lockfile::{Lockfile, ScannedSource};
pub use package_component::{
    PackageComponent, PackageLocation, PackageLocations, SourcefileLocations,
    IS_DEV_DEPENDENCY_METADATA, IS_DIRECT_DEPENDENCY_METADATA, PACKAGE_MANAGER_METADATA,
};
pub use package_record::{sort_records, PackageRecord, DEV_GROUP, OPTIONAL_GROUP, PROD_GROUP};
