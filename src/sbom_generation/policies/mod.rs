mod dev_group;
mod path_rooting;

pub use dev_group::DevGroupPolicy;
pub use path_rooting::PathRooting;
