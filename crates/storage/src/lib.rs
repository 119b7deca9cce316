//! `harbor-storage` — persistent key-value media and the partitioned
//! repository built on them.

pub mod json_file;
pub mod medium;
pub mod partitioned;

pub use json_file::JsonFileMedium;
pub use medium::{KeyValueMedium, MemoryMedium};
pub use partitioned::{
    PartitionChooser, PartitionedOps, PartitionedRepository, PartitionedStore,
};
