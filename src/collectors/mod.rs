pub mod mounts;
pub mod partitions;
pub mod resolve;
