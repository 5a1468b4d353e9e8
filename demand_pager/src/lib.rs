mod address_space;
pub mod addressing;
pub mod error;
mod fault;
mod fork;
mod frame_table;
mod loader;
mod mmap;
pub mod modules;
pub mod page;
mod page_directory;
mod swap_table;
mod uaccess;
mod util;
mod vm;
mod vm_config;
mod vm_lock;
mod vm_stats;

#[cfg(test)]
mod test;

pub use address_space::{AddressSpace, SpaceId};
pub use fault::PageFault;
pub use vm::Vm;
pub use vm_config::VmConfig;
pub use vm_stats::VmStats;
