//! Interfaces to everything the paging subsystem does not implement itself.
//!
//! Every collaborator is a trait with at least one implementation that runs
//! on a desktop machine, so that the subsystem can be tested without real
//! hardware.

pub mod backing_file;
pub mod frame_allocator;
pub mod page_table;
pub mod swap_device;
