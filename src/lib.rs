//! Compucolor - a cycle-timed Compucolor II emulator
//!
//! This library provides the machine core: the 8080, the TMS 5501, the
//! SMC 5027, the floppy drives and the tick scheduler that ties them
//! together. Front ends drive a [`Machine`] and supply a
//! [`video::Renderer`].

pub mod scheduler;
pub mod memory;
pub mod cpu;
pub mod tms5501;
pub mod floppy;
pub mod video;
pub mod io;
pub mod machine;
pub mod config;
pub mod debugger;

pub use config::Config;
pub use cpu::I8080;
pub use floppy::image::DiskImage;
pub use machine::{Machine, Runner};
pub use memory::Memory;
