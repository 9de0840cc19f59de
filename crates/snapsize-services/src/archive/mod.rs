//! Archive Assembler
//!
//! Turns processed sources into one ZIP or TAR plus its manifest. Entry naming lives
//! in [`naming`] and must stay stable: clients script against these paths.

pub mod naming;
mod service;

pub use naming::{entry_path, EntryNamer};
pub use service::ArchiveAssembler;
