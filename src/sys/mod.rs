//! Syscall-level building blocks for the tty engine.
//!
//! Everything here is a thin layer over `libc`: descriptor flag handling and
//! advisory locks, the `select(2)` bit vector and multiplexer, the self-pipe
//! used to interrupt a blocked wait, and the tty ioctl family.

pub mod fd;
pub mod fdset;
pub mod ioctl;
pub mod pipe;
pub mod select;

pub use fd::Descriptor;
pub use fdset::FdSet;
pub use ioctl::{FlowAction, ModemLines, Queue};
pub use pipe::CancelPipe;
