//! Probing the host for tool paths, system include directories, and
//! scheduling parameters (spec.md §4.7 step (i)). Kept in its own module so
//! the rest of the crate only ever sees the resolved [`HostProbe`], never a
//! raw subprocess invocation of its own.

mod probe;

pub use probe::HostProbe;
