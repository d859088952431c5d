//! Background tasks spawned by `main`.

mod cleanup;

pub use cleanup::spawn_cleanup_task;
