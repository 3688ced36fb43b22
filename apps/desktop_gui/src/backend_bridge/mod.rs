//! Backend bridge: commands queued from the UI and the worker thread that
//! owns the job controller.

pub mod commands;
pub mod runtime;
