pub mod utils;
pub use plotgrid::{Error, Result};

pub mod proc;
pub use proc::*;

pub mod cli;
pub mod indices;
pub mod job;
