mod application;
mod project;

pub use application::*;
pub use project::*;
