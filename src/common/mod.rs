mod id0;

pub use id0::{Id0, KeyY};
