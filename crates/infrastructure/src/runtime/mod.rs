mod context;

pub use context::{acquire_context, release_context, SharedContext};
