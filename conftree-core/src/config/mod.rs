pub mod configuration;
pub mod cursor;
pub mod path;
pub mod registry;

pub use configuration::{ConfigSnapshot, Configuration};
pub use cursor::{Cursor, Resolved};
pub use path::KeyPath;
pub use registry::{ParentSpec, Registry};
