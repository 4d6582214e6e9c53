pub mod calls;
pub mod files;
pub mod mappings;
pub mod recordings;
pub mod system;
