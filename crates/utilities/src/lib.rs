//! Utility and operation catalogue for the Butterfly transformation engine.
//!
//! Every type here implements the `Utility` or `Operation` contract from
//! `butterfly-extensions` and is wired into templates through `Node`.

pub mod files;
pub mod format;
pub mod pom;
pub mod properties;
pub mod text;

pub use files::FindFiles;
pub use format::StringFormat;
pub use pom::PomModel;
pub use properties::AddProperty;
pub use text::ReplaceText;
