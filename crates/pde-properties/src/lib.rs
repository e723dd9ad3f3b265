//! `.properties` parsing for PDE descriptor files.
//!
//! [`parse`] is a small, range-preserving reader for Java properties text. [`BuildProperties`]
//! layers the `build.properties` vocabulary (`source.<lib>`, `bin.includes`, `custom`, ...) on
//! top of it. `dev.properties` files are read with the plain parser.

pub mod build;
mod parser;

pub use build::{BuildEntry, BuildProperties, BuildPropertiesError};
pub use parser::{parse, Properties, Property};
