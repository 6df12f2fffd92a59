//! Settings are read from a TOML file (`--settings` or the build-profile
//! default) and can be overridden with `TOKENWARD__SECTION__KEY` environment
//! variables.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
