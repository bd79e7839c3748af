//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `serve`  | `Serve`          |
//! | `submit` | `Submit`         |
//! | `config` | `Config`         |

pub mod config;
pub mod serve;
pub mod submit;

pub use config::cmd_config;
pub use serve::cmd_serve;
pub use submit::cmd_submit;
