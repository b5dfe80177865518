//! CLI command implementations.
//!
//! | Module  | Command handled                         |
//! |---------|-----------------------------------------|
//! | `run`   | `run` — the autonomous polling loop     |
//! | `init`  | `init` — write `.drover.toml`           |
//! | `login` | `login` — store Trello credentials      |
//! | `push`  | `push` — create a card from a plan file |

pub mod init;
pub mod login;
pub mod push;
pub mod run;

pub use init::cmd_init;
pub use login::cmd_login;
pub use push::cmd_push;
pub use run::{cmd_run, RunOptions};
