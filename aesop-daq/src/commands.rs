//! Host commands
//!
//! * `parser`   - assembles commands from the triplicated frames
//! * `handlers` - one function per command code
//!

pub mod parser;
pub mod handlers;

pub use parser::{CommandParser,
                 CommandState};
pub use handlers::{handler_for,
                   allowed_while_armed,
                   cluster_mask,
                   Handler,
                   Response};
