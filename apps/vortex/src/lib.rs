pub mod address_bar;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod guard;
pub mod history;
pub mod keyboard;
pub mod loading;
pub mod proxy;
pub mod search;
pub mod session;
pub mod telemetry;
pub mod terminal;
pub mod transport;

pub use error::{ShellError, ShellResult};
pub use session::{NavigationSession, SessionDeps};
