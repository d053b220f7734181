//! Interactive sessions with network devices over SSH, telnet and
//! serial consoles.
//!
//! The crate connects to a device, figures out what it is talking to
//! from the login banner, disables output paging, then runs commands by
//! watching for the device's prompt to reappear. Sessions are pooled
//! per endpoint so repeated commands reuse a live login.
//!
//! ```no_run
//! use rnetshell::session::Session;
//! use rnetshell::transport::{Endpoint, SshParams};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::new();
//! session
//!     .connect(&Endpoint::Ssh(SshParams::new("10.0.0.1", "admin", "secret")))
//!     .await?;
//! let output = session.execute_command("show ip interface brief").await?;
//! println!("{output}");
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod detect;
pub mod device;
pub mod error;
pub mod profile;
pub mod prompt;
pub mod session;
pub mod transport;

pub use error::{ConnectError, ExecError};
pub use profile::ProfileKey;
pub use session::{Session, SessionManager};
