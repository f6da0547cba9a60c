//! provlab session controller
//!
//! Ties the store, recorder, graph builder and export projections together
//! for each open notebook.
//!
//! - [`SessionRegistry`]: one [`Session`] per notebook path, nothing global
//! - [`Session`]: cursor, display options, render generations, automatic
//!   re-render on store changes
//! - [`dispatch`] / [`CommandHandler`]: graph context commands
//! - [`ProvConfig`]: TOML configuration with `PROVLAB_*` overrides
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = SessionRegistry::new(ProvConfig::load("provlab.toml")?);
//! let session = registry.open("analysis.ipynb", persistence, services).await?;
//!
//! session.record(event).await;
//! let outcome = session.set_cursor(Cursor::new(0, 3)).await?;
//! let panel = dispatch(session.as_ref(), &command).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod commands;
mod config;
mod error;
mod registry;
mod session;

pub use commands::{dispatch, CommandHandler, DiffPanel, Panel};
pub use config::{ConfigError, ProvConfig};
pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{Session, SessionServices, SliderState, ViewOptions};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
