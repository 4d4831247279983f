//! Service layer: business logic between the web handlers and the stores
//! and supervisor.

pub mod auth;
pub mod channel;
pub mod settings;

pub use auth::{AuthService, Claims, TokenPair};
pub use channel::{BatchError, BatchResult, ChannelService};
pub use settings::{SettingsService, SettingsUpdate};
