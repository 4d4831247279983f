//! Domain models shared across the stores, the supervisor and the web layer

pub mod channel;
pub mod settings;
pub mod system;
pub mod transcoder;
pub mod user;

pub use channel::{Channel, ChannelStatus, LogoConfig, OutputConfig};
pub use settings::Settings;
pub use system::{GpuInfo, SystemInfo};
pub use transcoder::{ProgressMetrics, TranscoderMetrics};
pub use user::{User, UserRole};
