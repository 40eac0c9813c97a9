pub mod audit;
pub mod dialog;
pub mod files;
pub mod manager;
pub mod record;
pub mod secrets;

// Re-export key types
pub use audit::{AuditLog, LogLevel};
pub use dialog::{ChoiceItem, Dialog, DialogError};
pub use files::Ownership;
pub use manager::{AgentConfigManager, Outcome};
pub use record::{AgentConfiguration, Frequency, TimeUnit};
pub use secrets::{Ciphertext, Passphrase};
