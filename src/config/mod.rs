pub mod settings;

pub use settings::{AuthSettings, PolicySettings, ServerSettings, Settings, StorageSettings, WebhookSettings};
