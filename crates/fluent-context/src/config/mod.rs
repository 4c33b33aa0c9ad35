pub mod adaptive;
pub mod schema;
pub mod templates;

pub use adaptive::AdaptiveConfigManager;
pub use templates::ConfigTemplateManager;
