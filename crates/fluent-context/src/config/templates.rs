//! C11 — Config Template Manager.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{json, Value};

use crate::config::schema::{self, RootConfig};
use crate::error::{CoreError, CoreResult};

/// Recursive mapping merge; non-mapping values overwrite. `overlay` wins.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, overlay_value) in overlay_map {
                let merged_value = match merged.get(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        (_, overlay_value) => overlay_value.clone(),
    }
}

const TEMPLATE_NAMES: &[&str] = &[
    "default", "small", "large", "web_frontend", "web_backend", "data_science", "cli_tool",
    "library", "python", "javascript", "typescript", "java", "csharp",
];

fn builtin_templates() -> HashMap<String, Value> {
    let default = serde_json::to_value(RootConfig::default()).unwrap();
    let mut templates = HashMap::new();

    templates.insert("default".to_string(), default.clone());
    templates.insert(
        "small".to_string(),
        json!({ "context_management": { "embedding": { "chunk_size": 800, "chunk_overlap": 150 } } }),
    );
    templates.insert(
        "large".to_string(),
        json!({ "context_management": { "embedding": { "chunk_size": 1500, "chunk_overlap": 300 } } }),
    );
    templates.insert(
        "web_frontend".to_string(),
        json!({ "context_management": { "importance_scoring": { "framework_weight": 1.2 } } }),
    );
    templates.insert(
        "web_backend".to_string(),
        json!({ "context_management": { "importance_scoring": { "code_weight": 1.2 } } }),
    );
    templates.insert(
        "data_science".to_string(),
        json!({ "context_management": { "summarization": { "threshold": 2000 } } }),
    );
    templates.insert(
        "cli_tool".to_string(),
        json!({ "context_management": { "embedding": { "chunk_size": 900 } } }),
    );
    templates.insert(
        "library".to_string(),
        json!({ "context_management": { "importance_scoring": { "metadata_weight": 0.8 } } }),
    );
    templates.insert(
        "python".to_string(),
        json!({ "context_management": { "embedding": { "chunk_size": 900 } } }),
    );
    templates.insert(
        "javascript".to_string(),
        json!({ "context_management": { "embedding": { "chunk_size": 1000 } } }),
    );
    templates.insert(
        "typescript".to_string(),
        json!({ "context_management": { "embedding": { "chunk_size": 1050 } } }),
    );
    templates.insert(
        "java".to_string(),
        json!({ "context_management": { "embedding": { "chunk_size": 1200 } } }),
    );
    templates.insert(
        "csharp".to_string(),
        json!({ "context_management": { "embedding": { "chunk_size": 1200 } } }),
    );

    templates
}

pub struct ConfigTemplateManager {
    templates: HashMap<String, Value>,
}

impl ConfigTemplateManager {
    pub fn new() -> Self {
        ConfigTemplateManager { templates: builtin_templates() }
    }

    pub fn get_default(&self) -> Value {
        self.templates["default"].clone()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.templates.get(name).cloned()
    }

    pub fn validate(&self, config: &Value) -> (bool, Vec<String>) {
        schema::validate(config)
    }

    /// Deep-merges the named templates in order, `default` first.
    pub fn merge(&self, names: &[&str]) -> Value {
        let mut merged = self.get_default();
        for name in names {
            if let Some(template) = self.templates.get(*name) {
                merged = deep_merge(&merged, template);
            }
        }
        merged
    }

    pub fn create_for(&self, size: &str, project_type: &str, language: &str) -> Value {
        let names: Vec<&str> = vec![size, project_type, language];
        self.merge(&names)
    }

    pub fn register(&mut self, name: &str, template: Value) -> CoreResult<()> {
        let candidate = deep_merge(&self.get_default(), &template);
        let (ok, errors) = self.validate(&candidate);
        if !ok {
            return Err(CoreError::ValidationFailed(errors));
        }
        self.templates.insert(name.to_string(), template);
        Ok(())
    }

    pub async fn load_from_file(&mut self, path: &Path) -> CoreResult<()> {
        let content = tokio::fs::read_to_string(path).await?;
        let value: Value = serde_json::from_str(&content)?;
        let obj = value.as_object().ok_or_else(|| CoreError::Internal("template file is not an object".to_string()))?;
        for (name, template) in obj {
            self.register(name, template.clone())?;
        }
        Ok(())
    }

    pub async fn save_to_file(&self, path: &Path) -> CoreResult<()> {
        let value = Value::Object(self.templates.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        let content = serde_json::to_string_pretty(&value)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn template_names(&self) -> &'static [&'static str] {
        TEMPLATE_NAMES
    }
}

impl Default for ConfigTemplateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overlays_default_first() {
        let mgr = ConfigTemplateManager::new();
        let merged = mgr.merge(&["small"]);
        assert_eq!(merged["context_management"]["embedding"]["chunk_size"], json!(800));
        let (ok, _) = mgr.validate(&merged);
        assert!(ok);
    }

    #[test]
    fn register_rejects_invalid_template() {
        let mut mgr = ConfigTemplateManager::new();
        let bad = json!({ "context_management": { "embedding": { "chunk_size": 1, "chunk_overlap": 0 } } });
        assert!(mgr.register("bad", bad).is_err());
    }
}
