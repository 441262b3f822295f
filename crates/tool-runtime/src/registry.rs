use std::collections::HashMap;
use std::sync::Arc;

use immo_core::Scope;

use crate::tool::{Tool, ToolDefinition};
use crate::tools;

/// Catalogue of capabilities offered to the model, partitioned by
/// privilege scope. Dispatch is a name lookup; unknown names fail
/// closed. Thread-safe via Arc wrapping of individual tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// The registry matching a session's privilege tier. Registry
    /// selection is convenience only; every executor re-verifies the
    /// caller's scope itself.
    pub fn for_scope(scope: Scope) -> Result<Self, RegistryError> {
        match scope {
            Scope::Standard => Self::standard(),
            Scope::Admin => Self::admin(),
        }
    }

    /// Tools limited to the calling principal's own data.
    pub fn standard() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(tools::PortfolioSummaryTool)?;
        registry.register(tools::PropertyLookupTool)?;
        registry.register(tools::DocumentSearchTool)?;
        registry.register(tools::DocumentReadTool)?;
        registry.register(tools::OfferListTool)?;
        registry.register(tools::SendMessageTool)?;
        Ok(registry)
    }

    /// Superset of the standard registry with cross-principal tools.
    pub fn admin() -> Result<Self, RegistryError> {
        let mut registry = Self::standard()?;
        registry.register(tools::ClientLookupTool)?;
        registry.register(tools::ClientStatusTool)?;
        registry.register(tools::NotificationCreateTool)?;
        registry.register(tools::SendEmailTool)?;
        registry.register(tools::ReportSaveTool)?;
        Ok(registry)
    }

    /// Register a tool. Returns error if name already registered.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        let def = tool.definition();
        if self.tools.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        self.tools.insert(def.name, Arc::new(tool));
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Whether a tool requires operator approval. `None` for unknown
    /// tool names.
    pub fn needs_approval(&self, name: &str) -> Option<bool> {
        self.tools.get(name).map(|t| t.definition().needs_approval)
    }

    /// List all registered tool definitions (for sending to the LLM).
    pub fn list(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool with name '{0}' is already registered")]
    DuplicateName(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::testing::CountingTool;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(CountingTool::new("echo", false)).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.needs_approval("echo"), Some(false));
        assert_eq!(registry.needs_approval("nonexistent"), None);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = ToolRegistry::new();
        registry.register(CountingTool::new("echo", false)).unwrap();
        assert!(registry.register(CountingTool::new("echo", true)).is_err());
    }

    #[test]
    fn test_admin_is_superset_of_standard() {
        let standard = ToolRegistry::standard().unwrap();
        let admin = ToolRegistry::admin().unwrap();

        assert!(admin.len() > standard.len());
        for def in standard.list() {
            assert!(admin.get(&def.name).is_some(), "missing {}", def.name);
        }
        // Admin-only tools stay out of the standard registry.
        assert!(standard.get("client_status_change").is_none());
        assert!(standard.get("send_email").is_none());
    }

    #[test]
    fn test_mutating_tools_are_approval_gated() {
        let admin = ToolRegistry::admin().unwrap();
        for name in [
            "send_message",
            "send_email",
            "notification_create",
            "client_status_change",
            "report_save",
        ] {
            assert_eq!(admin.needs_approval(name), Some(true), "{name}");
        }
        for name in [
            "portfolio_summary",
            "property_lookup",
            "document_search",
            "document_read",
            "offer_list",
            "client_lookup",
        ] {
            assert_eq!(admin.needs_approval(name), Some(false), "{name}");
        }
    }
}
