//! Render mode resolution for one organization.
//!
//! Precedence: non-empty override > organization configuration > configured
//! default. The result is always normalized.

use std::sync::Arc;

use courier_core::ports::{RenderModeConfigStore, StoreResult};
use courier_core::types::{normalize_render_modes, OrganizationId, RenderMode};

pub struct RenderModeResolver {
    configs: Arc<dyn RenderModeConfigStore>,
    defaults: Vec<RenderMode>,
}

impl RenderModeResolver {
    /// `defaults` applies when neither an override nor a configuration row
    /// yields any mode. An empty `defaults` falls back to `[AGENTS_MD]`.
    pub fn new(configs: Arc<dyn RenderModeConfigStore>, defaults: Vec<RenderMode>) -> Self {
        let defaults = normalize_render_modes(defaults);
        let defaults = if defaults.is_empty() {
            vec![RenderMode::AgentsMd]
        } else {
            defaults
        };
        Self { configs, defaults }
    }

    pub async fn resolve(
        &self,
        organization: &OrganizationId,
        render_mode_override: Option<&[RenderMode]>,
    ) -> StoreResult<Vec<RenderMode>> {
        if let Some(modes) = render_mode_override.filter(|m| !m.is_empty()) {
            return Ok(normalize_render_modes(modes.iter().copied()));
        }

        if let Some(config) = self.configs.get(organization).await? {
            let modes = normalize_render_modes(config.active_render_modes);
            if !modes.is_empty() {
                return Ok(modes);
            }
        }

        tracing::debug!(organization = %organization, "no render mode configuration, using defaults");
        Ok(self.defaults.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::memory::MemoryStore;
    use courier_core::types::RenderModeConfiguration;

    fn org() -> OrganizationId {
        OrganizationId::from("acme")
    }

    async fn resolver_with(config: Option<Vec<RenderMode>>) -> RenderModeResolver {
        let store = Arc::new(MemoryStore::new());
        if let Some(modes) = config {
            store
                .put(RenderModeConfiguration::new(org(), modes))
                .await
                .unwrap();
        }
        RenderModeResolver::new(store, vec![RenderMode::AgentsMd])
    }

    #[tokio::test]
    async fn falls_back_to_default_without_config() {
        let resolver = resolver_with(None).await;
        assert_eq!(resolver.resolve(&org(), None).await.unwrap(), vec![RenderMode::AgentsMd]);
    }

    #[tokio::test]
    async fn configuration_is_used_and_normalized() {
        let resolver = resolver_with(Some(vec![RenderMode::Junie, RenderMode::Claude])).await;
        assert_eq!(
            resolver.resolve(&org(), None).await.unwrap(),
            vec![RenderMode::Claude, RenderMode::Junie]
        );
    }

    #[tokio::test]
    async fn empty_configuration_falls_back() {
        let resolver = resolver_with(Some(vec![])).await;
        assert_eq!(resolver.resolve(&org(), None).await.unwrap(), vec![RenderMode::AgentsMd]);
    }

    #[tokio::test]
    async fn non_empty_override_wins() {
        let resolver = resolver_with(Some(vec![RenderMode::Claude])).await;
        let modes = resolver
            .resolve(&org(), Some(&[RenderMode::Cursor, RenderMode::Packmind, RenderMode::Cursor]))
            .await
            .unwrap();
        assert_eq!(modes, vec![RenderMode::Packmind, RenderMode::Cursor]);
    }

    #[tokio::test]
    async fn empty_override_is_ignored() {
        let resolver = resolver_with(Some(vec![RenderMode::Claude])).await;
        assert_eq!(
            resolver.resolve(&org(), Some(&[])).await.unwrap(),
            vec![RenderMode::Claude]
        );
    }

    #[test]
    fn empty_defaults_become_agents_md() {
        let resolver = RenderModeResolver::new(Arc::new(MemoryStore::new()), vec![]);
        assert_eq!(resolver.defaults, vec![RenderMode::AgentsMd]);
    }
}
