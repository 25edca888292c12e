//! Template context: serializable rendering payload built from an [`ArtifactVersion`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courier_core::types::{ArtifactVersion, RenderMode};

use crate::error::RenderError;

/// Payload handed to every template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionContext {
    pub artifact: ArtifactCtx,
    /// Upper-snake render mode name.
    pub mode: String,
    pub meta: MetaCtx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactCtx {
    pub id: String,
    pub slug: String,
    pub name: String,
    /// `recipe` or `standard`.
    pub kind: String,
    pub version: u32,
    /// Body with CRLF normalized and trailing whitespace removed.
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaCtx {
    pub courier_version: String,
}

impl SectionContext {
    pub fn new(version: &ArtifactVersion, mode: RenderMode) -> Self {
        SectionContext {
            artifact: ArtifactCtx {
                id: version.id.to_string(),
                slug: version.slug.clone(),
                name: version.name.clone(),
                kind: version.kind.to_string(),
                version: version.version,
                content: normalize_line_endings(&version.content).trim_end().to_string(),
                created_at: version.created_at,
            },
            mode: mode.to_string(),
            meta: MetaCtx {
                courier_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        Ok(tera::Context::from_serialize(self)?)
    }
}

pub(crate) fn normalize_line_endings(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::{ArtifactId, ArtifactKind, ArtifactVersionId, OrganizationId};

    #[test]
    fn content_is_normalized() {
        let version = ArtifactVersion {
            id: ArtifactVersionId::from("foo-v1"),
            artifact_id: ArtifactId::from("foo"),
            organization_id: OrganizationId::from("acme"),
            kind: ArtifactKind::Standard,
            slug: "foo".into(),
            name: "Foo".into(),
            version: 1,
            content: "line one\r\nline two\r\n\n".into(),
            created_at: Utc::now(),
        };
        let ctx = SectionContext::new(&version, RenderMode::Claude);
        assert_eq!(ctx.artifact.content, "line one\nline two");
        assert_eq!(ctx.artifact.kind, "standard");
        assert_eq!(ctx.mode, "CLAUDE");
        assert!(ctx.to_tera_context().is_ok());
    }
}
