//! # Registry Manifest
//!
//! A YAML description of entity types for processes that host the mapper
//! without compiling the domain crates in, such as the admin API binary.
//!
//! ```yaml
//! entities:
//!   - name: vcs.Project
//!     table: projects
//!     fields:
//!       - { name: id, kind: text }
//!       - { name: name, kind: text }
//!       - { name: token, kind: text }
//!     primary_key: [id]
//!     id_strategy: uuid
//!     forms:
//!       - [id, name, token]
//!     encrypted:
//!       - { field: token, extras: [id] }
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::descriptor::{EntityDescriptor, FieldSpec, IdStrategy};
use crate::error::RegistryError;
use crate::registry::{Registry, RegistryBuilder};

/// A sealed field in a manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptedFieldManifest {
    /// Sealed field.
    pub field: String,
    /// Fields bound into the additional data.
    #[serde(default)]
    pub extras: Vec<String>,
}

/// One entity type in a manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityManifest {
    pub name: String,
    pub table: String,
    pub fields: Vec<FieldSpec>,
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub id_strategy: Option<IdStrategy>,
    #[serde(default)]
    pub modified_at: Option<String>,
    /// Newest first.
    #[serde(default)]
    pub forms: Vec<Vec<String>>,
    #[serde(default)]
    pub encrypted: Vec<EncryptedFieldManifest>,
}

impl EntityManifest {
    /// Validate into a descriptor.
    pub fn to_descriptor(&self) -> Result<EntityDescriptor, RegistryError> {
        let mut builder = EntityDescriptor::builder(self.name.clone(), self.table.clone());
        for field in &self.fields {
            builder = builder.field(field.name.clone(), field.kind);
        }
        builder = builder.primary_key(self.primary_key.iter().cloned());
        if let Some(strategy) = self.id_strategy {
            builder = builder.id_strategy(strategy);
        }
        if let Some(column) = &self.modified_at {
            builder = builder.modified_at(column.clone());
        }
        for form in &self.forms {
            builder = builder.form(form.iter().cloned());
        }
        for sealed in &self.encrypted {
            builder = builder.encrypt(sealed.field.clone(), sealed.extras.iter().cloned());
        }
        builder.build()
    }
}

/// A list of entity types.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryManifest {
    #[serde(default)]
    pub entities: Vec<EntityManifest>,
}

impl RegistryManifest {
    /// Parse a YAML manifest.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RegistryError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML manifest file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Validate every entry and build the registry.
    pub fn build(&self) -> Result<Arc<Registry>, RegistryError> {
        let mut builder = RegistryBuilder::new();
        for entity in &self.entities {
            builder.register(entity.to_descriptor()?)?;
        }
        let registry = builder.build();
        tracing::info!(entities = registry.len(), "registry manifest loaded");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::descriptor::FieldKind;

    const MANIFEST: &str = r#"
entities:
  - name: vcs.Project
    table: projects
    fields:
      - { name: id, kind: text }
      - { name: name, kind: text }
      - { name: token, kind: text }
      - { name: modified, kind: timestamp }
    primary_key: [id]
    id_strategy: uuid
    modified_at: modified
    forms:
      - [id, name, token, modified]
      - [id, name]
    encrypted:
      - { field: token, extras: [id] }
  - name: app.Tag
    table: tags
    fields:
      - { name: project, kind: text }
      - { name: label, kind: text }
    primary_key: [project, label]
"#;

    #[test]
    fn test_manifest_builds_registry() {
        let registry = RegistryManifest::from_yaml_str(MANIFEST).unwrap().build().unwrap();
        assert_eq!(registry.len(), 2);
        let project = registry.lookup("vcs.Project").unwrap();
        assert_eq!(project.id_strategy(), IdStrategy::Uuid);
        assert_eq!(project.modified_column(), Some("modified"));
        assert_eq!(project.forms().len(), 2);
        assert_eq!(project.forms()[1].fields().to_vec(), vec!["id", "name"]);
        assert_eq!(project.encrypted_field("token").unwrap().extras, vec!["id"]);
        assert_eq!(project.field("modified").unwrap().kind, FieldKind::Timestamp);
        assert!(!registry.lookup("app.Tag").unwrap().is_signed());
    }

    #[test]
    fn test_manifest_rejects_undeclared_form_field() {
        let yaml = r#"
entities:
  - name: a.B
    table: b
    fields: [{ name: id, kind: text }]
    primary_key: [id]
    forms: [[id, missing]]
"#;
        let err = RegistryManifest::from_yaml_str(yaml).unwrap().build().unwrap_err();
        assert!(matches!(err, RegistryError::UndeclaredField { .. }));
    }

    #[test]
    fn test_manifest_rejects_unknown_keys_and_kinds() {
        assert!(matches!(
            RegistryManifest::from_yaml_str("entities: []\nextra: 1\n"),
            Err(RegistryError::Parse(_))
        ));
        let yaml = "entities:\n  - name: a.B\n    table: b\n    fields: [{ name: id, kind: float }]\n    primary_key: [id]\n";
        assert!(matches!(RegistryManifest::from_yaml_str(yaml), Err(RegistryError::Parse(_))));
    }

    #[test]
    fn test_manifest_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();
        let manifest = RegistryManifest::from_path(file.path()).unwrap();
        assert_eq!(manifest.entities.len(), 2);
        assert!(matches!(
            RegistryManifest::from_path("/nonexistent/rowseal.yaml"),
            Err(RegistryError::Io(_))
        ));
    }
}
