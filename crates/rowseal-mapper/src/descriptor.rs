//! # Entity Descriptors
//!
//! An [`EntityDescriptor`] is the security metadata of one persisted type:
//! its declared fields, primary key, identifier strategy, canonical forms
//! and sealed fields. Descriptors are assembled with a
//! [`DescriptorBuilder`]; `build()` validates every cross-reference, so a
//! descriptor that exists is internally consistent.
//!
//! ```ignore
//! let descriptor = EntityDescriptor::builder("vcs.Project", "vcs_projects")
//!     .field("id", FieldKind::Text)
//!     .field("name", FieldKind::Text)
//!     .field("token", FieldKind::Text)
//!     .primary_key(["id"])
//!     .form(["id", "name", "token"])
//!     .encrypt("token", ["id"])
//!     .build()?;
//! ```

use rowseal_core::{sha256_content, EntityName, FormId};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Storage kind of a declared field. Drives canonical rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// UTF-8 string.
    Text,
    /// Signed or unsigned integer.
    Integer,
    /// `true` / `false`.
    Boolean,
    /// RFC 3339 UTC timestamp, second precision.
    Timestamp,
    /// Arbitrary JSON without floats.
    Json,
    /// Opaque bytes (base64 string or byte array). Signed by content hash.
    Blob,
}

/// One entry of the declared field table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Payload key.
    pub name: String,
    /// Storage kind.
    pub kind: FieldKind,
}

/// How primary keys are produced on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// A random UUID v4 is assigned when the key column is empty.
    Uuid,
    /// The caller supplies every key column.
    Provided,
}

/// An ordered list of fields whose rendered values are signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalForm {
    id: FormId,
    fields: Vec<String>,
}

impl CanonicalForm {
    fn new(fields: Vec<String>) -> Result<Self, rowseal_core::CoreError> {
        // Field names are plain identifiers, so the comma join is unambiguous.
        let id = FormId::from_hex(sha256_content(fields.join(",").as_bytes()).to_hex())?;
        Ok(Self { id, fields })
    }

    /// Stable identifier: SHA-256 of the field list.
    pub fn id(&self) -> &FormId {
        &self.id
    }

    /// Fields in signing order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// A sealed field and the fields bound into its additional data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncryptedField {
    /// Sealed payload key.
    pub name: String,
    /// Plain fields whose values are bound to the ciphertext, typically the
    /// primary key, so a sealed value cannot be moved to another row.
    pub extras: Vec<String>,
}

/// Validated security metadata of one entity type.
#[derive(Debug, Clone, Serialize)]
pub struct EntityDescriptor {
    name: EntityName,
    table: String,
    fields: Vec<FieldSpec>,
    primary_key: Vec<String>,
    id_strategy: IdStrategy,
    modified: Option<String>,
    signed: bool,
    forms: Vec<CanonicalForm>,
    encrypted_fields: Vec<EncryptedField>,
}

impl EntityDescriptor {
    /// Start describing the entity `name` stored in `table`.
    pub fn builder(name: impl Into<String>, table: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder {
            name: name.into(),
            table: table.into(),
            fields: Vec::new(),
            primary_key: Vec::new(),
            id_strategy: IdStrategy::Provided,
            modified: None,
            forms: Vec::new(),
            encrypted_fields: Vec::new(),
        }
    }

    /// Entity type identifier.
    pub fn name(&self) -> &EntityName {
        &self.name
    }

    /// Storage table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Declared field table.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Look up a declared field.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Primary-key columns in rendering order.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Identifier strategy.
    pub fn id_strategy(&self) -> IdStrategy {
        self.id_strategy
    }

    /// Modification-time column, stamped on insert and update.
    pub fn modified_column(&self) -> Option<&str> {
        self.modified.as_deref()
    }

    /// True if tuples carry a signature.
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// True if some fields are sealed.
    pub fn is_encrypted(&self) -> bool {
        !self.encrypted_fields.is_empty()
    }

    /// Canonical forms, newest first.
    pub fn forms(&self) -> &[CanonicalForm] {
        &self.forms
    }

    /// The form used for new signatures.
    pub fn latest_form(&self) -> Option<&CanonicalForm> {
        self.forms.first()
    }

    /// Find a form by identifier.
    pub fn form(&self, id: &FormId) -> Option<&CanonicalForm> {
        self.forms.iter().find(|f| &f.id == id)
    }

    /// Sealed fields.
    pub fn encrypted_fields(&self) -> &[EncryptedField] {
        &self.encrypted_fields
    }

    /// Look up a sealed field.
    pub fn encrypted_field(&self, name: &str) -> Option<&EncryptedField> {
        self.encrypted_fields.iter().find(|f| f.name == name)
    }
}

/// Assembles an [`EntityDescriptor`].
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    name: String,
    table: String,
    fields: Vec<FieldSpec>,
    primary_key: Vec<String>,
    id_strategy: IdStrategy,
    modified: Option<String>,
    forms: Vec<Vec<String>>,
    encrypted_fields: Vec<EncryptedField>,
}

impl DescriptorBuilder {
    /// Declare a field.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
        });
        self
    }

    /// Set the primary-key columns.
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the identifier strategy. Defaults to [`IdStrategy::Provided`].
    pub fn id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    /// Declare the modification-time column.
    pub fn modified_at(mut self, column: impl Into<String>) -> Self {
        self.modified = Some(column.into());
        self
    }

    /// Add a canonical form. The first form added is the newest; add
    /// older forms after it so existing rows keep verifying.
    pub fn form<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forms.push(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Seal `field`, binding the values of `extras` into its additional data.
    pub fn encrypt<I, S>(mut self, field: impl Into<String>, extras: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.encrypted_fields.push(EncryptedField {
            name: field.into(),
            extras: extras.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Validate and freeze the descriptor.
    pub fn build(self) -> Result<EntityDescriptor, RegistryError> {
        let name = EntityName::new(self.name.as_str())?;
        let entity = self.name;

        if !is_plain_identifier(&self.table) {
            return Err(RegistryError::InvalidTable {
                entity,
                table: self.table,
            });
        }

        for (i, field) in self.fields.iter().enumerate() {
            if !is_plain_identifier(&field.name) {
                return Err(RegistryError::InvalidFieldName {
                    entity,
                    field: field.name.clone(),
                });
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(RegistryError::DuplicateField {
                    entity,
                    field: field.name.clone(),
                });
            }
        }

        let declared = |role: &'static str, field: &str| -> Result<(), RegistryError> {
            if self.fields.iter().any(|f| f.name == field) {
                Ok(())
            } else {
                Err(RegistryError::UndeclaredField {
                    entity: entity.clone(),
                    role,
                    field: field.to_string(),
                })
            }
        };

        if self.primary_key.is_empty() {
            return Err(RegistryError::Inconsistent {
                entity,
                reason: "no primary key columns".into(),
            });
        }
        for column in &self.primary_key {
            declared("primary key", column)?;
        }
        if self.id_strategy == IdStrategy::Uuid && self.primary_key.len() != 1 {
            return Err(RegistryError::Inconsistent {
                entity,
                reason: "uuid identifier strategy requires a single primary key column".into(),
            });
        }

        if let Some(column) = &self.modified {
            declared("modification column", column)?;
            if self.fields.iter().any(|f| &f.name == column && f.kind != FieldKind::Timestamp) {
                return Err(RegistryError::Inconsistent {
                    entity,
                    reason: format!("modification column {column:?} must be a timestamp"),
                });
            }
        }

        for form in &self.forms {
            if form.is_empty() {
                return Err(RegistryError::Inconsistent {
                    entity,
                    reason: "canonical form has no fields".into(),
                });
            }
            for field in form {
                declared("form", field)?;
            }
        }

        for (i, sealed) in self.encrypted_fields.iter().enumerate() {
            declared("encrypted field", &sealed.name)?;
            if self.encrypted_fields[..i].iter().any(|f| f.name == sealed.name) {
                return Err(RegistryError::DuplicateField {
                    entity,
                    field: sealed.name.clone(),
                });
            }
            if self.primary_key.contains(&sealed.name) {
                return Err(RegistryError::Inconsistent {
                    entity,
                    reason: format!("primary key column {:?} cannot be encrypted", sealed.name),
                });
            }
            for extra in &sealed.extras {
                declared("encryption extras", extra)?;
                if self.encrypted_fields.iter().any(|f| &f.name == extra) {
                    return Err(RegistryError::Inconsistent {
                        entity,
                        reason: format!("encryption extras of {:?} reference sealed field {extra:?}", sealed.name),
                    });
                }
            }
        }

        let forms = self
            .forms
            .into_iter()
            .map(CanonicalForm::new)
            .collect::<Result<Vec<_>, _>>()?;
        for (i, form) in forms.iter().enumerate() {
            if forms[..i].iter().any(|f| f.id == form.id) {
                return Err(RegistryError::Inconsistent {
                    entity,
                    reason: format!("canonical form {} is declared twice", form.id.short()),
                });
            }
        }

        Ok(EntityDescriptor {
            name,
            table: self.table,
            signed: !forms.is_empty(),
            fields: self.fields,
            primary_key: self.primary_key,
            id_strategy: self.id_strategy,
            modified: self.modified,
            forms,
            encrypted_fields: self.encrypted_fields,
        })
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes (PostgreSQL's limit).
pub(crate) fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    s.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> DescriptorBuilder {
        EntityDescriptor::builder("vcs.Project", "vcs_projects")
            .field("id", FieldKind::Text)
            .field("name", FieldKind::Text)
            .field("token", FieldKind::Text)
            .field("modified", FieldKind::Timestamp)
            .primary_key(["id"])
            .id_strategy(IdStrategy::Uuid)
            .modified_at("modified")
    }

    #[test]
    fn test_build_valid_descriptor() {
        let d = project()
            .form(["id", "name", "token"])
            .form(["id", "name"])
            .encrypt("token", ["id"])
            .build()
            .unwrap();
        assert_eq!(d.name().as_str(), "vcs.Project");
        assert!(d.is_signed());
        assert!(d.is_encrypted());
        assert_eq!(d.forms().len(), 2);
        assert_eq!(d.latest_form().unwrap().fields(), ["id", "name", "token"]);
        assert_ne!(d.forms()[0].id(), d.forms()[1].id());
        assert_eq!(d.form(d.forms()[1].id()).unwrap().fields(), ["id", "name"]);
    }

    #[test]
    fn test_form_id_depends_only_on_field_list() {
        let a = project().form(["id", "name"]).build().unwrap();
        let b = EntityDescriptor::builder("other", "other")
            .field("id", FieldKind::Text)
            .field("name", FieldKind::Text)
            .primary_key(["id"])
            .form(["id", "name"])
            .build()
            .unwrap();
        assert_eq!(a.forms()[0].id(), b.forms()[0].id());
        let c = project().form(["name", "id"]).build().unwrap();
        assert_ne!(a.forms()[0].id(), c.forms()[0].id());
    }

    #[test]
    fn test_unsigned_without_forms() {
        let d = project().build().unwrap();
        assert!(!d.is_signed());
        assert!(d.latest_form().is_none());
    }

    #[test]
    fn test_undeclared_references_rejected() {
        assert!(matches!(
            project().form(["id", "nope"]).build(),
            Err(RegistryError::UndeclaredField { role: "form", .. })
        ));
        assert!(matches!(
            project().encrypt("secret", ["id"]).build(),
            Err(RegistryError::UndeclaredField { role: "encrypted field", .. })
        ));
        assert!(matches!(
            project().encrypt("token", ["tenant"]).build(),
            Err(RegistryError::UndeclaredField { role: "encryption extras", .. })
        ));
        assert!(matches!(
            project().primary_key(["pk"]).build(),
            Err(RegistryError::UndeclaredField { role: "primary key", .. })
        ));
        assert!(matches!(
            project().modified_at("updated").build(),
            Err(RegistryError::UndeclaredField { role: "modification column", .. })
        ));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let bad_table = EntityDescriptor::builder("x", "x; DROP TABLE y")
            .field("id", FieldKind::Text)
            .primary_key(["id"])
            .build();
        assert!(matches!(bad_table, Err(RegistryError::InvalidTable { .. })));

        let bad_entity = EntityDescriptor::builder("x y", "x")
            .field("id", FieldKind::Text)
            .primary_key(["id"])
            .build();
        assert!(matches!(bad_entity, Err(RegistryError::InvalidName(_))));

        let bad_field = EntityDescriptor::builder("x", "x")
            .field("a,b", FieldKind::Text)
            .primary_key(["a,b"])
            .build();
        assert!(matches!(bad_field, Err(RegistryError::InvalidFieldName { .. })));
    }

    #[test]
    fn test_inconsistencies_rejected() {
        assert!(matches!(
            project().field("name", FieldKind::Integer).build(),
            Err(RegistryError::DuplicateField { .. })
        ));
        assert!(matches!(
            project().encrypt("id", Vec::<String>::new()).build(),
            Err(RegistryError::Inconsistent { .. })
        ));
        assert!(matches!(
            project().form(["id"]).form(["id"]).build(),
            Err(RegistryError::Inconsistent { .. })
        ));
        assert!(matches!(
            project().modified_at("name").build(),
            Err(RegistryError::Inconsistent { .. })
        ));
        assert!(matches!(
            project().primary_key(["id", "name"]).build(),
            Err(RegistryError::Inconsistent { .. })
        ));
    }

    #[test]
    fn test_plain_identifier() {
        assert!(is_plain_identifier("vcs_projects"));
        assert!(is_plain_identifier("_t1"));
        assert!(!is_plain_identifier("1t"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("a-b"));
        assert!(!is_plain_identifier(&"a".repeat(64)));
    }
}
