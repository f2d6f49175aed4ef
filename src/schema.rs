//! Vault categories, per-category field schemas, and the schema registry.
//!
//! Schemas are pure data. Extraction and validation stay category-agnostic;
//! adding a vault type means registering another `VaultSchema`, never
//! touching the workflow.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

// ── Vault category ──────────────────────────────────────────────────

/// The closed set of vault record classes an email can be filed under.
///
/// `Unknown` is a valid terminal classification, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultCategory {
    Healthcare,
    Financial,
    Communications,
    Legal,
    PersonalInfo,
    DigitalAccounts,
    KeyMasterDirectives,
    EndOfLife,
    Unknown,
}

impl VaultCategory {
    /// Every category except `Unknown`, in classification-menu order.
    pub const KNOWN: [VaultCategory; 8] = [
        Self::Healthcare,
        Self::Financial,
        Self::Communications,
        Self::Legal,
        Self::PersonalInfo,
        Self::DigitalAccounts,
        Self::KeyMasterDirectives,
        Self::EndOfLife,
    ];

    /// The categories carrying a built-in field schema. The rest file
    /// under the open degenerate schema.
    pub const REGISTERED: [VaultCategory; 5] = [
        Self::Healthcare,
        Self::Financial,
        Self::Communications,
        Self::Legal,
        Self::PersonalInfo,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Healthcare => "healthcare",
            Self::Financial => "financial",
            Self::Communications => "communications",
            Self::Legal => "legal",
            Self::PersonalInfo => "personal_info",
            Self::DigitalAccounts => "digital_accounts",
            Self::KeyMasterDirectives => "key_master_directives",
            Self::EndOfLife => "end_of_life",
            Self::Unknown => "unknown",
        }
    }

    /// Map a model-produced label onto a category. Unrecognized labels
    /// collapse to `Unknown` rather than erroring.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "healthcare" | "medical" | "health" => Self::Healthcare,
            "financial" | "finance" => Self::Financial,
            "communications" | "comms" | "personal_correspondence" => Self::Communications,
            "legal" => Self::Legal,
            "personal_info" | "personal" => Self::PersonalInfo,
            "digital_accounts" | "accounts" => Self::DigitalAccounts,
            "key_master_directives" | "directives" => Self::KeyMasterDirectives,
            "end_of_life" => Self::EndOfLife,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for VaultCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Field shapes ────────────────────────────────────────────────────

/// Expected JSON shape of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldShape {
    /// String, number, or boolean.
    Scalar,
    /// JSON array (elements may be nested objects).
    List,
    /// JSON object.
    Object,
}

impl FieldShape {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::List => "list",
            Self::Object => "object",
        }
    }

    /// Does a JSON value satisfy this shape? `Null` never matches — the
    /// validator treats null as absent.
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            Self::List => value.is_array(),
            Self::Object => value.is_object(),
            Self::Scalar => {
                value.is_string() || value.is_number() || value.is_boolean()
            }
        }
    }
}

/// Declared expectations for one schema field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub shape: FieldShape,
    pub required: bool,
    /// One-line description rendered into extraction prompts.
    pub description: &'static str,
}

// ── Vault schema ────────────────────────────────────────────────────

/// Per-category field schema — a mapping from field name to expected
/// shape and optionality. Immutable once built.
#[derive(Debug, Clone)]
pub struct VaultSchema {
    category: VaultCategory,
    version: u32,
    fields: BTreeMap<&'static str, FieldSpec>,
    /// Open schemas (the degenerate `Unknown` schema) accept any field.
    open: bool,
}

impl VaultSchema {
    pub fn new(category: VaultCategory, version: u32) -> Self {
        Self {
            category,
            version,
            fields: BTreeMap::new(),
            open: false,
        }
    }

    /// The degenerate schema: no declared fields, all output accepted,
    /// nothing required. Used for `Unknown` and unregistered categories.
    pub fn degenerate() -> Self {
        Self {
            category: VaultCategory::Unknown,
            version: 1,
            fields: BTreeMap::new(),
            open: true,
        }
    }

    pub fn field(
        mut self,
        name: &'static str,
        shape: FieldShape,
        required: bool,
        description: &'static str,
    ) -> Self {
        self.fields.insert(
            name,
            FieldSpec {
                shape,
                required,
                description,
            },
        );
        self
    }

    pub fn category(&self) -> VaultCategory {
        self.category
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Declared fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (*name, spec))
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Drop raw extraction output down to declared fields. Model
    /// over-generation is discarded silently; an open schema keeps
    /// everything.
    pub fn retain_declared(
        &self,
        mut raw: serde_json::Map<String, serde_json::Value>,
    ) -> serde_json::Map<String, serde_json::Value> {
        if self.open {
            return raw;
        }
        raw.retain(|key, _| self.fields.contains_key(key.as_str()));
        raw
    }

    /// Render the schema as the field contract embedded in extraction
    /// prompts.
    pub fn prompt_definition(&self) -> String {
        if self.open {
            return "Return a JSON object with whatever relevant fields the email \
                    contains. Extract only information present in the email."
                .to_string();
        }
        let mut out = format!(
            "The {} vault expects a JSON object with these fields:\n",
            self.category.label()
        );
        for (name, spec) in self.fields() {
            out.push_str(&format!(
                "- \"{}\" ({}, {}): {}\n",
                name,
                spec.shape.name(),
                if spec.required { "required" } else { "optional" },
                spec.description,
            ));
        }
        out.push_str(
            "Omit optional fields that do not apply. Extract only information \
             present in the email.",
        );
        out
    }
}

// ── Schema registry ─────────────────────────────────────────────────

/// Process-wide read-only registry, built once at startup.
pub struct SchemaRegistry {
    schemas: BTreeMap<VaultCategory, VaultSchema>,
    degenerate: VaultSchema,
}

impl SchemaRegistry {
    /// Registry holding the built-in schema set.
    pub fn builtin() -> Self {
        Self::with_schemas(vec![
            healthcare_schema(),
            financial_schema(),
            communications_schema(),
            legal_schema(),
            personal_info_schema(),
        ])
    }

    /// Registry over an explicit schema set. New vault types are added
    /// here — no workflow or validator change required.
    pub fn with_schemas(schemas: Vec<VaultSchema>) -> Self {
        Self {
            schemas: schemas
                .into_iter()
                .map(|schema| (schema.category(), schema))
                .collect(),
            degenerate: VaultSchema::degenerate(),
        }
    }

    /// Look up the schema for a category.
    pub fn resolve(&self, category: VaultCategory) -> Result<&VaultSchema, SchemaError> {
        self.schemas
            .get(&category)
            .ok_or(SchemaError::UnknownCategory { category })
    }

    /// Look up a schema, falling back to the degenerate all-optional
    /// schema for `Unknown` or anything unregistered. The resolution
    /// error rides along for non-`Unknown` misses so callers can record
    /// that the data went in unvalidated; `Unknown` is the expected
    /// route onto the open schema, not an error.
    pub fn resolve_or_degenerate(
        &self,
        category: VaultCategory,
    ) -> (&VaultSchema, Option<SchemaError>) {
        match self.resolve(category) {
            Ok(schema) => (schema, None),
            Err(e) => {
                let miss = (category != VaultCategory::Unknown).then_some(e);
                (&self.degenerate, miss)
            }
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = VaultCategory> + '_ {
        self.schemas.keys().copied()
    }
}

// ── Built-in schemas ────────────────────────────────────────────────

fn healthcare_schema() -> VaultSchema {
    use FieldShape::*;
    VaultSchema::new(VaultCategory::Healthcare, 1)
        .field(
            "appointments",
            List,
            false,
            "Medical appointments, consultations, or scheduled visits",
        )
        .field(
            "test_results",
            List,
            false,
            "Lab results, test reports, diagnostic results",
        )
        .field(
            "prescriptions",
            List,
            false,
            "Prescriptions, medications, or pharmacy information",
        )
        .field(
            "providers",
            List,
            false,
            "Healthcare providers, doctors, specialists, or facilities",
        )
        .field(
            "insurance",
            Object,
            false,
            "Insurance claims, coverage information, or policy details",
        )
        .field(
            "medical_records",
            List,
            false,
            "Medical records, reports, or documents referenced in the email",
        )
        .field(
            "bills",
            List,
            false,
            "Medical bills, invoices, or payment information",
        )
        .field(
            "conditions",
            List,
            false,
            "Health conditions, diagnoses, or medical issues mentioned",
        )
        .field(
            "notes",
            Scalar,
            false,
            "Additional healthcare-related notes",
        )
}

fn financial_schema() -> VaultSchema {
    use FieldShape::*;
    VaultSchema::new(VaultCategory::Financial, 1)
        .field(
            "accounts",
            List,
            false,
            "Bank, brokerage, or credit accounts referenced",
        )
        .field(
            "bills",
            List,
            false,
            "Bills and invoices with amount, due date, and vendor",
        )
        .field(
            "transactions",
            List,
            false,
            "Payments, transfers, or charges described in the email",
        )
        .field(
            "statements",
            List,
            false,
            "Account statements or balance summaries",
        )
        .field(
            "notes",
            Scalar,
            false,
            "Additional financial notes",
        )
}

fn communications_schema() -> VaultSchema {
    use FieldShape::*;
    VaultSchema::new(VaultCategory::Communications, 1)
        .field(
            "contacts",
            List,
            false,
            "People or organizations involved in the correspondence",
        )
        .field(
            "topics",
            List,
            false,
            "Subjects discussed in the conversation",
        )
        .field(
            "follow_ups",
            List,
            false,
            "Commitments or follow-up items mentioned",
        )
        .field(
            "summary",
            Scalar,
            false,
            "One-paragraph summary of the correspondence",
        )
}

fn legal_schema() -> VaultSchema {
    use FieldShape::*;
    VaultSchema::new(VaultCategory::Legal, 1)
        .field(
            "documents",
            List,
            false,
            "Contracts, deeds, wills, or legal notices referenced",
        )
        .field(
            "parties",
            List,
            false,
            "People, firms, or institutions party to the matter",
        )
        .field(
            "deadlines",
            List,
            false,
            "Filing deadlines, court dates, or response windows",
        )
        .field(
            "notes",
            Scalar,
            false,
            "Additional legal notes",
        )
}

fn personal_info_schema() -> VaultSchema {
    use FieldShape::*;
    VaultSchema::new(VaultCategory::PersonalInfo, 1)
        .field(
            "identity",
            Object,
            true,
            "Whose personal information this email concerns",
        )
        .field(
            "documents",
            List,
            false,
            "IDs, certificates, or records referenced",
        )
        .field(
            "addresses",
            List,
            false,
            "Physical or mailing addresses mentioned",
        )
        .field(
            "notes",
            Scalar,
            false,
            "Additional personal-information notes",
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn category_labels_round_trip() {
        for category in VaultCategory::KNOWN {
            assert_eq!(VaultCategory::from_label(category.label()), category);
        }
    }

    #[test]
    fn unrecognized_label_is_unknown() {
        assert_eq!(VaultCategory::from_label("pets"), VaultCategory::Unknown);
        assert_eq!(VaultCategory::from_label(""), VaultCategory::Unknown);
    }

    #[test]
    fn label_aliases_map() {
        assert_eq!(
            VaultCategory::from_label("Medical"),
            VaultCategory::Healthcare
        );
        assert_eq!(VaultCategory::from_label("comms"), VaultCategory::Communications);
    }

    #[test]
    fn category_serde_is_snake_case() {
        let json = serde_json::to_string(&VaultCategory::PersonalInfo).unwrap();
        assert_eq!(json, "\"personal_info\"");
    }

    #[test]
    fn field_shape_matching() {
        assert!(FieldShape::List.matches(&json!([1, 2])));
        assert!(!FieldShape::List.matches(&json!({"a": 1})));
        assert!(FieldShape::Object.matches(&json!({"a": 1})));
        assert!(FieldShape::Scalar.matches(&json!("text")));
        assert!(FieldShape::Scalar.matches(&json!(3.5)));
        assert!(FieldShape::Scalar.matches(&json!(true)));
        assert!(!FieldShape::Scalar.matches(&json!([1])));
        // Null never matches any shape
        assert!(!FieldShape::Scalar.matches(&serde_json::Value::Null));
        assert!(!FieldShape::List.matches(&serde_json::Value::Null));
    }

    #[test]
    fn registry_resolves_builtin_categories() {
        let registry = SchemaRegistry::builtin();
        for category in VaultCategory::REGISTERED {
            let schema = registry.resolve(category).unwrap();
            assert_eq!(schema.category(), category);
        }
    }

    #[test]
    fn registry_unknown_category_errors() {
        let registry = SchemaRegistry::builtin();
        assert!(matches!(
            registry.resolve(VaultCategory::Unknown),
            Err(SchemaError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn registry_falls_back_to_degenerate() {
        let registry = SchemaRegistry::builtin();
        let (schema, miss) = registry.resolve_or_degenerate(VaultCategory::Unknown);
        assert!(schema.is_open());
        assert_eq!(schema.fields().count(), 0);
        // Unknown is the expected route onto the open schema
        assert!(miss.is_none());
    }

    #[test]
    fn schemaless_categories_use_open_schema_and_report_the_miss() {
        let registry = SchemaRegistry::builtin();
        for category in [
            VaultCategory::DigitalAccounts,
            VaultCategory::KeyMasterDirectives,
            VaultCategory::EndOfLife,
        ] {
            let (schema, miss) = registry.resolve_or_degenerate(category);
            assert!(schema.is_open());
            assert!(matches!(miss, Some(SchemaError::UnknownCategory { .. })));
        }
    }

    #[test]
    fn retain_declared_drops_extra_fields() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.resolve(VaultCategory::Healthcare).unwrap();
        let raw = json!({
            "appointments": [{"date": "2026-01-15"}],
            "hallucinated": "extra model output"
        });
        let kept = schema.retain_declared(raw.as_object().unwrap().clone());
        assert!(kept.contains_key("appointments"));
        assert!(!kept.contains_key("hallucinated"));
    }

    #[test]
    fn open_schema_keeps_everything() {
        let schema = VaultSchema::degenerate();
        let raw = json!({"anything": 1, "goes": [2]});
        let kept = schema.retain_declared(raw.as_object().unwrap().clone());
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn prompt_definition_lists_fields() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.resolve(VaultCategory::Healthcare).unwrap();
        let prompt = schema.prompt_definition();
        assert!(prompt.contains("\"appointments\" (list, optional)"));
        assert!(prompt.contains("\"insurance\" (object, optional)"));
        assert!(prompt.contains("healthcare vault"));
    }

    #[test]
    fn prompt_definition_marks_required_fields() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.resolve(VaultCategory::PersonalInfo).unwrap();
        assert!(schema.prompt_definition().contains("\"identity\" (object, required)"));
    }

    #[test]
    fn new_category_is_pure_registration() {
        // Open/closed check: a registry extended with a brand-new schema
        // resolves it without any other code change.
        let mut schemas = vec![healthcare_schema()];
        schemas.push(
            VaultSchema::new(VaultCategory::Legal, 3)
                .field("documents", FieldShape::List, true, "Docs"),
        );
        let registry = SchemaRegistry::with_schemas(schemas);
        let schema = registry.resolve(VaultCategory::Legal).unwrap();
        assert_eq!(schema.version(), 3);
        assert!(schema.get("documents").unwrap().required);
    }
}
