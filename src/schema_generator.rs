use crate::observation::PropertyPathMap;
use crate::rules::RuleSet;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

/// Path segment that stands for "every element of an array".
pub const ARRAY_SEGMENT: &str = "*";

/// OpenAPI primitive type names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

/// A `min`/`max` value taken from a rule.
///
/// Lengths of strings and arrays are whole numbers; numeric magnitudes keep
/// their fractional part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bound {
    Integer(i64),
    Float(f64),
}

/// A JSON-Schema fragment. Every node is exactly one kind and owns its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Schema {
    Array(ArraySchema),
    Object(ObjectSchema),
    Scalar(ScalarSchema),
}

/// Leaf schema: a type plus the metadata the rules or example carried
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalarSchema {
    /// Absent for example values that were `null`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Lower bound of the `min:` rule; a length for strings and arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Bound>,
    /// Upper bound of the `max:` rule; a length for strings and arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Bound>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ArrayTag {
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ObjectTag {
    Object,
}

/// Array schema with the schema of its (homogeneous) elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArraySchema {
    #[serde(rename = "type")]
    tag: ArrayTag,
    pub items: Box<Schema>,
    #[serde(rename = "minItems", default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<Bound>,
    #[serde(rename = "maxItems", default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<Bound>,
}

/// Object schema with ordered properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    #[serde(rename = "type")]
    tag: ObjectTag,
    pub properties: IndexMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl Schema {
    /// A plain, non-nullable scalar of the given type
    pub fn typed(schema_type: SchemaType) -> Self {
        Schema::Scalar(ScalarSchema {
            schema_type: Some(schema_type),
            ..Default::default()
        })
    }

    /// An untyped schema that only states the value may be null
    pub fn null() -> Self {
        Schema::Scalar(ScalarSchema {
            nullable: true,
            ..Default::default()
        })
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array(ArraySchema {
            tag: ArrayTag::Array,
            items: Box::new(items),
            min_items: None,
            max_items: None,
        })
    }

    pub fn object(properties: IndexMap<String, Schema>) -> Self {
        Schema::Object(ObjectSchema {
            tag: ObjectTag::Object,
            properties,
            required: Vec::new(),
        })
    }

    /// The `type` this schema serializes with, if any
    pub fn schema_type(&self) -> Option<SchemaType> {
        match self {
            Schema::Array(_) => Some(SchemaType::Array),
            Schema::Object(_) => Some(SchemaType::Object),
            Schema::Scalar(scalar) => scalar.schema_type,
        }
    }

    /// Looks up a direct property of an object schema
    pub fn property(&self, name: &str) -> Option<&Schema> {
        match self {
            Schema::Object(object) => object.properties.get(name),
            _ => None,
        }
    }

    /// Element schema of an array schema
    pub fn items(&self) -> Option<&Schema> {
        match self {
            Schema::Array(array) => Some(&array.items),
            _ => None,
        }
    }
}

/// The compiled request body of one operation
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRules {
    /// Top-level properties in sorted-path order
    pub properties: IndexMap<String, Schema>,
    /// Required top-level property names, sorted
    pub required: Vec<String>,
}

impl CompiledRules {
    /// Wraps the properties into the `{type: object, properties, required}` body schema.
    pub fn into_schema(self) -> Schema {
        Schema::Object(ObjectSchema {
            tag: ObjectTag::Object,
            properties: self.properties,
            required: self.required,
        })
    }
}

/// Schema generator - compiles dotted-path validation rules into schema trees
pub struct SchemaGenerator;

impl SchemaGenerator {
    /// Compiles every path of `rules` into one nested property map.
    ///
    /// Paths are canonicalised first (numeric index segments become `*`) and
    /// then sorted, so `items.0.code` and `items.1.code` land on the same
    /// `items.*.code` slot and parents are always inserted before children.
    /// When two paths collapse onto one slot the later one in sort order wins.
    pub fn compile_rules(rules: &PropertyPathMap) -> CompiledRules {
        debug!("Compiling {} rule paths", rules.len());

        let mut entries: Vec<(String, &str, &Vec<String>)> = rules
            .iter()
            .map(|(path, tokens)| (canonical_path(path), path.as_str(), tokens))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        let mut tree = PathTree::new();
        for (canonical, _, tokens) in &entries {
            tree.insert(canonical, tokens);
        }

        let mut required: Vec<String> = rules
            .iter()
            .filter(|(path, tokens)| !path.contains('.') && RuleSet::new(tokens).is_required())
            .map(|(path, _)| path.clone())
            .collect();
        required.sort();

        CompiledRules {
            properties: tree.compile_children(PathTree::ROOT),
            required,
        }
    }

    /// Compiles a terminal token list into a scalar schema.
    pub fn compile_leaf(tokens: &[String]) -> Schema {
        let rules = RuleSet::new(tokens);

        Schema::Scalar(ScalarSchema {
            schema_type: Some(rules.data_type().schema_type()),
            nullable: rules.is_nullable(),
            format: rules.format(),
            minimum: rules.min(),
            maximum: rules.max(),
        })
    }
}

/// Rewrites numeric index segments to the array marker: `a.0.b` -> `a.*.b`.
///
/// Only segments that follow a dot are indexes; a leading `0` is a field name.
pub fn canonical_path(path: &str) -> String {
    path.split('.')
        .enumerate()
        .map(|(position, segment)| {
            let is_index = !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit());
            if position > 0 && is_index {
                ARRAY_SEGMENT
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Debug, Default)]
struct PathNode {
    /// The node's own rule tokens; empty for pure intermediate segments
    tokens: Vec<String>,
    /// Child segment name -> node index
    children: IndexMap<String, usize>,
}

/// Arena of path segments. Nodes refer to each other by index only.
struct PathTree {
    nodes: Vec<PathNode>,
}

impl PathTree {
    const ROOT: usize = 0;

    fn new() -> Self {
        Self {
            nodes: vec![PathNode::default()],
        }
    }

    fn insert(&mut self, path: &str, tokens: &[String]) {
        let mut current = Self::ROOT;

        for segment in path.split('.') {
            current = match self.nodes[current].children.get(segment) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(PathNode::default());
                    self.nodes[current]
                        .children
                        .insert(segment.to_string(), child);
                    child
                }
            };
        }

        self.nodes[current].tokens = tokens.to_vec();
    }

    fn compile_children(&self, id: usize) -> IndexMap<String, Schema> {
        self.nodes[id]
            .children
            .iter()
            .map(|(key, &child)| (key.clone(), self.compile_node(child)))
            .collect()
    }

    fn compile_node(&self, id: usize) -> Schema {
        let node = &self.nodes[id];

        if node.children.is_empty() {
            return SchemaGenerator::compile_leaf(&node.tokens);
        }

        let rules = RuleSet::new(&node.tokens);
        let element = node.children.get(ARRAY_SEGMENT).copied();

        if element.is_some() || rules.is_array() {
            // Without a `*` branch the element rules are empty; named children are ignored.
            let items = match element {
                Some(child) => self.compile_node(child),
                None => SchemaGenerator::compile_leaf(&[]),
            };

            return Schema::Array(ArraySchema {
                tag: ArrayTag::Array,
                items: Box::new(items),
                min_items: rules.min(),
                max_items: rules.max(),
            });
        }

        Schema::object(self.compile_children(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Helper to build a rule map from string literals
    fn rule_map(entries: &[(&str, &[&str])]) -> PropertyPathMap {
        entries
            .iter()
            .map(|(path, tokens)| {
                (
                    path.to_string(),
                    tokens.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect()
    }

    fn to_json(schema: &Schema) -> serde_json::Value {
        serde_json::to_value(schema).unwrap()
    }

    #[test]
    fn test_canonical_path() {
        assert_eq!(canonical_path("items.0.code"), "items.*.code");
        assert_eq!(canonical_path("items.12"), "items.*");
        assert_eq!(canonical_path("items.*.code"), "items.*.code");
        assert_eq!(canonical_path("v2.name"), "v2.name");
        assert_eq!(canonical_path("0.name"), "0.name");
        assert_eq!(canonical_path("0.lines.3"), "0.lines.*");
    }

    #[test]
    fn test_array_with_bounds_and_object_items() {
        let rules = rule_map(&[
            ("items", &["array", "min:2", "max:10"]),
            ("items.*.code", &["required", "min:2", "max:2"]),
        ]);

        let compiled = SchemaGenerator::compile_rules(&rules);

        assert_eq!(
            to_json(&compiled.properties["items"]),
            json!({
                "type": "array",
                "minItems": 2,
                "maxItems": 10,
                "items": {
                    "type": "object",
                    "properties": {
                        "code": { "type": "string", "minimum": 2, "maximum": 2 }
                    }
                }
            })
        );
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let rules = rule_map(&[
            ("items.*.code", &["required"]),
            ("items", &["array", "min:1"]),
        ]);

        let compiled = SchemaGenerator::compile_rules(&rules);
        let items = &compiled.properties["items"];

        assert_eq!(items.schema_type(), Some(SchemaType::Array));
        assert_eq!(
            items.items().and_then(|i| i.property("code")).and_then(Schema::schema_type),
            Some(SchemaType::String)
        );
    }

    #[test]
    fn test_numeric_indexes_collapse_onto_one_branch() {
        let rules = rule_map(&[
            ("lines.0.sku", &["required", "string"]),
            ("lines.1.sku", &["required", "string"]),
            ("lines.1.quantity", &["required", "integer"]),
        ]);

        let compiled = SchemaGenerator::compile_rules(&rules);

        assert_eq!(
            to_json(&compiled.properties["lines"]),
            json!({
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "quantity": { "type": "integer" },
                        "sku": { "type": "string" }
                    }
                }
            })
        );
    }

    #[test]
    fn test_email_leaf_is_not_nullable() {
        let rules = rule_map(&[("email", &["required", "email"])]);

        let compiled = SchemaGenerator::compile_rules(&rules);

        assert_eq!(
            to_json(&compiled.properties["email"]),
            json!({ "type": "string", "format": "email" })
        );
        assert_eq!(compiled.required, vec!["email".to_string()]);
    }

    #[test]
    fn test_regex_becomes_format() {
        let rules = rule_map(&[("field", &["required", "string", "regex:/[0-9]+_[a-z]/"])]);

        let compiled = SchemaGenerator::compile_rules(&rules);

        assert_eq!(
            to_json(&compiled.properties["field"]),
            json!({ "type": "string", "format": "[0-9]+_[a-z]" })
        );
    }

    #[test]
    fn test_required_only_collects_top_level_paths() {
        let rules = rule_map(&[
            ("email", &["required", "email"]),
            ("name", &["nullable", "string"]),
            ("birthday", &["required", "date_format:d-m-Y"]),
            ("nickname", &["required", "nullable"]),
            ("country.code", &["required"]),
        ]);

        let compiled = SchemaGenerator::compile_rules(&rules);

        assert_eq!(
            compiled.required,
            vec!["birthday".to_string(), "email".to_string()]
        );
    }

    #[test]
    fn test_full_property_tree() {
        let rules = rule_map(&[
            ("email", &["required", "email"]),
            ("name", &["nullable", "string"]),
            ("birthday", &["required", "date_format:d-m-Y"]),
            ("country.code", &["required"]),
            ("products.*", &["required"]),
            ("order.id", &["required"]),
            ("order.address.address", &["required"]),
            ("order.address.postalCode", &["required"]),
            ("price", &["numeric", "min:0.5"]),
        ]);

        let schema = SchemaGenerator::compile_rules(&rules).into_schema();

        assert_eq!(
            to_json(&schema),
            json!({
                "type": "object",
                "properties": {
                    "birthday": { "type": "string" },
                    "country": {
                        "type": "object",
                        "properties": { "code": { "type": "string" } }
                    },
                    "email": { "type": "string", "format": "email" },
                    "name": { "type": "string", "nullable": true },
                    "order": {
                        "type": "object",
                        "properties": {
                            "address": {
                                "type": "object",
                                "properties": {
                                    "address": { "type": "string" },
                                    "postalCode": { "type": "string" }
                                }
                            },
                            "id": { "type": "string" }
                        }
                    },
                    "price": { "type": "number", "nullable": true, "minimum": 0.5 },
                    "products": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["birthday", "email"]
            })
        );
    }

    #[test]
    fn test_array_rule_without_star_has_untyped_items() {
        let rules = rule_map(&[
            ("tags", &["array", "max:3"]),
            ("tags.name", &["required"]),
        ]);

        let compiled = SchemaGenerator::compile_rules(&rules);

        assert_eq!(
            to_json(&compiled.properties["tags"]),
            json!({
                "type": "array",
                "maxItems": 3,
                "items": { "type": "string", "nullable": true }
            })
        );
    }

    #[test]
    fn test_zero_bounds_are_omitted() {
        let rules = rule_map(&[
            ("age", &["required", "integer", "min:0", "max:120"]),
            ("tags", &["array", "min:0"]),
            ("tags.*", &["string"]),
        ]);

        let compiled = SchemaGenerator::compile_rules(&rules);

        assert_eq!(
            to_json(&compiled.properties["age"]),
            json!({ "type": "integer", "maximum": 120.0 })
        );
        assert_eq!(
            to_json(&compiled.properties["tags"]),
            json!({ "type": "array", "items": { "type": "string", "nullable": true } })
        );
    }

    #[test]
    fn test_non_finite_bounds_are_omitted() {
        let rules = rule_map(&[("price", &["numeric", "max:inf", "min:NaN"])]);

        let compiled = SchemaGenerator::compile_rules(&rules);

        assert_eq!(
            to_json(&compiled.properties["price"]),
            json!({ "type": "number", "nullable": true })
        );
    }

    #[test]
    fn test_array_leaf_has_no_items() {
        let rules = rule_map(&[("with", &["nullable", "array"])]);

        let compiled = SchemaGenerator::compile_rules(&rules);

        assert_eq!(
            to_json(&compiled.properties["with"]),
            json!({ "type": "array", "nullable": true })
        );
    }

    #[test]
    fn test_unknown_rules_fall_back_to_nullable_string() {
        let rules = rule_map(&[("color", &["in:red,green", "some_custom_rule"])]);

        let compiled = SchemaGenerator::compile_rules(&rules);

        assert_eq!(
            to_json(&compiled.properties["color"]),
            json!({ "type": "string", "nullable": true })
        );
        assert!(compiled.required.is_empty());
    }

    #[test]
    fn test_empty_rules_compile_to_empty_object() {
        let compiled = SchemaGenerator::compile_rules(&PropertyPathMap::new());

        assert!(compiled.properties.is_empty());
        assert_eq!(
            to_json(&compiled.into_schema()),
            json!({ "type": "object", "properties": {} })
        );
    }

    #[test]
    fn test_schema_deserializes_into_matching_kind() {
        let array: Schema =
            serde_json::from_value(json!({ "type": "array", "items": { "type": "string" } })).unwrap();
        let object: Schema =
            serde_json::from_value(json!({ "type": "object", "properties": {} })).unwrap();
        let leaf: Schema = serde_json::from_value(json!({ "type": "array", "nullable": true })).unwrap();
        let null: Schema = serde_json::from_value(json!({ "nullable": true })).unwrap();

        assert!(matches!(array, Schema::Array(_)));
        assert!(matches!(object, Schema::Object(_)));
        assert!(matches!(leaf, Schema::Scalar(_)));
        assert_eq!(null, Schema::null());
    }
}
