//! Element model: kinds, shape classification, value types and builders.
//!
//! Elements are kept as raw JSON. The kind of a node is decided by
//! inspecting its stored shape on every access rather than by a registry.
//!
//! | Kind | Shape |
//! |------|-------|
//! | Property | `modelType` `Property`, or `value` + `valueType` |
//! | Operation | `modelType` `Operation`, or `inputVariables`/`outputVariables`/`invokable` |
//! | Collection | `modelType` `SubmodelElementCollection`, or a `value` of child elements |
//! | Plain | anything else |

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Key holding an element's locally unique name.
pub const ID_SHORT: &str = "idShort";
/// Key holding an element's model type.
pub const MODEL_TYPE: &str = "modelType";
/// Key holding a property's value type tag.
pub const VALUE_TYPE: &str = "valueType";
/// Key holding a property's value or a collection's children.
pub const VALUE: &str = "value";
/// Key holding an operation's declared inputs.
pub const INPUT_VARIABLES: &str = "inputVariables";
/// Key holding an operation's declared outputs.
pub const OUTPUT_VARIABLES: &str = "outputVariables";
/// Key holding an operation's delegate invocation facet.
pub const INVOKABLE: &str = "invokable";
/// Key holding the children of a submodel.
pub const SUBMODEL_ELEMENTS: &str = "submodelElements";
/// Key next to a property's value redirecting it to another store path.
pub const DELEGATE: &str = "delegate";

const MODEL_PROPERTY: &str = "Property";
const MODEL_OPERATION: &str = "Operation";
const MODEL_COLLECTION: &str = "SubmodelElementCollection";
const MODEL_SUBMODEL: &str = "Submodel";

/// The dispatch kind of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// A single scalar value with a value type tag
    Property,
    /// An invokable operation
    Operation,
    /// An ordered container of named child elements
    Collection,
    /// A node without specialized facets
    Plain,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementKind::Property => write!(f, "Property"),
            ElementKind::Operation => write!(f, "Operation"),
            ElementKind::Collection => write!(f, "Collection"),
            ElementKind::Plain => write!(f, "Plain"),
        }
    }
}

/// Read the model type name of a raw element.
///
/// Accepts both `"modelType": "Property"` and `"modelType": {"name": "Property"}`.
#[must_use]
pub fn model_type(raw: &Value) -> Option<&str> {
    match raw.get(MODEL_TYPE)? {
        Value::String(name) => Some(name),
        Value::Object(obj) => obj.get("name").and_then(Value::as_str),
        _ => None,
    }
}

/// Determine the kind of a raw element by inspecting its shape.
#[must_use]
pub fn classify(raw: &Value) -> ElementKind {
    let Some(obj) = raw.as_object() else {
        return ElementKind::Plain;
    };

    match model_type(raw) {
        Some(MODEL_PROPERTY) => ElementKind::Property,
        Some(MODEL_OPERATION) => ElementKind::Operation,
        Some(MODEL_COLLECTION) => ElementKind::Collection,
        Some(_) => ElementKind::Plain,
        None => classify_by_shape(obj),
    }
}

fn classify_by_shape(obj: &Map<String, Value>) -> ElementKind {
    if obj.contains_key(INPUT_VARIABLES)
        || obj.contains_key(OUTPUT_VARIABLES)
        || obj.contains_key(INVOKABLE)
    {
        return ElementKind::Operation;
    }
    if obj.contains_key(VALUE_TYPE) && obj.contains_key(VALUE) {
        return ElementKind::Property;
    }

    let is_element = |v: &Value| v.get(ID_SHORT).is_some_and(Value::is_string);
    match obj.get(VALUE) {
        Some(Value::Object(children)) if !children.is_empty() && children.values().all(is_element) => {
            ElementKind::Collection
        }
        Some(Value::Array(children)) if !children.is_empty() && children.iter().all(is_element) => {
            ElementKind::Collection
        }
        _ => ElementKind::Plain,
    }
}

/// The idShort of a raw element.
#[must_use]
pub fn id_short(raw: &Value) -> Option<&str> {
    raw.get(ID_SHORT).and_then(Value::as_str)
}

/// Whether a raw element is a submodel (the implicit tree root).
#[must_use]
pub fn is_submodel(raw: &Value) -> bool {
    model_type(raw) == Some(MODEL_SUBMODEL) || raw.get(SUBMODEL_ELEMENTS).is_some()
}

/// Value type tag of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    /// `true`/`false`
    Boolean,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// UTF-8 string
    String,
    /// Anything without a more specific tag
    AnyType,
}

impl ValueType {
    /// Derive the tag describing a value's runtime shape.
    #[must_use]
    pub fn derive(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ValueType::Boolean,
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i32::try_from(i).is_ok() {
                        ValueType::Int
                    } else {
                        ValueType::Long
                    }
                } else if n.is_u64() {
                    ValueType::Long
                } else {
                    ValueType::Double
                }
            }
            Value::String(_) => ValueType::String,
            Value::Null | Value::Array(_) | Value::Object(_) => ValueType::AnyType,
        }
    }

    /// The tag as stored in an element.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::Int => "int",
            ValueType::Long => "long",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::AnyType => "anyType",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The idShort of an operation variable.
///
/// Variables are either wrapped (`{"value": {"idShort": ..}}`) or bare.
#[must_use]
pub fn variable_id_short(variable: &Value) -> Option<&str> {
    variable
        .get(VALUE)
        .and_then(id_short)
        .or_else(|| id_short(variable))
}

/// The value type tag of an operation variable, if declared.
#[must_use]
pub fn variable_value_type(variable: &Value) -> Option<ValueType> {
    let inner = variable
        .get(VALUE)
        .filter(|v| v.is_object())
        .unwrap_or(variable);
    inner
        .get(VALUE_TYPE)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
}

/// Build a property, deriving its value type.
#[must_use]
pub fn property(id_short: &str, value: Value) -> Value {
    let value_type = ValueType::derive(&value);
    typed_property(id_short, value, value_type)
}

/// Build a property with an explicit value type.
#[must_use]
pub fn typed_property(id_short: &str, value: Value, value_type: ValueType) -> Value {
    json!({
        ID_SHORT: id_short,
        MODEL_TYPE: MODEL_PROPERTY,
        VALUE_TYPE: value_type,
        VALUE: value,
    })
}

/// Build a property whose value lives at another store path.
///
/// The redirect is fixed when the element is built; writes to the value
/// facet go to `target` and never change it.
#[must_use]
pub fn delegated_property(id_short: &str, target: &str, value_type: ValueType) -> Value {
    json!({
        ID_SHORT: id_short,
        MODEL_TYPE: MODEL_PROPERTY,
        VALUE_TYPE: value_type,
        VALUE: Value::Null,
        DELEGATE: target,
    })
}

/// Build a collection in the external (ordered array) representation.
#[must_use]
pub fn collection(id_short: &str, children: Vec<Value>) -> Value {
    json!({
        ID_SHORT: id_short,
        MODEL_TYPE: MODEL_COLLECTION,
        VALUE: children,
    })
}

/// Build an operation variable template.
#[must_use]
pub fn variable(id_short: &str, value_type: ValueType) -> Value {
    json!({
        VALUE: {
            ID_SHORT: id_short,
            MODEL_TYPE: MODEL_PROPERTY,
            VALUE_TYPE: value_type,
        }
    })
}

/// Build an operation with declared inputs and outputs.
#[must_use]
pub fn operation(id_short: &str, inputs: Vec<Value>, outputs: Vec<Value>) -> Value {
    json!({
        ID_SHORT: id_short,
        MODEL_TYPE: MODEL_OPERATION,
        INPUT_VARIABLES: inputs,
        OUTPUT_VARIABLES: outputs,
    })
}

/// Build a submodel in the external representation.
#[must_use]
pub fn submodel(id_short: &str, elements: Vec<Value>) -> Value {
    json!({
        ID_SHORT: id_short,
        MODEL_TYPE: MODEL_SUBMODEL,
        SUBMODEL_ELEMENTS: elements,
    })
}
