//! Typed-property serialization registry.
//!
//! Every persisted scalar goes through a closed table mapping a [`TypeTag`]
//! to a `(serialize, load)` function pair over JSON. The table is built once
//! by [`PropertyRegistry::standard`] and owned by the system; documents are
//! assembled from registry reads and writes.

use hashbrown::HashMap;
use serde_json::{json, Map, Value as Json};

use crate::condition::CompareType;
use crate::error::AnimError;
use crate::ids::Uid;
use crate::keyframe::ScriptFunctionInfo;
use crate::parameter::ParamType;
use crate::timeline::TimelineKind;
use crate::value::{Value, ValueKind};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Bool,
    Int,
    Uint,
    Float,
    Text,
    Vec3,
    Quat,
    Value,
    ParamType,
    CompareType,
    TimelineKind,
    ValueKind,
    ScriptFunction,
    IndexPath,
    GroupRef,
    NodeRef,
    LinkRef,
    AnimRef,
}

/// Reference kinds; persisted as `{"<Kind>Ref": name, "ID": id}`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RefKind {
    Group,
    Node,
    Link,
    Anim,
}

impl RefKind {
    pub fn key(self) -> &'static str {
        match self {
            RefKind::Group => "GroupRef",
            RefKind::Node => "NodeRef",
            RefKind::Link => "LinkRef",
            RefKind::Anim => "AnimRef",
        }
    }

    fn tag(self) -> TypeTag {
        match self {
            RefKind::Group => TypeTag::GroupRef,
            RefKind::Node => TypeTag::NodeRef,
            RefKind::Link => TypeTag::LinkRef,
            RefKind::Anim => TypeTag::AnimRef,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RefRecord {
    /// Debugging aid only; loading consults the id.
    pub name: String,
    pub id: Uid,
}

/// Closed set of persistable property values.
#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f32),
    Text(String),
    Vec3([f32; 3]),
    Quat([f32; 4]),
    Value(Value),
    ParamType(ParamType),
    CompareType(CompareType),
    TimelineKind(TimelineKind),
    ValueKind(ValueKind),
    ScriptFunction(ScriptFunctionInfo),
    IndexPath(Vec<usize>),
    Ref(RefKind, RefRecord),
}

impl Property {
    pub fn tag(&self) -> TypeTag {
        match self {
            Property::Bool(_) => TypeTag::Bool,
            Property::Int(_) => TypeTag::Int,
            Property::Uint(_) => TypeTag::Uint,
            Property::Float(_) => TypeTag::Float,
            Property::Text(_) => TypeTag::Text,
            Property::Vec3(_) => TypeTag::Vec3,
            Property::Quat(_) => TypeTag::Quat,
            Property::Value(_) => TypeTag::Value,
            Property::ParamType(_) => TypeTag::ParamType,
            Property::CompareType(_) => TypeTag::CompareType,
            Property::TimelineKind(_) => TypeTag::TimelineKind,
            Property::ValueKind(_) => TypeTag::ValueKind,
            Property::ScriptFunction(_) => TypeTag::ScriptFunction,
            Property::IndexPath(_) => TypeTag::IndexPath,
            Property::Ref(kind, _) => kind.tag(),
        }
    }
}

pub type SerializeFn = fn(&Property) -> Result<Json, AnimError>;
pub type LoadFn = fn(&Json) -> Result<Property, AnimError>;

/// Rust types that map onto one registry entry.
pub trait PropertyType: Sized {
    const TAG: TypeTag;
    fn into_property(self) -> Property;
    fn from_property(property: Property) -> Result<Self, AnimError>;
}

fn wrong_property(expected: TypeTag, got: &Property) -> AnimError {
    AnimError::type_mismatch(format!("{expected:?}"), format!("{:?}", got.tag()))
}

macro_rules! property_type {
    ($ty:ty, $variant:ident) => {
        impl PropertyType for $ty {
            const TAG: TypeTag = TypeTag::$variant;

            fn into_property(self) -> Property {
                Property::$variant(self)
            }

            fn from_property(property: Property) -> Result<Self, AnimError> {
                match property {
                    Property::$variant(v) => Ok(v),
                    other => Err(wrong_property(TypeTag::$variant, &other)),
                }
            }
        }
    };
}

property_type!(bool, Bool);
property_type!(i64, Int);
property_type!(u64, Uint);
property_type!(f32, Float);
property_type!(String, Text);
property_type!([f32; 3], Vec3);
property_type!([f32; 4], Quat);
property_type!(Value, Value);
property_type!(ParamType, ParamType);
property_type!(CompareType, CompareType);
property_type!(TimelineKind, TimelineKind);
property_type!(ValueKind, ValueKind);
property_type!(ScriptFunctionInfo, ScriptFunction);
property_type!(Vec<usize>, IndexPath);

impl PropertyType for Uid {
    const TAG: TypeTag = TypeTag::Uint;

    fn into_property(self) -> Property {
        Property::Uint(self.0)
    }

    fn from_property(property: Property) -> Result<Self, AnimError> {
        u64::from_property(property).map(Uid)
    }
}

#[derive(Clone)]
pub struct PropertyRegistry {
    entries: HashMap<TypeTag, (SerializeFn, LoadFn)>,
}

impl std::fmt::Debug for PropertyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<String> = self.entries.keys().map(|t| format!("{t:?}")).collect();
        tags.sort();
        f.debug_struct("PropertyRegistry").field("tags", &tags).finish()
    }
}

impl Default for PropertyRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl PropertyRegistry {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry covering every persisted type of the crate.
    pub fn standard() -> Self {
        let mut reg = Self::empty();
        reg.register(TypeTag::Bool, save_bool, load_bool);
        reg.register(TypeTag::Int, save_int, load_int);
        reg.register(TypeTag::Uint, save_uint, load_uint);
        reg.register(TypeTag::Float, save_float, load_float);
        reg.register(TypeTag::Text, save_text, load_text);
        reg.register(TypeTag::Vec3, save_vec3, load_vec3);
        reg.register(TypeTag::Quat, save_quat, load_quat);
        reg.register(TypeTag::Value, save_value, load_value);
        reg.register(TypeTag::ParamType, save_enum, load_param_type);
        reg.register(TypeTag::CompareType, save_enum, load_compare_type);
        reg.register(TypeTag::TimelineKind, save_enum, load_timeline_kind);
        reg.register(TypeTag::ValueKind, save_enum, load_value_kind);
        reg.register(TypeTag::ScriptFunction, save_enum, load_script_function);
        reg.register(TypeTag::IndexPath, save_index_path, load_index_path);
        reg.register(TypeTag::GroupRef, save_ref, |j| load_ref(RefKind::Group, j));
        reg.register(TypeTag::NodeRef, save_ref, |j| load_ref(RefKind::Node, j));
        reg.register(TypeTag::LinkRef, save_ref, |j| load_ref(RefKind::Link, j));
        reg.register(TypeTag::AnimRef, save_ref, |j| load_ref(RefKind::Anim, j));
        reg
    }

    pub fn register(&mut self, tag: TypeTag, save: SerializeFn, load: LoadFn) {
        self.entries.insert(tag, (save, load));
    }

    fn entry(&self, tag: TypeTag) -> Result<&(SerializeFn, LoadFn), AnimError> {
        self.entries
            .get(&tag)
            .ok_or_else(|| AnimError::not_found("serializer", format!("{tag:?}")))
    }

    pub fn serialize(&self, property: &Property) -> Result<Json, AnimError> {
        let (save, _) = self.entry(property.tag())?;
        save(property)
    }

    pub fn load(&self, tag: TypeTag, json: &Json) -> Result<Property, AnimError> {
        let (_, load) = self.entry(tag)?;
        load(json)
    }

    pub fn put<T: PropertyType>(
        &self,
        obj: &mut Map<String, Json>,
        key: &str,
        value: T,
    ) -> Result<(), AnimError> {
        let json = self.serialize(&value.into_property())?;
        obj.insert(key.to_string(), json);
        Ok(())
    }

    pub fn get<T: PropertyType>(&self, obj: &Map<String, Json>, key: &str) -> Result<T, AnimError> {
        let json = obj
            .get(key)
            .ok_or_else(|| AnimError::parse(format!("missing field \"{key}\"")))?;
        let property = self
            .load(T::TAG, json)
            .map_err(|err| AnimError::parse(format!("field \"{key}\": {err}")))?;
        T::from_property(property)
    }

    /// Like [`Self::get`] but absent fields yield `default`.
    pub fn get_or<T: PropertyType>(
        &self,
        obj: &Map<String, Json>,
        key: &str,
        default: T,
    ) -> Result<T, AnimError> {
        if obj.contains_key(key) {
            self.get(obj, key)
        } else {
            Ok(default)
        }
    }

    pub fn put_ref(
        &self,
        obj: &mut Map<String, Json>,
        key: &str,
        kind: RefKind,
        name: &str,
        id: Uid,
    ) -> Result<(), AnimError> {
        let json = self.serialize_ref(kind, name, id)?;
        obj.insert(key.to_string(), json);
        Ok(())
    }

    pub fn serialize_ref(&self, kind: RefKind, name: &str, id: Uid) -> Result<Json, AnimError> {
        self.serialize(&Property::Ref(
            kind,
            RefRecord {
                name: name.to_string(),
                id,
            },
        ))
    }

    pub fn load_ref(&self, kind: RefKind, json: &Json) -> Result<Uid, AnimError> {
        match self.load(kind.tag(), json)? {
            Property::Ref(loaded, record) if loaded == kind => Ok(record.id),
            other => Err(wrong_property(kind.tag(), &other)),
        }
    }

    pub fn get_ref(&self, obj: &Map<String, Json>, key: &str, kind: RefKind) -> Result<Uid, AnimError> {
        let json = obj
            .get(key)
            .ok_or_else(|| AnimError::parse(format!("missing field \"{key}\"")))?;
        self.load_ref(kind, json)
            .map_err(|err| AnimError::parse(format!("field \"{key}\": {err}")))
    }
}

fn expect<'a, T>(
    value: Option<T>,
    json: &'a Json,
    what: &str,
) -> Result<T, AnimError> {
    value.ok_or_else(|| AnimError::parse(format!("expected {what}, found {json}")))
}

fn save_bool(p: &Property) -> Result<Json, AnimError> {
    match p {
        Property::Bool(b) => Ok(Json::Bool(*b)),
        other => Err(wrong_property(TypeTag::Bool, other)),
    }
}

fn load_bool(json: &Json) -> Result<Property, AnimError> {
    expect(json.as_bool(), json, "a boolean").map(Property::Bool)
}

fn save_int(p: &Property) -> Result<Json, AnimError> {
    match p {
        Property::Int(i) => Ok(json!(i)),
        other => Err(wrong_property(TypeTag::Int, other)),
    }
}

fn load_int(json: &Json) -> Result<Property, AnimError> {
    expect(json.as_i64(), json, "an integer").map(Property::Int)
}

fn save_uint(p: &Property) -> Result<Json, AnimError> {
    match p {
        Property::Uint(u) => Ok(json!(u)),
        other => Err(wrong_property(TypeTag::Uint, other)),
    }
}

fn load_uint(json: &Json) -> Result<Property, AnimError> {
    expect(json.as_u64(), json, "an unsigned integer").map(Property::Uint)
}

fn float_json(v: f32) -> Json {
    json!(f64::from(v))
}

fn json_float(json: &Json) -> Result<f32, AnimError> {
    expect(json.as_f64(), json, "a number").map(|v| v as f32)
}

fn save_float(p: &Property) -> Result<Json, AnimError> {
    match p {
        Property::Float(f) => Ok(float_json(*f)),
        other => Err(wrong_property(TypeTag::Float, other)),
    }
}

fn load_float(json: &Json) -> Result<Property, AnimError> {
    json_float(json).map(Property::Float)
}

fn save_text(p: &Property) -> Result<Json, AnimError> {
    match p {
        Property::Text(s) => Ok(Json::String(s.clone())),
        other => Err(wrong_property(TypeTag::Text, other)),
    }
}

fn load_text(json: &Json) -> Result<Property, AnimError> {
    expect(json.as_str(), json, "a string").map(|s| Property::Text(s.to_string()))
}

const AXES: [&str; 4] = ["X", "Y", "Z", "W"];

fn axes_json(values: &[f32]) -> Json {
    let mut obj = Map::new();
    for (axis, v) in AXES.iter().zip(values) {
        obj.insert((*axis).to_string(), float_json(*v));
    }
    Json::Object(obj)
}

fn json_axes<const N: usize>(json: &Json) -> Result<[f32; N], AnimError> {
    let obj = expect(json.as_object(), json, "an object")?;
    let mut out = [0.0; N];
    for (slot, axis) in out.iter_mut().zip(AXES) {
        let v = obj
            .get(axis)
            .ok_or_else(|| AnimError::parse(format!("missing component {axis} in {json}")))?;
        *slot = json_float(v)?;
    }
    Ok(out)
}

fn save_vec3(p: &Property) -> Result<Json, AnimError> {
    match p {
        Property::Vec3(v) => Ok(axes_json(v)),
        other => Err(wrong_property(TypeTag::Vec3, other)),
    }
}

fn load_vec3(json: &Json) -> Result<Property, AnimError> {
    json_axes::<3>(json).map(Property::Vec3)
}

fn save_quat(p: &Property) -> Result<Json, AnimError> {
    match p {
        Property::Quat(q) => Ok(axes_json(q)),
        other => Err(wrong_property(TypeTag::Quat, other)),
    }
}

fn load_quat(json: &Json) -> Result<Property, AnimError> {
    json_axes::<4>(json).map(Property::Quat)
}

/// Tagged values persist as `{"Type": kind, "Value": payload}`.
fn save_value(p: &Property) -> Result<Json, AnimError> {
    let Property::Value(value) = p else {
        return Err(wrong_property(TypeTag::Value, p));
    };
    let payload = match value {
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => json!(i),
        Value::Float(f) => float_json(*f),
        Value::Text(s) => Json::String(s.clone()),
        Value::Vec3(v) => axes_json(v),
        Value::Quat(q) => axes_json(q),
    };
    Ok(json!({ "Type": value.kind().name(), "Value": payload }))
}

fn load_value(json: &Json) -> Result<Property, AnimError> {
    let obj = expect(json.as_object(), json, "a tagged value")?;
    let type_name = obj
        .get("Type")
        .and_then(Json::as_str)
        .ok_or_else(|| AnimError::parse(format!("tagged value without \"Type\": {json}")))?;
    let kind = ValueKind::from_name(type_name)
        .ok_or_else(|| AnimError::parse(format!("unknown value type \"{type_name}\"")))?;
    let payload = obj
        .get("Value")
        .ok_or_else(|| AnimError::parse(format!("tagged value without \"Value\": {json}")))?;
    let value = match kind {
        ValueKind::Bool => Value::Bool(expect(payload.as_bool(), payload, "a boolean")?),
        ValueKind::Int => {
            let i = expect(payload.as_i64(), payload, "an integer")?;
            Value::Int(
                i32::try_from(i)
                    .map_err(|_| AnimError::parse(format!("integer {i} out of range")))?,
            )
        }
        ValueKind::Float => Value::Float(json_float(payload)?),
        ValueKind::Text => Value::Text(expect(payload.as_str(), payload, "a string")?.to_string()),
        ValueKind::Vec3 => Value::Vec3(json_axes::<3>(payload)?),
        ValueKind::Quat => Value::Quat(json_axes::<4>(payload)?),
    };
    Ok(Property::Value(value))
}

/// Serde-derived enums and plain structs.
fn save_enum(p: &Property) -> Result<Json, AnimError> {
    let json = match p {
        Property::ParamType(v) => serde_json::to_value(v)?,
        Property::CompareType(v) => serde_json::to_value(v)?,
        Property::TimelineKind(v) => serde_json::to_value(v)?,
        Property::ValueKind(v) => serde_json::to_value(v)?,
        Property::ScriptFunction(v) => serde_json::to_value(v)?,
        other => {
            return Err(AnimError::type_mismatch(
                "serde enum",
                format!("{:?}", other.tag()),
            ))
        }
    };
    Ok(json)
}

fn load_param_type(json: &Json) -> Result<Property, AnimError> {
    Ok(Property::ParamType(serde_json::from_value(json.clone())?))
}

fn load_compare_type(json: &Json) -> Result<Property, AnimError> {
    Ok(Property::CompareType(serde_json::from_value(json.clone())?))
}

fn load_timeline_kind(json: &Json) -> Result<Property, AnimError> {
    Ok(Property::TimelineKind(serde_json::from_value(json.clone())?))
}

fn load_value_kind(json: &Json) -> Result<Property, AnimError> {
    Ok(Property::ValueKind(serde_json::from_value(json.clone())?))
}

fn load_script_function(json: &Json) -> Result<Property, AnimError> {
    Ok(Property::ScriptFunction(serde_json::from_value(json.clone())?))
}

fn save_index_path(p: &Property) -> Result<Json, AnimError> {
    match p {
        Property::IndexPath(path) => Ok(json!(path)),
        other => Err(wrong_property(TypeTag::IndexPath, other)),
    }
}

fn load_index_path(json: &Json) -> Result<Property, AnimError> {
    let items = expect(json.as_array(), json, "an index array")?;
    items
        .iter()
        .map(|item| {
            let i = expect(item.as_u64(), item, "an index")?;
            usize::try_from(i).map_err(|_| AnimError::parse(format!("index {i} out of range")))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Property::IndexPath)
}

fn save_ref(p: &Property) -> Result<Json, AnimError> {
    let Property::Ref(kind, record) = p else {
        return Err(AnimError::type_mismatch("reference", format!("{:?}", p.tag())));
    };
    let mut obj = Map::new();
    obj.insert(kind.key().to_string(), Json::String(record.name.clone()));
    obj.insert("ID".to_string(), json!(record.id.0));
    Ok(Json::Object(obj))
}

fn load_ref(kind: RefKind, json: &Json) -> Result<Property, AnimError> {
    let obj = expect(json.as_object(), json, "a reference")?;
    let id = obj
        .get("ID")
        .and_then(Json::as_u64)
        .ok_or_else(|| AnimError::parse(format!("{} without \"ID\": {json}", kind.key())))?;
    let name = obj
        .get(kind.key())
        .and_then(Json::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(Property::Ref(kind, RefRecord { name, id: Uid(id) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_persist_by_axis() {
        let reg = PropertyRegistry::standard();
        let json = reg.serialize(&Property::Vec3([1.0, 2.0, 3.0])).unwrap();
        assert_eq!(json, json!({ "X": 1.0, "Y": 2.0, "Z": 3.0 }));
        let q = reg
            .load(TypeTag::Quat, &json!({ "X": 0.0, "Y": 0.0, "Z": 0.0, "W": 1.0 }))
            .unwrap();
        assert_eq!(q, Property::Quat([0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn tagged_value_carries_its_type() {
        let reg = PropertyRegistry::standard();
        let json = reg.serialize(&Property::Value(Value::Int(-4))).unwrap();
        assert_eq!(json, json!({ "Type": "int", "Value": -4 }));
        let bad = reg.load(TypeTag::Value, &json!({ "Type": "color", "Value": 1 }));
        assert!(matches!(bad, Err(AnimError::Parse { .. })));
    }

    #[test]
    fn references_persist_name_and_id_but_load_by_id() {
        let reg = PropertyRegistry::standard();
        let json = reg.serialize_ref(RefKind::Node, "Idle", Uid(99)).unwrap();
        assert_eq!(json, json!({ "NodeRef": "Idle", "ID": 99 }));
        assert_eq!(reg.load_ref(RefKind::Node, &json!({ "ID": 99 })).unwrap(), Uid(99));
    }

    #[test]
    fn missing_entry_is_reported() {
        let reg = PropertyRegistry::empty();
        assert!(matches!(
            reg.serialize(&Property::Bool(true)),
            Err(AnimError::NotFound { kind: "serializer", .. })
        ));
    }

    #[test]
    fn typed_get_and_put() {
        let reg = PropertyRegistry::standard();
        let mut obj = Map::new();
        reg.put(&mut obj, "speed", 1.5f32).unwrap();
        reg.put(&mut obj, "kind", ParamType::Trigger).unwrap();
        assert_eq!(obj["kind"], json!("TRIGGER"));
        assert_eq!(reg.get::<f32>(&obj, "speed").unwrap(), 1.5);
        assert!(reg.get::<bool>(&obj, "speed").is_err());
        assert!(reg.get::<f32>(&obj, "missing").is_err());
        assert!(reg.get_or(&obj, "missing", true).unwrap());
    }
}
