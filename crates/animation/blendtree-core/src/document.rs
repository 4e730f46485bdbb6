//! JSON documents for trees and animations.
//!
//! Documents are built from [`PropertyRegistry`] reads and writes so every
//! scalar uses the registered encoding. Loading is all-or-nothing: the first
//! malformed field fails the whole document and nothing partial escapes.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value as Json};

use crate::animation::Animation;
use crate::condition::{CompareType, Condition};
use crate::error::AnimError;
use crate::graph::{AnimationTree, Group, GroupRef, Link, LinkRef, Node, NodeRef};
use crate::handle::Handle;
use crate::ids::Uid;
use crate::keyframe::{KeyFrame, ScriptEvent, ScriptFunctionInfo};
use crate::library::AnimationLibrary;
use crate::parameter::{check_type, ParamType, Parameter};
use crate::serialization::{PropertyRegistry, RefKind};
use crate::timeline::{PropertyDescriptor, Timeline, TimelineKind};
use crate::value::{Value, ValueKind};

type Object = Map<String, Json>;

fn as_object<'a>(json: &'a Json, what: &str) -> Result<&'a Object, AnimError> {
    json.as_object()
        .ok_or_else(|| AnimError::parse(format!("{what} must be an object")))
}

fn array<'a>(obj: &'a Object, key: &str) -> Result<&'a [Json], AnimError> {
    match obj.get(key) {
        Some(Json::Array(items)) => Ok(items),
        Some(_) => Err(AnimError::parse(format!("field \"{key}\" must be an array"))),
        None => Ok(&[]),
    }
}

fn anim_name(library: Option<&AnimationLibrary>, id: Uid) -> String {
    library
        .and_then(|lib| lib.get(id))
        .map(|a| a.name.clone())
        .unwrap_or_default()
}

pub fn tree_to_document(
    tree: &AnimationTree,
    library: Option<&AnimationLibrary>,
    reg: &PropertyRegistry,
) -> Result<Json, AnimError> {
    let mut doc = Object::new();
    reg.put(&mut doc, "name", tree.name.clone())?;
    reg.put(&mut doc, "treeID", tree.id)?;
    let entry_name = tree
        .groups
        .get(tree.entry_group.id())
        .map(|g| g.name.as_str())
        .unwrap_or_default();
    reg.put_ref(&mut doc, "entryGroup", RefKind::Group, entry_name, tree.entry_group.id())?;

    let groups = tree
        .groups
        .iter()
        .map(|group| group_to_document(group, library, reg))
        .collect::<Result<Vec<_>, _>>()?;
    doc.insert("Groups".into(), Json::Array(groups));

    let params = tree
        .parameters()
        .iter()
        .map(|param| {
            let mut obj = Object::new();
            reg.put(&mut obj, "name", param.name.clone())?;
            reg.put(&mut obj, "paramID", param.id)?;
            reg.put(&mut obj, "type", param.kind)?;
            reg.put(&mut obj, "value", param.value.clone())?;
            Ok(Json::Object(obj))
        })
        .collect::<Result<Vec<_>, AnimError>>()?;
    doc.insert("Parameters".into(), Json::Array(params));
    Ok(Json::Object(doc))
}

fn group_to_document(
    group: &Group,
    library: Option<&AnimationLibrary>,
    reg: &PropertyRegistry,
) -> Result<Json, AnimError> {
    let node_name = |id: Uid| {
        group
            .nodes
            .get(id)
            .map(|n| n.name.clone())
            .unwrap_or_default()
    };
    let link_name = |id: Uid| {
        group
            .links
            .get(id)
            .map(|l| l.name.clone())
            .unwrap_or_default()
    };

    let mut doc = Object::new();
    reg.put(&mut doc, "name", group.name.clone())?;
    reg.put(&mut doc, "groupID", group.id)?;
    reg.put_ref(
        &mut doc,
        "startNode",
        RefKind::Node,
        &node_name(group.start_node.id()),
        group.start_node.id(),
    )?;

    let mut nodes = Vec::with_capacity(group.nodes.len());
    for node in group.nodes.iter() {
        let mut obj = Object::new();
        reg.put(&mut obj, "name", node.name.clone())?;
        reg.put(&mut obj, "node_ID", node.id)?;
        reg.put_ref(&mut obj, "group", RefKind::Group, &group.name, group.id)?;
        reg.put_ref(
            &mut obj,
            "anim",
            RefKind::Anim,
            &anim_name(library, node.anim.id()),
            node.anim.id(),
        )?;
        reg.put(&mut obj, "speed", node.speed)?;
        reg.put(&mut obj, "position", node.position)?;
        let outgoing = node
            .outgoing_links
            .iter()
            .map(|l| reg.serialize_ref(RefKind::Link, &link_name(l.id()), l.id()))
            .collect::<Result<Vec<_>, _>>()?;
        obj.insert("Outgoing Links".into(), Json::Array(outgoing));
        nodes.push(Json::Object(obj));
    }
    doc.insert("Nodes".into(), Json::Array(nodes));

    let mut links = Vec::with_capacity(group.links.len());
    for link in group.links.iter() {
        let mut obj = Object::new();
        reg.put(&mut obj, "name", link.name.clone())?;
        reg.put(&mut obj, "linkID", link.id)?;
        reg.put_ref(&mut obj, "src", RefKind::Node, &node_name(link.src.id()), link.src.id())?;
        reg.put_ref(&mut obj, "dst", RefKind::Node, &node_name(link.dst.id()), link.dst.id())?;
        reg.put(&mut obj, "has_exit_time", link.has_exit_time)?;
        reg.put(&mut obj, "exit_time", link.exit_time)?;
        reg.put(&mut obj, "fixed_duration", link.fixed_duration)?;
        reg.put(&mut obj, "transition_duration", link.transition_duration)?;
        reg.put(&mut obj, "transition_offset", link.transition_offset)?;
        let conditions = link
            .conditions
            .iter()
            .map(|c| {
                let mut cond = Object::new();
                reg.put(&mut cond, "conditionID", c.id)?;
                reg.put(&mut cond, "paramID", c.param_id)?;
                reg.put(&mut cond, "comparison_type", c.compare)?;
                reg.put(&mut cond, "type", c.kind)?;
                reg.put(&mut cond, "value", c.value.clone())?;
                Ok(Json::Object(cond))
            })
            .collect::<Result<Vec<_>, AnimError>>()?;
        obj.insert("Conditions".into(), Json::Array(conditions));
        links.push(Json::Object(obj));
    }
    doc.insert("Links".into(), Json::Array(links));
    Ok(Json::Object(doc))
}

/// Rebuild a tree. Group, node and link handles are reloaded before
/// returning; animation handles stay unbound until the tree is bound
/// against a library.
pub fn tree_from_document(doc: &Json, reg: &PropertyRegistry) -> Result<AnimationTree, AnimError> {
    let obj = as_object(doc, "tree document")?;
    let name: String = reg.get(obj, "name")?;
    let id: Uid = reg.get(obj, "treeID")?;
    let entry = match obj.get("entryGroup") {
        Some(json) => GroupRef::unbound(reg.load_ref(RefKind::Group, json)?),
        None => GroupRef::default(),
    };

    let groups = array(obj, "Groups")?
        .iter()
        .map(|g| group_from_document(g, reg))
        .collect::<Result<Vec<_>, _>>()?;

    let mut parameters = Vec::new();
    for json in array(obj, "Parameters")? {
        let p = as_object(json, "parameter")?;
        let kind: ParamType = reg.get(p, "type")?;
        let value: Value = reg.get_or(p, "value", kind.default_value())?;
        check_type(kind, &value)?;
        let param = Parameter {
            id: reg.get(p, "paramID")?,
            name: reg.get(p, "name")?,
            kind,
            value,
        };
        if parameters.iter().any(|other: &Parameter| other.name == param.name) {
            return Err(AnimError::parse(format!(
                "duplicate parameter {} in tree {name}",
                param.name
            )));
        }
        parameters.push(param);
    }

    let mut tree = AnimationTree::from_parts(id, name, entry, groups, parameters);
    let dangling = tree.reload_references();
    if dangling > 0 {
        return Err(AnimError::parse(format!(
            "tree {} has {dangling} dangling reference(s)",
            tree.name
        )));
    }
    let unbound = tree.bind_conditions();
    if unbound > 0 {
        return Err(AnimError::parse(format!(
            "tree {} has {unbound} condition(s) on unknown parameters",
            tree.name
        )));
    }
    Ok(tree)
}

fn group_from_document(json: &Json, reg: &PropertyRegistry) -> Result<Group, AnimError> {
    let obj = as_object(json, "group")?;
    let id: Uid = reg.get(obj, "groupID")?;
    let start = NodeRef::unbound(reg.get_ref(obj, "startNode", RefKind::Node)?);
    let mut group = Group::from_parts(id, reg.get(obj, "name")?, start);

    for json in array(obj, "Nodes")? {
        let n = as_object(json, "node")?;
        let outgoing = array(n, "Outgoing Links")?
            .iter()
            .map(|l| reg.load_ref(RefKind::Link, l).map(LinkRef::unbound))
            .collect::<Result<Vec<_>, _>>()?;
        let node = Node {
            id: reg.get(n, "node_ID")?,
            name: reg.get(n, "name")?,
            group: GroupRef::unbound(id),
            anim: Handle::unbound(reg.get_ref(n, "anim", RefKind::Anim)?),
            speed: reg.get_or(n, "speed", 1.0)?,
            position: reg.get_or(n, "position", [0.0; 3])?,
            outgoing_links: outgoing,
        };
        if group.nodes.find_id(&node.name).is_some() {
            return Err(AnimError::parse(format!(
                "duplicate node {} in group {}",
                node.name, group.name
            )));
        }
        group.nodes.insert(node);
    }

    for json in array(obj, "Links")? {
        let l = as_object(json, "link")?;
        let mut conditions = Vec::new();
        for json in array(l, "Conditions")? {
            conditions.push(condition_from_document(as_object(json, "condition")?, reg)?);
        }
        let link = Link {
            id: reg.get(l, "linkID")?,
            name: reg.get(l, "name")?,
            src: NodeRef::unbound(reg.get_ref(l, "src", RefKind::Node)?),
            dst: NodeRef::unbound(reg.get_ref(l, "dst", RefKind::Node)?),
            has_exit_time: reg.get_or(l, "has_exit_time", false)?,
            exit_time: reg.get_or(l, "exit_time", 0.0)?,
            fixed_duration: reg.get_or(l, "fixed_duration", true)?,
            transition_duration: reg.get_or(l, "transition_duration", 0.0)?,
            transition_offset: reg.get_or(l, "transition_offset", 0.0)?,
            conditions,
        };
        group.links.insert(link);
    }
    Ok(group)
}

fn condition_from_document(c: &Object, reg: &PropertyRegistry) -> Result<Condition, AnimError> {
    let kind: ParamType = reg.get(c, "type")?;
    let compare: CompareType = reg.get(c, "comparison_type")?;
    if !compare.is_supported_for(kind) {
        return Err(AnimError::UnsupportedComparison {
            param_type: kind.to_string(),
            comparison: compare.to_string(),
        });
    }
    let value = match kind {
        ParamType::Trigger => Value::Bool(true),
        _ => reg.get(c, "value")?,
    };
    check_type(kind, &value)?;
    Ok(Condition {
        id: reg.get(c, "conditionID")?,
        param_id: reg.get(c, "paramID")?,
        compare,
        kind,
        value,
        param_index: None,
    })
}

pub fn animation_to_document(anim: &Animation, reg: &PropertyRegistry) -> Result<Json, AnimError> {
    let mut doc = Object::new();
    reg.put(&mut doc, "name", anim.name.clone())?;
    reg.put(&mut doc, "animation_ID", anim.id)?;
    reg.put(&mut doc, "looping", anim.looping)?;
    reg.put(&mut doc, "animation_length", anim.length())?;
    reg.put(&mut doc, "frames_per_second", anim.frames_per_second)?;

    let events = anim
        .events()
        .iter()
        .map(|e| {
            let mut obj = Object::new();
            reg.put(&mut obj, "time", e.time)?;
            reg.put(&mut obj, "script_function_info", e.function.clone())?;
            Ok(Json::Object(obj))
        })
        .collect::<Result<Vec<_>, AnimError>>()?;
    doc.insert("script events".into(), Json::Array(events));

    let mut timelines = Vec::with_capacity(anim.timelines().len());
    for timeline in anim.timelines() {
        let mut obj = Object::new();
        reg.put(&mut obj, "name", timeline.name.clone())?;
        reg.put(&mut obj, "type", timeline.kind)?;
        reg.put(&mut obj, "component", timeline.target.component.clone())?;
        reg.put(&mut obj, "property", timeline.target.property.clone())?;
        reg.put(&mut obj, "datatype", timeline.target.kind)?;
        reg.put(&mut obj, "component_hash", timeline.component_hash)?;
        reg.put(&mut obj, "children_index", timeline.child_path.clone())?;
        let keys = timeline
            .keyframes()
            .iter()
            .map(|k| {
                let mut key = Object::new();
                reg.put(&mut key, "time", k.time)?;
                reg.put(&mut key, "data", k.value.clone())?;
                Ok(Json::Object(key))
            })
            .collect::<Result<Vec<_>, AnimError>>()?;
        obj.insert("keyframes".into(), Json::Array(keys));
        timelines.push(Json::Object(obj));
    }
    doc.insert("timelines".into(), Json::Array(timelines));
    Ok(Json::Object(doc))
}

/// Rebuild an animation. Keyframes are re-validated against their
/// timeline's type and re-sorted by time.
pub fn animation_from_document(doc: &Json, reg: &PropertyRegistry) -> Result<Animation, AnimError> {
    let obj = as_object(doc, "animation document")?;
    let mut anim = Animation::with_id(reg.get(obj, "animation_ID")?, reg.get::<String>(obj, "name")?);
    anim.looping = reg.get_or(obj, "looping", false)?;
    anim.frames_per_second = reg.get_or(obj, "frames_per_second", anim.frames_per_second)?;

    for json in array(obj, "script events")? {
        let e = as_object(json, "script event")?;
        let function: ScriptFunctionInfo = reg.get(e, "script_function_info")?;
        anim.add_script_event(ScriptEvent::new(reg.get(e, "time")?, function))?;
    }

    for json in array(obj, "timelines")? {
        let t = as_object(json, "timeline")?;
        let kind: TimelineKind = reg.get(t, "type")?;
        let value_kind: ValueKind = reg.get(t, "datatype")?;
        let target = PropertyDescriptor::new(
            reg.get::<String>(t, "component")?,
            reg.get::<String>(t, "property")?,
            value_kind,
        );
        let hash = reg.get_or(t, "component_hash", target.component_hash())?;
        let mut timeline = Timeline::from_parts(
            reg.get(t, "name")?,
            kind,
            target,
            hash,
            reg.get_or(t, "children_index", Vec::new())?,
            Vec::new(),
        );
        for json in array(t, "keyframes")? {
            let k = as_object(json, "keyframe")?;
            timeline.add_keyframe(KeyFrame::new(reg.get(k, "time")?, reg.get::<Value>(k, "data")?))?;
        }
        if anim.timeline(&timeline.name).is_ok() {
            return Err(AnimError::parse(format!(
                "duplicate timeline {} in animation {}",
                timeline.name, anim.name
            )));
        }
        anim.push_timeline(timeline);
    }

    let stored: f32 = reg.get_or(obj, "animation_length", 0.0)?;
    let computed = anim.calculate_length();
    anim.set_length(stored.max(computed));
    Ok(anim)
}

pub fn read_document(path: &Path) -> Result<Json, AnimError> {
    let text = fs::read_to_string(path).map_err(|err| AnimError::io(path, &err))?;
    serde_json::from_str(&text)
        .map_err(|err| AnimError::parse(format!("{}: {err}", path.display())))
}

pub fn write_document(path: &Path, doc: &Json, pretty: bool) -> Result<(), AnimError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| AnimError::io(parent, &err))?;
    }
    let text = if pretty {
        serde_json::to_string_pretty(doc)?
    } else {
        serde_json::to_string(doc)?
    };
    fs::write(path, text).map_err(|err| AnimError::io(path, &err))
}
