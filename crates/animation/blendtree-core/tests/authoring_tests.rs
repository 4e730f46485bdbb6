use blendtree_core::{
    AnimError, Animation, AnimationLibrary, AnimationTree, CompareType, ConditionInfo, KeyFrame,
    NodeInfo, ParamType, ParameterInfo, PropertyDescriptor, ScriptEvent, ScriptFunctionInfo,
    TimelineInfo, Uid, Value, ValueKind, START_NODE_NAME,
};

fn mk_library() -> AnimationLibrary {
    let mut lib = AnimationLibrary::default();
    lib.insert(Animation::new("idle").looping(true));
    lib.insert(Animation::new("walk").looping(true));
    lib
}

fn mk_tree(lib: &AnimationLibrary) -> AnimationTree {
    let mut tree = AnimationTree::new("hero");
    tree.add_group("base", lib).unwrap();
    tree.add_node("base", NodeInfo::new("Idle").with_animation("idle"), lib)
        .unwrap();
    tree.add_node("base", NodeInfo::new("Walk").with_animation("walk"), lib)
        .unwrap();
    tree
}

fn float_info(name: &str) -> TimelineInfo {
    TimelineInfo::property(
        name,
        PropertyDescriptor::new("Transform", "height", ValueKind::Float),
    )
}

/// it should keep keyframes sorted whatever the insertion order
#[test]
fn keyframes_stay_sorted() {
    let mut anim = Animation::new("a");
    anim.add_timeline(float_info("h"), None).unwrap();
    for t in [3.0, 0.5, 2.0, 0.5, 0.0, 5.0, 1.0] {
        anim.add_keyframe("h", KeyFrame::new(t, t)).unwrap();
        let keys = anim.timeline("h").unwrap().keyframes();
        assert!(keys.windows(2).all(|w| w[0].time <= w[1].time));
    }
    assert_eq!(anim.timeline("h").unwrap().keyframes().len(), 7);
}

/// it should reject keyframes whose value kind differs from the timeline's
#[test]
fn keyframe_type_is_checked() {
    let mut anim = Animation::new("a");
    anim.add_timeline(float_info("h"), None).unwrap();
    let err = anim
        .add_keyframe("h", KeyFrame::new(0.0, [1.0, 2.0, 3.0]))
        .unwrap_err();
    assert!(matches!(err, AnimError::TypeMismatch { .. }));
    assert!(anim.timeline("h").unwrap().keyframes().is_empty());
}

/// it should keep script events sorted and allow removing them
#[test]
fn script_events_sorted() {
    let mut anim = Animation::new("a");
    let f = ScriptFunctionInfo::new("", "Hero", "Hit");
    anim.add_script_event(ScriptEvent::new(1.0, f.clone())).unwrap();
    assert_eq!(anim.add_script_event(ScriptEvent::new(0.5, f.clone())).unwrap(), 0);
    assert_eq!(anim.add_script_event(ScriptEvent::new(1.0, f)).unwrap(), 2);
    let removed = anim.remove_script_event(0).unwrap();
    assert_eq!(removed.time, 0.5);
    assert!(anim.remove_script_event(9).is_err());
}

/// it should return the existing entity when a node, link or timeline is
/// added twice
#[test]
fn authoring_is_idempotent() {
    let lib = mk_library();
    let mut tree = mk_tree(&lib);
    let first = tree
        .add_node("base", NodeInfo::new("Idle").with_animation("idle"), &lib)
        .unwrap();
    let again = tree
        .add_node("base", NodeInfo::new("Idle").with_animation("idle"), &lib)
        .unwrap();
    assert_eq!(first, again);

    let l1 = tree.add_link("base", "Idle", "Walk").unwrap();
    let l2 = tree.add_link("base", "Idle", "Walk").unwrap();
    assert_eq!(l1, l2);

    let group = tree.group("base").unwrap();
    assert_eq!(group.nodes.len(), 3);
    assert_eq!(group.links.len(), 1);
    assert_eq!(group.node("Idle").unwrap().outgoing_links.len(), 1);

    let g1 = tree.add_group("base", &lib).unwrap();
    assert_eq!(tree.groups.len(), 1);
    assert_eq!(g1.id(), tree.group("base").unwrap().id);

    let mut anim = Animation::new("a");
    anim.add_timeline(float_info("h"), None).unwrap();
    anim.add_timeline(float_info("h"), None).unwrap();
    assert_eq!(anim.timelines().len(), 1);
}

/// it should report NotFound for every missing name
#[test]
fn missing_names_fail_loudly() {
    let lib = mk_library();
    let mut tree = mk_tree(&lib);
    let not_found = |r: Result<(), AnimError>| matches!(r, Err(AnimError::NotFound { .. }));

    assert!(not_found(tree.add_link("base", "Idle", "Jump").map(|_| ())));
    assert!(not_found(tree.add_link("upper", "Idle", "Walk").map(|_| ())));
    assert!(not_found(
        tree.add_condition("base", "Idle -> Walk", ConditionInfo::new("x", CompareType::Equal))
            .map(|_| ())
    ));
    tree.add_parameter(ParameterInfo::new("x", ParamType::Bool)).unwrap();
    assert!(not_found(
        tree.add_condition("base", "Idle -> Walk", ConditionInfo::new("x", CompareType::Equal))
            .map(|_| ())
    ));
    assert!(not_found(tree.remove_node("base", "Jump")));
    assert!(not_found(tree.parameter("y").map(|_| ())));
    assert!(not_found(
        tree.set_node_animation("base", "Idle", "fly", &lib)
    ));
}

/// it should only allow comparisons defined for the parameter type
#[test]
fn comparisons_are_validated() {
    let lib = mk_library();
    let mut tree = mk_tree(&lib);
    tree.add_link("base", "Idle", "Walk").unwrap();
    tree.add_parameter(ParameterInfo::new("flag", ParamType::Bool)).unwrap();
    tree.add_parameter(ParameterInfo::new("speed", ParamType::Float)).unwrap();
    tree.add_parameter(ParameterInfo::new("gear", ParamType::Int)).unwrap();
    let link = "Idle -> Walk";

    let err = tree
        .add_condition("base", link, ConditionInfo::new("flag", CompareType::Greater))
        .unwrap_err();
    assert!(matches!(err, AnimError::UnsupportedComparison { .. }));
    let err = tree
        .add_condition("base", link, ConditionInfo::new("speed", CompareType::Equal))
        .unwrap_err();
    assert!(matches!(err, AnimError::UnsupportedComparison { .. }));
    let err = tree
        .add_condition(
            "base",
            link,
            ConditionInfo::new("speed", CompareType::Less).with_value(true),
        )
        .unwrap_err();
    assert!(matches!(err, AnimError::TypeMismatch { .. }));

    for compare in [
        CompareType::Greater,
        CompareType::Less,
        CompareType::Equal,
        CompareType::NotEqual,
    ] {
        tree.add_condition(
            "base",
            link,
            ConditionInfo::new("gear", compare).with_value(3),
        )
        .unwrap();
    }
    let link = tree.group("base").unwrap().link(link).unwrap();
    assert_eq!(link.conditions.len(), 4);
    assert!(link.conditions.iter().all(|c| c.param_index() == Some(2)));
}

/// it should cascade node removal to every attached link
#[test]
fn remove_node_cascades() {
    let lib = mk_library();
    let mut tree = mk_tree(&lib);
    tree.add_link("base", START_NODE_NAME, "Idle").unwrap();
    tree.add_link("base", "Idle", "Walk").unwrap();
    tree.add_link("base", "Walk", "Idle").unwrap();

    tree.remove_node("base", "Walk").unwrap();
    let group = tree.group("base").unwrap();
    assert_eq!(group.links.len(), 1);
    assert!(group.node("Idle").unwrap().outgoing_links.is_empty());
    assert_eq!(
        group.node(START_NODE_NAME).unwrap().outgoing_links.len(),
        1
    );

    let err = tree.remove_node("base", START_NODE_NAME).unwrap_err();
    assert!(matches!(err, AnimError::InvalidOperation { .. }));
}

/// it should strip a removed link from its source node
#[test]
fn remove_link_updates_source() {
    let lib = mk_library();
    let mut tree = mk_tree(&lib);
    tree.add_link("base", "Idle", "Walk").unwrap();
    tree.remove_link("base", "Idle -> Walk").unwrap();
    let group = tree.group("base").unwrap();
    assert!(group.links.is_empty());
    assert!(group.node("Idle").unwrap().outgoing_links.is_empty());
    assert!(tree.remove_link("base", "Idle -> Walk").is_err());
}

/// it should keep every handle valid through authoring and after a reload
#[test]
fn handles_resolve_after_reload() {
    let lib = mk_library();
    let mut tree = mk_tree(&lib);
    let link = tree.add_link("base", "Idle", "Walk").unwrap();
    let group = tree.group("base").unwrap();
    assert!(link.valid(&group.links));
    let resolved = link.resolve(&group.links).unwrap();
    assert!(resolved.src.valid(&group.nodes));
    assert!(resolved.dst.valid(&group.nodes));
    assert!(group.start_node.valid(&group.nodes));

    assert_eq!(tree.bind(&lib), 0);
    let group = tree.group("base").unwrap();
    for node in group.nodes.iter() {
        assert!(node.anim.valid(lib.store()));
        assert!(node.group.valid(&tree.groups));
    }
}

/// it should stop resolving a handle once its entity is removed
#[test]
fn removed_entity_invalidates_handle() {
    let lib = mk_library();
    let mut tree = mk_tree(&lib);
    let walk = tree.group("base").unwrap().node_ref("Walk").unwrap();
    tree.remove_node("base", "Walk").unwrap();
    let group = tree.group("base").unwrap();
    assert!(!walk.valid(&group.nodes));
    assert!(matches!(
        walk.resolve(&group.nodes),
        Err(AnimError::InvalidReference { kind: "node", .. })
    ));
}

/// it should change what a node plays and which node a group starts in
#[test]
fn node_animation_and_start_node() {
    let lib = mk_library();
    let mut tree = mk_tree(&lib);
    tree.set_node_animation("base", "Idle", "walk", &lib).unwrap();
    let walk_id = lib.get_by_name("walk").unwrap().id;
    assert_eq!(tree.group("base").unwrap().node("Idle").unwrap().anim.id(), walk_id);

    tree.set_start_node("base", "Walk").unwrap();
    assert_eq!(tree.group("base").unwrap().start_node().unwrap().name, "Walk");
}

/// it should rename a parameter without touching its conditions
#[test]
fn rename_parameter_keeps_bindings() {
    let lib = mk_library();
    let mut tree = mk_tree(&lib);
    tree.add_link("base", "Idle", "Walk").unwrap();
    let id = tree
        .add_parameter(ParameterInfo::new("moving", ParamType::Bool).with_value(false))
        .unwrap()
        .id;
    tree.add_condition("base", "Idle -> Walk", ConditionInfo::new("moving", CompareType::Equal))
        .unwrap();
    tree.add_parameter(ParameterInfo::new("other", ParamType::Int)).unwrap();

    assert!(tree.rename_parameter("moving", "other").is_err());
    tree.rename_parameter("moving", "walking").unwrap();
    assert_eq!(tree.parameter("walking").unwrap().id, id);
    let cond = &tree.group("base").unwrap().link("Idle -> Walk").unwrap().conditions[0];
    assert_eq!(cond.param_id, id);
    assert_eq!(cond.value, Value::Bool(true));
}

/// it should remove a single condition by id
#[test]
fn remove_condition_by_id() {
    let lib = mk_library();
    let mut tree = mk_tree(&lib);
    tree.add_link("base", "Idle", "Walk").unwrap();
    tree.add_parameter(ParameterInfo::new("go", ParamType::Trigger)).unwrap();
    let id = tree
        .add_condition("base", "Idle -> Walk", ConditionInfo::new("go", CompareType::Equal))
        .unwrap()
        .id;
    tree.remove_condition("base", "Idle -> Walk", id).unwrap();
    assert!(tree.remove_condition("base", "Idle -> Walk", id).is_err());
    assert!(tree
        .group("base")
        .unwrap()
        .link("Idle -> Walk")
        .unwrap()
        .conditions
        .is_empty());
}

/// it should replace animations by name and track modifications
#[test]
fn library_replaces_by_name() {
    let mut lib = AnimationLibrary::default();
    let first = lib.insert(Animation::new("jump"));
    let second = lib.insert(Animation::new("jump"));
    assert_ne!(first.id(), second.id());
    assert!(!first.valid(lib.store()));
    assert!(second.valid(lib.store()));
    assert_eq!(lib.len(), 2);
    assert_eq!(lib.take_modified(), vec!["jump".to_string()]);
    assert!(!lib.is_modified("jump"));

    lib.get_mut_by_name("jump").unwrap();
    assert!(lib.is_modified("jump"));

    let mut reserved = Animation::new("sneaky");
    reserved.id = Uid::EMPTY_ANIMATION;
    let handle = lib.insert(reserved);
    assert_ne!(handle.id(), Uid::EMPTY_ANIMATION);
    assert!(lib.empty_ref().valid(lib.store()));
}
