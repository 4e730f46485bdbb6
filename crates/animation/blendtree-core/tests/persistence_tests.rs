use std::fs;
use std::path::PathBuf;

use blendtree_core::{
    AnimError, AnimationSystem, CoreEvent, EntityId, KeyFrame, MemoryScene, PropertyDescriptor,
    ScriptLog, SystemConfig, TimelineInfo, Uid, Value, ValueKind, START_NODE_NAME,
};
use blendtree_test_fixtures::{animations, trees};

const TREE: &str = "hero-locomotion";

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("blendtree-{}", Uid::generate()));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

/// System holding the `idle` and `run` animations and the locomotion tree.
fn load_fixtures() -> AnimationSystem {
    let mut sys = AnimationSystem::default();
    for name in ["idle", "run"] {
        sys.load_animation_file(animations::path(name).unwrap())
            .unwrap();
    }
    sys.load_tree_file(trees::path(TREE).unwrap()).unwrap();
    sys
}

/// Hero entity with one child, both carrying a transform.
fn spawn_hero(scene: &mut MemoryScene) -> (EntityId, EntityId) {
    let hero = scene.spawn();
    scene.add_component(hero, "Transform");
    let spine = scene.spawn_child(hero);
    scene.add_component(spine, "Transform");
    (hero, spine)
}

/// it should load every fixture listed in the manifest except the broken one
#[test]
fn fixtures_load() {
    let sys = load_fixtures();
    let idle = sys.animations().get_by_name("idle").unwrap();
    assert_eq!(idle.id, Uid(7001));
    assert!(idle.looping);
    assert_eq!(idle.timeline("bob").unwrap().keyframes().len(), 3);

    let run = sys.animations().get_by_name("run").unwrap();
    assert_eq!(run.events().len(), 1);
    assert_eq!(run.timeline("lean").unwrap().child_path, vec![0]);
    approx(run.length(), 0.5, 1e-6);

    let tree = sys.trees().get_by_name(TREE).unwrap();
    assert_eq!(tree.id, Uid(1001));
    assert_eq!(tree.parameters().len(), 3);
    let group = tree.entry_group().unwrap();
    assert_eq!(group.start_node().unwrap().name, START_NODE_NAME);
    assert_eq!(group.nodes.len(), 3);
    assert_eq!(group.links.len(), 2);

    assert_eq!(
        animations::keys(),
        vec!["broken-keyframe", "idle", "run"]
    );
    assert_eq!(trees::keys(), vec![TREE]);
}

/// it should reject a malformed animation without touching the library
#[test]
fn broken_animation_is_rejected() {
    let mut sys = load_fixtures();
    let before = sys.animations().len();
    let err = sys
        .load_animation_file(animations::path("broken-keyframe").unwrap())
        .unwrap_err();
    assert!(matches!(err, AnimError::TypeMismatch { .. }));
    assert_eq!(sys.animations().len(), before);
    assert!(sys.animations().get_by_name("broken-keyframe").is_err());
}

/// it should report IO and parse failures as distinct errors
#[test]
fn missing_and_malformed_files() {
    let mut sys = AnimationSystem::default();
    let dir = scratch_dir();
    let err = sys.load_tree_file(dir.join("nope.tree")).unwrap_err();
    assert!(matches!(err, AnimError::Io { .. }));

    let junk = dir.join("junk.tree");
    fs::write(&junk, "{ not json").unwrap();
    let err = sys.load_tree_file(&junk).unwrap_err();
    assert!(matches!(err, AnimError::Parse { .. }));
    assert!(sys.trees().is_empty());
    let _ = fs::remove_dir_all(dir);
}

/// it should reject a tree whose links point at nodes it does not hold
#[test]
fn dangling_reference_rejects_tree() {
    let mut doc = trees::document(TREE).unwrap();
    doc["Groups"][0]["Links"][0]["dst"]["ID"] = serde_json::json!(9999);
    let mut sys = AnimationSystem::default();
    let err = sys.tree_from_document(&doc).unwrap_err();
    assert!(matches!(err, AnimError::Parse { .. }));
    assert!(sys.trees().is_empty());
}

/// it should reload a saved tree with the same ids, links, policies and
/// condition bindings
#[test]
fn tree_round_trip() {
    let mut sys = load_fixtures();
    let doc = sys.tree_to_document(TREE).unwrap();

    let mut copy = AnimationSystem::default();
    for name in ["idle", "run"] {
        let anim = sys.animation_to_document(name).unwrap();
        copy.animation_from_document(&anim).unwrap();
    }
    copy.tree_from_document(&doc).unwrap();
    assert_eq!(sys.bind_phase(), 0);
    assert_eq!(copy.bind_phase(), 0);

    let original = sys.trees().get_by_name(TREE).unwrap();
    let reloaded = copy.trees().get_by_name(TREE).unwrap();
    assert_eq!(original.id, reloaded.id);
    assert_eq!(original.parameters(), reloaded.parameters());

    let a = original.entry_group().unwrap();
    let b = reloaded.entry_group().unwrap();
    assert_eq!(a.id, b.id);
    assert_eq!(a.start_node.id(), b.start_node.id());
    let names = |g: &blendtree_core::Group| -> Vec<(Uid, String)> {
        g.nodes.iter().map(|n| (n.id, n.name.clone())).collect()
    };
    assert_eq!(names(a), names(b));

    for link in a.links.iter() {
        let other = b.link(&link.name).unwrap();
        assert_eq!(link.id, other.id);
        assert_eq!(link.has_exit_time, other.has_exit_time);
        assert_eq!(link.exit_time, other.exit_time);
        assert_eq!(link.transition_duration, other.transition_duration);
        assert_eq!(link.conditions, other.conditions);
        assert!(other.src.valid(&b.nodes));
        assert!(other.dst.valid(&b.nodes));
        for c in &other.conditions {
            assert!(c.param_index().is_some());
        }
    }
    for node in b.nodes.iter() {
        assert!(node.anim.valid(copy.animations().store()));
        assert!(node.group.valid(&reloaded.groups));
        assert!(node.outgoing_links.iter().all(|l| l.valid(&b.links)));
    }

    assert_eq!(copy.tree_to_document(TREE).unwrap(), doc);
}

/// it should write modified assets and find them again on startup
#[test]
fn save_modified_then_init() {
    let dir = scratch_dir();
    let mut sys = load_fixtures();
    assert!(sys.save_all_modified(&dir).unwrap().is_empty());

    sys.create_animation("wave");
    sys.add_timeline(
        "wave",
        TimelineInfo::property(
            "arm",
            PropertyDescriptor::new("Transform", "scale", ValueKind::Float),
        ),
        None,
    )
    .unwrap()
    .add_keyframe(KeyFrame::new(0.5, 2.0))
    .unwrap();
    sys.edit_tree(TREE, |tree, _| {
        tree.parameter_mut("speed")?.value = Value::Float(3.0);
        Ok(())
    })
    .unwrap();

    let written = sys.save_all_modified(&dir).unwrap();
    assert_eq!(written.len(), 2);
    assert!(written.contains(&dir.join("wave.anim")));
    assert!(written.contains(&dir.join(format!("{TREE}.tree"))));
    sys.save_animation_file("idle", &dir).unwrap();
    sys.save_animation_file("run", &dir).unwrap();
    fs::write(dir.join("notes.txt"), "not an asset").unwrap();

    let mut fresh = AnimationSystem::new(SystemConfig::default());
    assert_eq!(fresh.init(&dir).unwrap(), 4);
    assert_eq!(fresh.bind_phase(), 0);
    let wave = fresh.animations().get_by_name("wave").unwrap();
    approx(wave.length(), 0.5, 1e-6);
    let tree = fresh.trees().get_by_name(TREE).unwrap();
    assert_eq!(tree.parameter("speed").unwrap().value, Value::Float(3.0));
    assert!(fresh.save_all_modified(&dir).unwrap().is_empty());

    let _ = fs::remove_dir_all(dir);
}

/// it should skip unreadable files during startup and keep the rest
#[test]
fn init_skips_bad_files() {
    let dir = scratch_dir();
    fs::copy(animations::path("idle").unwrap(), dir.join("idle.anim")).unwrap();
    fs::copy(
        animations::path("broken-keyframe").unwrap(),
        dir.join("broken-keyframe.anim"),
    )
    .unwrap();
    // run.anim missing: the tree still loads and Run falls back at bind
    fs::copy(trees::path(TREE).unwrap(), dir.join(format!("{TREE}.tree"))).unwrap();

    let mut sys = AnimationSystem::default();
    assert_eq!(sys.init(&dir).unwrap(), 2);
    assert!(sys.bind_phase() > 0);
    let group = sys.trees().get_by_name(TREE).unwrap().entry_group().unwrap();
    assert_eq!(
        group.node("Run").unwrap().anim.id(),
        sys.animations().empty_ref().id()
    );
    assert!(sys.init(dir.join("absent")).is_err());
    let _ = fs::remove_dir_all(dir);
}

/// it should drive the locomotion fixture from the start node through idle
/// into run
#[test]
fn locomotion_end_to_end() {
    let mut sys = load_fixtures();
    let mut scene = MemoryScene::new();
    let (hero, spine) = spawn_hero(&mut scene);
    sys.attach(hero, TREE).unwrap();
    assert_eq!(sys.bind_phase(), 0);
    let mut scripts = ScriptLog::default();

    for _ in 0..10 {
        sys.run(0.1, &mut scene, &mut scripts);
        assert_eq!(sys.current_node_name(hero).unwrap(), START_NODE_NAME);
    }

    sys.set_parameter(hero, "ready", true).unwrap();
    let out = sys.run(0.1, &mut scene, &mut scripts);
    assert!(out.events.iter().any(|e| matches!(
        e,
        CoreEvent::TransitionTaken { to, .. } if to == "Idle"
    )));
    assert_eq!(sys.current_node_name(hero).unwrap(), "Idle");
    let tracker = sys.tracker(hero).unwrap();
    assert!(tracker.timer <= 0.1 + 1e-5);
    assert_eq!(tracker.iterations, 0);
    let bob = scene
        .value(hero, "Transform", "position")
        .and_then(Value::as_vec3)
        .unwrap();
    approx(bob[1], 0.2, 1e-4);

    sys.set_parameter(hero, "go", true).unwrap();
    let mut reached = false;
    for _ in 0..10 {
        let before = sys.tracker(hero).unwrap().normalized_timer;
        sys.run(0.1, &mut scene, &mut scripts);
        if sys.current_node_name(hero).unwrap() == "Run" {
            assert!(before >= 0.5, "left idle early at {before}");
            reached = true;
            break;
        }
    }
    assert!(reached);
    assert_eq!(sys.parameter(hero, "go").unwrap().value, Value::Bool(false));

    for _ in 0..5 {
        sys.run(0.1, &mut scene, &mut scripts);
    }
    assert_eq!(scripts.calls.len(), 1);
    assert_eq!(scripts.calls[0].0, hero);
    assert_eq!(scripts.calls[0].1.qualified_name(), "Game.Hero.Footstep");

    let lean = scene
        .value(spine, "Transform", "rotation")
        .and_then(Value::as_quat)
        .unwrap();
    approx(lean[2], 0.7071068, 1e-5);
    approx(lean[3], 0.7071068, 1e-5);
    assert!(scene.value(hero, "Transform", "rotation").is_none());
}
