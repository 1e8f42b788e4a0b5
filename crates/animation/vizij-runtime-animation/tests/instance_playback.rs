use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use vizij_runtime_animation::{
    Animatable, AnimationOverrides, AnimationState, CurveEvaluator, DataType, Keyframe, LoopMode,
    RuntimeConfig, RuntimeError, RuntimeInstance, SceneNode, Scratch, TargetRef, Track, TrackRef,
    Value, DIRECT_WRITE,
};

fn float_track(loop_mode: LoopMode) -> TrackRef {
    Track::new("fade", "alpha", 1.0, DataType::Float, loop_mode)
        .with_keys(vec![
            Keyframe::new(0.0, Value::Float(0.0)),
            Keyframe::new(10.0, Value::Float(100.0)),
        ])
        .into_shared()
}

fn float_node(initial: f32) -> Rc<RefCell<SceneNode>> {
    SceneNode::new("node")
        .with_property("alpha", Value::Float(initial))
        .into_shared()
}

fn alpha(node: &Rc<RefCell<SceneNode>>) -> f32 {
    node.borrow()
        .get_property("alpha")
        .and_then(|v| v.as_float())
        .unwrap_or(f32::NAN)
}

fn instance(track: &TrackRef, node: &Rc<RefCell<SceneNode>>) -> RuntimeInstance {
    let target: TargetRef = node.clone();
    RuntimeInstance::new(track, target, RuntimeConfig::default())
}

#[test]
fn mid_window_tick_writes_interpolated_value() {
    let track = float_track(LoopMode::Cycle);
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    assert!(inst.animate(5000.0, 0.0, 10.0, false, 1.0, DIRECT_WRITE).unwrap());
    assert_eq!(inst.current_frame(), 5.0);
    assert_eq!(alpha(&node), 50.0);
    assert_eq!(inst.current_value(), Some(&Value::Float(50.0)));
    assert!(!inst.is_stopped());
}

#[test]
fn past_the_window_without_loop_ends_on_last_value() {
    let track = float_track(LoopMode::Cycle);
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    assert!(!inst.animate(11000.0, 0.0, 10.0, false, 1.0, DIRECT_WRITE).unwrap());
    assert!(inst.is_stopped());
    assert_eq!(inst.current_frame(), 10.0);
    assert_eq!(alpha(&node), 100.0);
}

#[test]
fn ended_instance_stays_stopped_until_reset() {
    let track = float_track(LoopMode::Cycle);
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    let mut results = Vec::new();
    for step in 0..=12 {
        results.push(
            inst.animate(step as f32 * 1000.0, 0.0, 10.0, false, 1.0, DIRECT_WRITE)
                .unwrap(),
        );
    }
    let first_false = results.iter().position(|r| !r).unwrap();
    assert_eq!(first_false, 10);
    assert!(results[first_false..].iter().all(|r| !r));
    // no writes after the end
    assert_eq!(node.borrow().write_count(), 11);
    assert!(inst.is_stopped());

    inst.reset(false).unwrap();
    assert!(!inst.is_stopped());
    assert!(inst.animate(2000.0, 0.0, 10.0, false, 1.0, DIRECT_WRITE).unwrap());
    assert_eq!(alpha(&node), 20.0);
}

#[test]
fn zero_length_window_is_widened_before_evaluation() {
    let track = float_track(LoopMode::Cycle);
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    inst.animate(500.0, 5.0, 5.0, true, 1.0, DIRECT_WRITE).unwrap();
    assert_relative_eq!(inst.current_frame(), 4.5);
    assert_relative_eq!(alpha(&node), 45.0);

    inst.animate(500.0, 0.0, 0.0, true, 1.0, DIRECT_WRITE).unwrap();
    assert_relative_eq!(inst.current_frame(), 0.5);
}

#[test]
fn go_to_frame_is_idempotent_and_clamped() {
    let track = float_track(LoopMode::Cycle);
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    inst.go_to_frame(3.0).unwrap();
    let first = inst.current_value().cloned();
    inst.go_to_frame(3.0).unwrap();
    assert_eq!(inst.current_value().cloned(), first);
    assert_eq!(first, Some(Value::Float(30.0)));
    assert_eq!(inst.weight(), DIRECT_WRITE);

    inst.go_to_frame(50.0).unwrap();
    assert_eq!(inst.current_frame(), 10.0);
    inst.go_to_frame(-4.0).unwrap();
    assert_eq!(inst.current_frame(), 0.0);
}

#[test]
fn seek_before_first_tick_sees_the_frame_zero_key() {
    let track = Track::new("late", "alpha", 1.0, DataType::Float, LoopMode::Cycle)
        .with_keys(vec![
            Keyframe::new(4.0, Value::Float(8.0)),
            Keyframe::new(8.0, Value::Float(16.0)),
        ])
        .into_shared();
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    inst.go_to_frame(1.0).unwrap();
    assert_eq!(inst.current_frame(), 1.0);
    assert_eq!(alpha(&node), 8.0);
    assert_eq!(track.borrow().first_frame(), Some(0.0));
}

#[test]
fn go_to_frame_relative_from_current_adds_original_once() {
    let track = float_track(LoopMode::RelativeFromCurrent);
    let node = float_node(5.0);
    let mut inst = instance(&track, &node);

    inst.go_to_frame(3.0).unwrap();
    assert_eq!(alpha(&node), 35.0);
    inst.go_to_frame(3.0).unwrap();
    assert_eq!(alpha(&node), 35.0);
    assert_eq!(inst.original_value(), Some(&Value::Float(5.0)));
}

#[test]
fn loop_windows_are_cached_per_pair() {
    let track = float_track(LoopMode::Relative);
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    inst.animate(1000.0, 0.0, 10.0, true, 1.0, DIRECT_WRITE).unwrap();
    let offset = inst.offset_for(0.0, 10.0).cloned();
    inst.animate(2000.0, 0.0, 10.0, true, 1.0, DIRECT_WRITE).unwrap();
    assert_eq!(inst.cached_windows(), 1);
    assert_eq!(inst.offset_for(0.0, 10.0).cloned(), offset);
    assert_eq!(offset, Some(Value::Float(100.0)));

    inst.animate(3000.0, 2.0, 6.0, true, 1.0, DIRECT_WRITE).unwrap();
    assert_eq!(inst.cached_windows(), 2);
    assert_eq!(inst.offset_for(2.0, 6.0), Some(&Value::Float(40.0)));
    assert_eq!(inst.high_limit_for(2.0, 6.0), Some(&Value::Float(60.0)));

    inst.reset(false).unwrap();
    assert_eq!(inst.cached_windows(), 0);
}

#[test]
fn relative_loop_accumulates_offset() {
    let track = float_track(LoopMode::Relative);
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    assert!(inst.animate(25000.0, 0.0, 10.0, true, 1.0, DIRECT_WRITE).unwrap());
    assert_relative_eq!(inst.current_frame(), 5.0);
    assert_relative_eq!(alpha(&node), 250.0);
}

#[test]
fn relative_from_current_direct_write_adds_original() {
    let track = float_track(LoopMode::RelativeFromCurrent);
    let node = float_node(5.0);
    let mut inst = instance(&track, &node);

    inst.animate(5000.0, 0.0, 10.0, true, 1.0, DIRECT_WRITE).unwrap();
    assert_relative_eq!(alpha(&node), 55.0);
    assert_eq!(inst.current_value(), Some(&Value::Float(50.0)));
}

#[test]
fn constant_loop_holds_end_value_after_first_pass() {
    let track = float_track(LoopMode::Constant);
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    inst.animate(13000.0, 0.0, 10.0, true, 1.0, DIRECT_WRITE).unwrap();
    assert_eq!(alpha(&node), 100.0);
}

#[test]
fn yoyo_reflects_back_toward_start() {
    let track = float_track(LoopMode::Yoyo);
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    inst.animate(13000.0, 0.0, 10.0, true, 1.0, DIRECT_WRITE).unwrap();
    assert_relative_eq!(inst.current_frame(), 7.0);
    assert_relative_eq!(alpha(&node), 70.0);
}

#[test]
fn negative_speed_plays_backwards() {
    let track = float_track(LoopMode::Cycle);
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    assert!(inst.animate(3000.0, 0.0, 10.0, false, -1.0, DIRECT_WRITE).unwrap());
    assert_relative_eq!(inst.current_frame(), 7.0);
    assert!(!inst.animate(12000.0, 0.0, 10.0, false, -1.0, DIRECT_WRITE).unwrap());
    assert_eq!(inst.current_frame(), 0.0);
}

#[test]
fn speed_change_keeps_frame_continuous() {
    let track = float_track(LoopMode::Cycle);
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    inst.animate(4000.0, 0.0, 10.0, true, 1.0, DIRECT_WRITE).unwrap();
    inst.animate(4000.0, 0.0, 10.0, true, 2.0, DIRECT_WRITE).unwrap();
    assert_relative_eq!(inst.current_frame(), 4.0);
    inst.animate(5000.0, 0.0, 10.0, true, 2.0, DIRECT_WRITE).unwrap();
    assert_relative_eq!(inst.current_frame(), 6.0);
}

#[test]
fn explicit_speed_change_preparation() {
    let track = float_track(LoopMode::Cycle);
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    inst.animate(4000.0, 0.0, 10.0, true, 1.0, DIRECT_WRITE).unwrap();
    inst.prepare_for_speed_ratio_change(0.5);
    inst.animate(6000.0, 0.0, 10.0, true, 0.5, DIRECT_WRITE).unwrap();
    assert_relative_eq!(inst.current_frame(), 5.0);
}

#[test]
fn target_override_selects_loop_mode() {
    let track = float_track(LoopMode::Cycle);
    let node = SceneNode::new("node")
        .with_property("alpha", Value::Float(0.0))
        .with_overrides(AnimationOverrides {
            enable_blending: false,
            blending_speed: 0.01,
            loop_mode: Some(LoopMode::Relative),
        })
        .into_shared();
    let mut inst = instance(&track, &node);

    assert_eq!(inst.effective_loop_mode(), LoopMode::Relative);
    inst.animate(25000.0, 0.0, 10.0, true, 1.0, DIRECT_WRITE).unwrap();
    assert_relative_eq!(alpha(&node), 250.0);
}

#[test]
fn nested_path_writes_child_and_marks_root_dirty() {
    let track = Track::new("fade", "material.alpha", 1.0, DataType::Float, LoopMode::Cycle)
        .with_keys(vec![
            Keyframe::new(0.0, Value::Float(0.0)),
            Keyframe::new(10.0, Value::Float(1.0)),
        ])
        .into_shared();
    let material = float_node(0.0);
    let material_ref: TargetRef = material.clone();
    let mesh = SceneNode::new("mesh")
        .with_child("material", material_ref.clone())
        .into_shared();
    let mut inst = instance(&track, &mesh);

    inst.animate(5000.0, 0.0, 10.0, false, 1.0, DIRECT_WRITE).unwrap();
    assert_relative_eq!(alpha(&material), 0.5);
    assert_eq!(inst.target_path(), "alpha");
    assert!(Rc::ptr_eq(inst.active_target().unwrap(), &material_ref));
    assert_eq!(mesh.borrow().dirty_log(), &["material.alpha".to_string()]);
}

#[test]
fn unresolvable_path_is_reported() {
    let track = Track::new("fade", "material.alpha", 1.0, DataType::Float, LoopMode::Cycle)
        .with_keys(vec![Keyframe::new(0.0, Value::Float(0.0))])
        .into_shared();
    let mesh = SceneNode::new("mesh").into_shared();
    let mut inst = instance(&track, &mesh);

    let err = inst
        .animate(0.0, 0.0, 10.0, true, 1.0, DIRECT_WRITE)
        .unwrap_err();
    assert_eq!(err.category(), "path");
    assert_eq!(
        err,
        RuntimeError::PropertyPathResolution {
            path: "material.alpha".into(),
            segment: "material".into(),
        }
    );
}

#[test]
fn rejected_assignment_surfaces_target_error() {
    let track = float_track(LoopMode::Cycle);
    let node = SceneNode::new("node")
        .with_property("alpha", Value::vec3(0.0, 0.0, 0.0))
        .into_shared();
    let mut inst = instance(&track, &node);

    let err = inst
        .animate(1000.0, 0.0, 10.0, true, 1.0, DIRECT_WRITE)
        .unwrap_err();
    assert_eq!(err.category(), "target");
}

#[test]
fn nothing_to_animate_stops_immediately() {
    let no_path = Track::new("empty", "", 1.0, DataType::Float, LoopMode::Cycle)
        .with_keys(vec![Keyframe::new(0.0, Value::Float(0.0))])
        .into_shared();
    let no_keys = Track::new("empty", "alpha", 1.0, DataType::Float, LoopMode::Cycle).into_shared();
    let node = float_node(3.0);

    for track in [&no_path, &no_keys] {
        let mut inst = instance(track, &node);
        assert!(!inst.animate(1000.0, 0.0, 10.0, true, 1.0, DIRECT_WRITE).unwrap());
        assert!(inst.is_stopped());
        inst.go_to_frame(2.0).unwrap();
    }
    assert_eq!(alpha(&node), 3.0);
    assert_eq!(node.borrow().write_count(), 0);
}

#[test]
fn set_value_writes_directly() {
    let track = float_track(LoopMode::Cycle);
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    inst.set_value(Value::Float(3.0), DIRECT_WRITE).unwrap();
    assert_eq!(alpha(&node), 3.0);
    assert_eq!(node.borrow().dirty_log().len(), 1);
}

#[test]
fn late_first_key_extrapolates_from_frame_zero() {
    let track = Track::new("late", "alpha", 1.0, DataType::Float, LoopMode::Cycle)
        .with_keys(vec![
            Keyframe::new(4.0, Value::Float(8.0)),
            Keyframe::new(8.0, Value::Float(16.0)),
        ])
        .into_shared();
    let node = float_node(0.0);
    let mut inst = instance(&track, &node);

    inst.animate(2000.0, 0.0, 8.0, true, 1.0, DIRECT_WRITE).unwrap();
    assert_eq!(alpha(&node), 8.0);
    assert_eq!(track.borrow().first_frame(), Some(0.0));
}

#[test]
fn dispose_removes_instance_from_track() {
    let track = float_track(LoopMode::Cycle);
    let node = float_node(0.0);
    let mut a = instance(&track, &node);
    let b = instance(&track, &node);
    assert_eq!(track.borrow().runtime_instances().len(), 2);

    a.dispose();
    a.dispose();
    assert_eq!(track.borrow().runtime_instances(), &[b.id()]);
    drop(b);
    assert!(track.borrow().runtime_instances().is_empty());
}

struct DoubledFrame;

impl CurveEvaluator for DoubledFrame {
    fn evaluate(&self, _track: &Track, frame: f32, _state: &AnimationState, _scratch: &mut Scratch)
        -> Value {
        Value::Float(frame * 2.0)
    }
}

#[test]
fn custom_evaluator_replaces_keyframe_sampling() {
    let track = float_track(LoopMode::Cycle);
    let node = float_node(0.0);
    let target: TargetRef = node.clone();
    let mut inst = RuntimeInstance::new(&track, target, RuntimeConfig::default())
        .with_evaluator(Box::new(DoubledFrame));

    inst.animate(3000.0, 0.0, 10.0, false, 1.0, DIRECT_WRITE).unwrap();
    assert_eq!(inst.current_frame(), 3.0);
    assert_eq!(alpha(&node), 6.0);
}
