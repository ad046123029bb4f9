use kurbo::{Affine, Point, Vec2};
use notelink_core::{
    load_scene, save_scene, Anchor, Annotation, EditOutcome, LinkConfig, NoteKind, ObjectId,
    PropertyValue, SegmentEnd, Session,
};
use serde_json::json;
use std::f64::consts::{FRAC_PI_2, PI};

fn session() -> Session {
    Session::new(LinkConfig::default())
}

fn note_of(session: &Session, id: ObjectId) -> ObjectId {
    session
        .scene()
        .anchor(id)
        .and_then(Anchor::note_ref)
        .expect("anchor should have an annotation")
}

fn assert_close(actual: Point, expected: Point) {
    assert!(
        actual.distance(expected) < 1e-9,
        "expected {expected:?}, got {actual:?}"
    );
}

fn assert_consistent(session: &Session) {
    let violations = session.check_invariants();
    assert!(violations.is_empty(), "invariants violated: {violations:?}");
}

#[test]
fn moving_an_endpoint_drags_the_annotation() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();

    let outcome = session
        .move_endpoint(id, SegmentEnd::End, Vec2::new(10.0, 0.0))
        .unwrap();
    assert_eq!(outcome, EditOutcome::Applied);

    let anchor = session.scene().anchor(id).unwrap();
    assert_close(anchor.anchor_point(), Point::new(10.0, 0.0));

    let note = session.scene().annotation(note_of(&session, id)).unwrap();
    assert_close(note.first_point(), Point::new(10.0, 0.0));
    assert_close(note.second_point(), Point::new(10.0, 0.0));
    assert_close(note.rack_point(), Point::new(10.0, 20.0));
    assert_consistent(&session);
}

#[test]
fn moving_the_anchor_point_refreshes_immediately() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(0.0, 10.0))
        .unwrap();

    session.begin_command("slide").unwrap();
    session.move_anchor_point(id, Vec2::new(3.0, 2.0)).unwrap();
    let note = session.scene().annotation(note_of(&session, id)).unwrap();
    assert_close(note.first_point(), Point::new(0.0, 7.0));
    assert_close(note.rack_point(), Point::new(-20.0, 7.0));
    session.commit_command().unwrap();
    assert_consistent(&session);
}

#[test]
fn duplicating_anchor_with_annotation_binds_the_copy() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);

    let copies = session
        .duplicate(&[id, note_id], Affine::translate((0.0, 50.0)))
        .unwrap();
    assert_eq!(copies.len(), 2);
    let (copy, copy_note) = (copies[0], copies[1]);

    assert_eq!(note_of(&session, copy), copy_note);
    assert_eq!(note_of(&session, id), note_id);
    assert_eq!(session.links().owner_of(copy_note), Some(copy));
    assert_eq!(session.links().owner_of(note_id), Some(id));
    assert_eq!(session.scene().len(), 4);
    assert!(session.ledger().is_empty());
    assert_consistent(&session);
}

#[test]
fn duplicating_anchor_alone_creates_a_new_annotation() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);

    let copies = session
        .duplicate(&[id], Affine::translate((25.0, 0.0)))
        .unwrap();
    let copy_note = note_of(&session, copies[0]);

    assert_ne!(copy_note, note_id);
    let note = session.scene().annotation(copy_note).unwrap();
    assert_close(note.first_point(), Point::new(30.0, 0.0));
    assert_eq!(session.scene().len(), 4);
    assert_consistent(&session);
}

#[test]
fn duplicating_annotation_alone_leaves_no_orphan() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);

    session
        .duplicate(&[note_id], Affine::translate((0.0, 5.0)))
        .unwrap();
    assert_eq!(session.scene().len(), 2);
    assert_consistent(&session);
}

#[test]
fn erasing_an_anchor_erases_its_annotation() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);

    let erased = session.erase(&[id]).unwrap();
    assert_eq!(erased, vec![id]);
    assert!(!session.scene().contains(note_id));
    assert!(session.links().is_empty());
    assert_consistent(&session);
}

#[test]
fn erasing_both_in_one_group() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);

    let erased = session.erase(&[note_id, id]).unwrap();
    assert_eq!(erased.len(), 2);
    assert!(session.scene().is_empty());
    assert_consistent(&session);
}

#[test]
fn erasing_the_annotation_downgrades_the_anchor() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);

    session.erase(&[note_id]).unwrap();
    let anchor = session.scene().anchor(id).unwrap();
    assert_eq!(anchor.note_kind(), NoteKind::None);
    assert_eq!(anchor.note_ref(), None);
    assert_consistent(&session);

    session.set_note_kind(id, NoteKind::Annotated).unwrap();
    assert_ne!(note_of(&session, id), note_id);
    assert_consistent(&session);
}

#[test]
fn repeated_transforms_refresh_each_anchor_once() {
    let mut session = session();
    let a = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let b = session
        .add_anchor(Point::new(0.0, 10.0), Point::new(10.0, 10.0))
        .unwrap();

    session.begin_command("move").unwrap();
    for _ in 0..3 {
        let applied = session
            .transform(&[a, b], Affine::translate((1.0, 0.0)))
            .unwrap();
        assert_eq!(applied, 2);
    }
    assert_eq!(session.batch().len(), 2);
    let summary = session.commit_command().unwrap();

    assert_eq!(summary.refreshed, 2);
    assert_eq!(summary.created, 0);
    let note = session.scene().annotation(note_of(&session, a)).unwrap();
    assert_close(note.first_point(), Point::new(8.0, 0.0));
    assert_consistent(&session);
}

#[test]
fn rotating_anchor_turns_the_shelf_side() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);

    session
        .transform(&[id, note_id], Affine::rotate(FRAC_PI_2))
        .unwrap();
    let note = session.scene().annotation(note_id).unwrap();
    assert_close(note.first_point(), Point::new(0.0, 5.0));
    assert_close(note.rack_point(), Point::new(-20.0, 5.0));
    assert_consistent(&session);
}

#[test]
fn dragging_the_shelf_snaps_the_angle() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);

    session
        .drag_shelf(note_id, Point::new(7.0, -8.0), 2.5)
        .unwrap();
    let anchor = session.scene().anchor(id).unwrap();
    assert_eq!(anchor.note_angle(), PI);
    assert!((anchor.note_distance() + 8.0).abs() < 1e-9);

    let note = session.scene().annotation(note_id).unwrap();
    assert_eq!(note.angle(), PI);
    assert_close(note.rack_point(), Point::new(5.0, -8.0));
    assert_consistent(&session);
}

#[test]
fn near_zero_shelf_angle_is_not_rewritten() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);

    session
        .drag_shelf(note_id, Point::new(5.0, 30.0), 1e-9)
        .unwrap();
    assert_eq!(session.scene().anchor(id).unwrap().note_angle(), 0.0);
    assert_eq!(session.scene().annotation(note_id).unwrap().angle(), 1e-9);
    assert!((session.scene().anchor(id).unwrap().note_distance() - 30.0).abs() < 1e-9);
    assert_consistent(&session);
}

#[test]
fn moving_an_annotation_alone_updates_the_shelf() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);

    session
        .transform(&[note_id], Affine::translate((0.0, 15.0)))
        .unwrap();
    let anchor = session.scene().anchor(id).unwrap();
    assert!((anchor.note_distance() - 35.0).abs() < 1e-9);
    let note = session.scene().annotation(note_id).unwrap();
    assert_close(note.first_point(), Point::new(5.0, 0.0));
    assert_consistent(&session);
}

#[test]
fn locked_objects_are_not_modified() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);
    session.scene_mut().lock(note_id);

    let outcome = session.drag_shelf(note_id, Point::new(0.0, 99.0), 0.0).unwrap();
    assert_eq!(outcome, EditOutcome::Denied);
    assert_eq!(session.scene().anchor(id).unwrap().note_distance(), 20.0);

    session.scene_mut().set_read_only(true);
    assert_eq!(
        session.set_name(id, "blocked").unwrap(),
        EditOutcome::Denied
    );
    assert_eq!(session.scene().anchor(id).unwrap().name(), "2");
}

#[test]
fn renaming_updates_the_label_at_commit() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    session
        .set_property(id, "Name", PropertyValue::Text("B-7".into()))
        .unwrap();
    let note = session.scene().annotation(note_of(&session, id)).unwrap();
    assert_eq!(note.label(), "B-7");
}

#[test]
fn undo_after_duplicate_removes_copies() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);
    session
        .duplicate(&[id, note_id], Affine::translate((0.0, 50.0)))
        .unwrap();
    assert_eq!(session.scene().len(), 4);

    session.undo().unwrap();
    assert_eq!(session.scene().len(), 2);
    assert_eq!(session.links().len(), 1);
    assert_consistent(&session);
}

#[test]
fn saved_scene_reloads_consistently() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("drawing.json");

    let mut session = session();
    let a = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, a);
    session
        .drag_shelf(note_id, Point::new(5.0, -40.0), PI)
        .unwrap();
    session
        .duplicate(&[a], Affine::translate((0.0, 100.0)))
        .unwrap();
    save_scene(session.scene(), &path).unwrap();

    let (scene, report) = load_scene(&path, &LinkConfig::default()).unwrap();
    assert_eq!(report.anchors, 2);
    let loaded = Session::from_loaded(scene, LinkConfig::default());
    assert_consistent(&loaded);
    assert_eq!(loaded.links().len(), 2);

    let anchor = loaded.scene().anchor(a).unwrap();
    assert_eq!(anchor.note_angle(), PI);
    assert!((anchor.note_distance() + 40.0).abs() < 1e-9);
}

#[test]
fn transform_with_locked_owner_keeps_annotation_attached() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);
    session.scene_mut().lock(id);

    let applied = session
        .transform(&[id, note_id], Affine::translate((0.0, 30.0)))
        .unwrap();
    assert_eq!(applied, 1);

    let anchor = session.scene().anchor(id).unwrap();
    assert_close(anchor.anchor_point(), Point::new(5.0, 0.0));
    assert_eq!(anchor.note_distance(), 20.0);
    let note = session.scene().annotation(note_id).unwrap();
    assert_close(note.first_point(), Point::new(5.0, 0.0));
    assert_close(note.rack_point(), Point::new(5.0, 20.0));
    assert_consistent(&session);
}

#[test]
fn shelf_drag_is_denied_when_owner_is_locked() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);
    session.scene_mut().lock(id);

    let outcome = session
        .drag_shelf(note_id, Point::new(5.0, -40.0), 3.0)
        .unwrap();
    assert_eq!(outcome, EditOutcome::Denied);

    let anchor = session.scene().anchor(id).unwrap();
    assert_eq!(anchor.note_distance(), 20.0);
    assert_eq!(anchor.note_angle(), 0.0);
    let note = session.scene().annotation(note_id).unwrap();
    assert_close(note.rack_point(), Point::new(5.0, 20.0));
    assert_eq!(note.angle(), 0.0);
    assert_consistent(&session);
}

#[test]
fn unchanged_pass_requests_no_redraw() {
    let mut session = session();
    let id = session
        .add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0))
        .unwrap();
    let note_id = note_of(&session, id);
    let dirty = session.scene_mut().take_dirty();
    assert!(dirty.contains(&id) && dirty.contains(&note_id));

    session.reconcile();
    assert!(session.scene_mut().take_dirty().is_empty());

    assert_eq!(session.set_name(id, "2").unwrap(), EditOutcome::Unchanged);
    assert!(session.scene_mut().take_dirty().is_empty());

    session.set_name(id, "X").unwrap();
    assert!(session.scene().is_dirty(id));
    assert!(session.scene().is_dirty(note_id));
}

#[test]
fn annotation_held_by_proxy_survives_reload() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("future.json");

    let mut annotation =
        serde_json::to_value(Annotation::new(Point::new(5.0, 0.0), ObjectId(1))).unwrap();
    annotation["id"] = json!(2);
    let document = json!({
        "version": 1,
        "next_id": 3,
        "anchors": [{
            "id": 1,
            "record": { "Major": 2, "Minor": 0, "SNoteID": 2 }
        }],
        "annotations": [annotation]
    });
    std::fs::write(&path, document.to_string()).unwrap();

    let (scene, report) = load_scene(&path, &LinkConfig::default()).unwrap();
    assert_eq!(report.proxies, vec![ObjectId(1)]);
    let loaded = Session::from_loaded(scene, LinkConfig::default());
    assert!(loaded.scene().annotation(ObjectId(2)).is_some());
    assert_consistent(&loaded);

    save_scene(loaded.scene(), &path).unwrap();
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved["anchors"][0]["record"]["SNoteID"], json!(2));
    assert_eq!(saved["annotations"][0]["id"], json!(2));
}
