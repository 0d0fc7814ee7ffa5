use system::serde_json::json;
use system::{
    ActivityKind, DocumentLimits, Overlay, SessionCommand, SessionDocument, SessionEvent,
};

fn apply(doc: &mut SessionDocument, raw: &str) {
    match SessionCommand::from_json(raw).expect("valid command") {
        SessionCommand::JoinSession(c) => {
            doc.admit(&c.user_id, &c.username);
        }
        SessionCommand::OverlayCreate(c) => {
            doc.upsert_overlay(c.overlay);
        }
        SessionCommand::OverlayUpdate(c) => {
            doc.update_overlay(&c.overlay_id, &c.updates).expect("");
        }
        SessionCommand::OverlayDelete(c) => {
            doc.remove_overlay(&c.overlay_id).expect("");
        }
        SessionCommand::Operation(c) => doc.append_operation(c.operation),
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn it_replays_a_timeline_edit_from_wire_commands() {
    let mut doc = SessionDocument::new(&DocumentLimits::default());

    apply(&mut doc, r#"{"event":"join-session","data":{"sessionId":"s1","userId":"a","username":"A"}}"#);
    apply(&mut doc, r#"{"event":"join-session","data":{"sessionId":"s1","userId":"b","username":"B"}}"#);
    apply(&mut doc, r#"{"event":"overlay-create","data":{"sessionId":"s1","overlay":{"id":"ov1","x":10,"y":20,"start":1.5}}}"#);
    apply(&mut doc, r#"{"event":"overlay-update","data":{"sessionId":"s1","overlayId":"ov1","updates":{"y":25}}}"#);
    apply(&mut doc, r#"{"event":"operation","data":{"sessionId":"s1","operation":{"type":"move","target":"ov1"}}}"#);

    let snapshot = doc.snapshot(&"s1".to_owned());
    assert_eq!(snapshot.users.len(), 2);
    assert_eq!(snapshot.operations, vec![json!({ "type": "move", "target": "ov1" })]);
    assert_eq!(
        snapshot.overlays,
        vec![system::serde_json::from_value::<Overlay>(json!({
            "id": "ov1", "x": 10, "y": 25, "start": 1.5
        }))
        .expect("")]
    );

    let wire = SessionEvent::SessionState(snapshot).to_json().expect("");
    let value: system::serde_json::Value = system::serde_json::from_str(&wire).expect("");
    assert_eq!(value["event"], json!("session-state"));
    assert_eq!(value["data"]["sessionId"], json!("s1"));
    assert_eq!(value["data"]["users"][1]["userId"], json!("b"));

    apply(&mut doc, r#"{"event":"overlay-delete","data":{"sessionId":"s1","overlayId":"ov1"}}"#);
    assert!(doc.overlays().is_empty());
}

#[test]
fn activity_is_bounded_per_document() {
    let mut doc = SessionDocument::new(&DocumentLimits {
        max_operations: None,
        activity_limit: 2,
    });
    doc.record_activity(ActivityKind::OverlayCreated, Some("a".into()), json!({ "id": "o1" }));
    doc.record_activity(ActivityKind::OverlayDeleted, Some("a".into()), json!("o1"));
    doc.record_activity(ActivityKind::ChatMessage, Some("b".into()), json!("hi"));

    let recent = doc.recent_activity(50);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].kind, ActivityKind::OverlayDeleted);
    assert_eq!(recent[1].user_id.as_deref(), Some("b"));
}
