mod support;

use chrono::Duration;
use deptnav_backend::engine::{ChangeKind, DragState, EngineSettings, MoveOutcome};
use deptnav_backend::errors::AppError;
use deptnav_backend::models::department::SectionId;
use support::{harness, harness_with, ids, member, placements, scope, super_admin};
use tokio::sync::broadcast::error::TryRecvError;

#[tokio::test]
async fn moving_finance_to_operations_and_undoing_it() {
    let h = harness(&["hr", "finance", "sales"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();
    assert_eq!(ids(&h.engine, SectionId::Departments), vec!["hr", "finance", "sales"]);

    h.engine.drag_start(&admin, "finance").unwrap();
    let outcome = h
        .engine
        .drag_end(&admin, "finance", SectionId::Operations, 0)
        .await
        .unwrap();
    assert!(matches!(outcome, MoveOutcome::Moved(_)));

    assert_eq!(ids(&h.engine, SectionId::Departments), vec!["hr", "sales"]);
    assert_eq!(ids(&h.engine, SectionId::Operations), vec!["finance"]);

    h.engine.load().await.unwrap();
    assert_eq!(ids(&h.engine, SectionId::Departments), vec!["hr", "sales"]);
    assert_eq!(ids(&h.engine, SectionId::Operations), vec!["finance"]);
    assert!(h.engine.assignments().iter().all(|t| t.is_persisted()));

    h.engine.undo_last_move(&admin).await.unwrap();
    assert_eq!(ids(&h.engine, SectionId::Departments), vec!["hr", "finance", "sales"]);
    assert!(ids(&h.engine, SectionId::Operations).is_empty());
}

#[tokio::test]
async fn dropping_on_the_current_slot_writes_nothing() {
    let h = harness(&["hr", "finance", "sales"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();

    h.engine.drag_start(&admin, "finance").unwrap();
    let outcome = h
        .engine
        .drag_end(&admin, "finance", SectionId::Departments, 1)
        .await
        .unwrap();

    assert_eq!(outcome, MoveOutcome::Unchanged);
    assert_eq!(h.store.write_calls(), 0);
    assert_eq!(h.engine.undo_depth(), 0);
    assert_eq!(h.engine.drag_state(&admin), DragState::Idle);
}

#[tokio::test]
async fn zero_affected_rows_restores_local_state() {
    let h = harness(&["hr", "finance", "sales"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();
    h.engine
        .drag_end(&admin, "hr", SectionId::Admin, 0)
        .await
        .unwrap();

    let before = h.engine.assignments();
    let view_before = h.engine.sections();
    h.store.set_zero_row_writes(true);

    let err = h
        .engine
        .drag_end(&admin, "hr", SectionId::Operations, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ZeroRowsAffected(_)));
    assert_eq!(h.engine.assignments(), before);
    assert_eq!(h.engine.sections(), view_before);

    let err = h
        .engine
        .drag_end(&admin, "finance", SectionId::Operations, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ZeroRowsAffected(_)));
    assert_eq!(h.engine.assignments(), before);
    assert_eq!(h.engine.undo_depth(), 1);
}

#[tokio::test]
async fn transient_failure_rolls_back_and_stays_silent() {
    let h = harness(&["hr", "finance"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();
    let mut events = h.engine.subscribe();

    h.store.fail_next(AppError::TransientFailure("connection reset".into()));
    let err = h
        .engine
        .drag_end(&admin, "finance", SectionId::Admin, 0)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::TransientFailure(_)));
    assert!(h.engine.assignments().is_empty());
    assert_eq!(ids(&h.engine, SectionId::Departments), vec!["hr", "finance"]);
    assert_eq!(h.engine.undo_depth(), 0);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn members_cannot_move_departments() {
    let h = harness(&["hr", "finance"]);
    h.engine.load().await.unwrap();

    let err = h
        .engine
        .drag_end(&member(), "finance", SectionId::Admin, 0)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::PermissionDenied(_)));
    assert_eq!(h.store.write_calls(), 0);
    assert!(h.engine.assignments().is_empty());
}

#[tokio::test]
async fn undo_restores_the_original_slot_once() {
    let h = harness(&["reports", "logistics", "inventory", "quality"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();
    assert_eq!(ids(&h.engine, SectionId::Departments), vec!["reports"]);

    h.engine
        .drag_end(&admin, "reports", SectionId::Operations, 2)
        .await
        .unwrap();
    let moved = h.engine.sections();
    let reports = moved.find("reports").unwrap();
    assert_eq!((reports.section_id, reports.display_order), (SectionId::Operations, 2));
    assert_eq!(h.engine.undo_depth(), 1);

    let receipt = h.engine.undo_last_move(&admin).await.unwrap();
    assert_eq!(receipt.section_id, Some(SectionId::Departments));
    let restored = h.engine.sections();
    let reports = restored.find("reports").unwrap();
    assert_eq!((reports.section_id, reports.display_order), (SectionId::Departments, 0));
    assert_eq!(h.engine.undo_depth(), 0);

    let err = h.engine.undo_last_move(&admin).await.unwrap_err();
    assert_eq!(err, AppError::NothingToUndo);
}

#[tokio::test]
async fn expired_undo_entries_are_ignored_before_the_sweep() {
    let settings = EngineSettings {
        undo_ttl: Duration::zero(),
        ..EngineSettings::default()
    };
    let h = harness_with(&["hr", "finance"], settings);
    let admin = super_admin();
    h.engine.load().await.unwrap();
    h.engine
        .drag_end(&admin, "finance", SectionId::Admin, 0)
        .await
        .unwrap();
    let writes = h.store.write_calls();

    let err = h.engine.undo_last_move(&admin).await.unwrap_err();
    assert_eq!(err, AppError::NothingToUndo);
    assert_eq!(h.store.write_calls(), writes);

    assert_eq!(h.engine.sweep_undo(), 1);
}

#[tokio::test]
async fn missing_store_is_cached_until_retry() {
    let h = harness(&["hr", "finance"]);
    let admin = super_admin();
    h.store.set_unavailable(true);

    let view = h.engine.load().await.unwrap();
    assert!(h.engine.is_fallback());
    assert_eq!(view.ids(SectionId::Departments), vec!["hr", "finance"]);
    assert_eq!(h.store.list_calls(), 1);

    h.engine.load().await.unwrap();
    assert_eq!(h.store.list_calls(), 1);

    let err = h
        .engine
        .drag_end(&admin, "finance", SectionId::Admin, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ReadOnly(_)));
    let err = h.engine.reset_all(&admin).await.unwrap_err();
    assert!(matches!(err, AppError::ReadOnly(_)));
    assert_eq!(h.store.write_calls(), 0);

    h.store.set_unavailable(false);
    h.engine.retry().await.unwrap();
    assert_eq!(h.store.list_calls(), 2);
    assert!(!h.engine.is_fallback());
    h.engine
        .drag_end(&admin, "finance", SectionId::Admin, 0)
        .await
        .unwrap();
}

#[tokio::test]
async fn other_load_errors_are_returned_not_cached() {
    let h = harness(&["hr"]);
    h.store.fail_next(AppError::TransientFailure("timeout".into()));

    assert!(h.engine.load().await.is_err());
    assert!(!h.engine.is_fallback());
    h.engine.load().await.unwrap();
    assert_eq!(h.store.list_calls(), 2);
}

#[tokio::test]
async fn successful_moves_are_broadcast() {
    let h = harness(&["hr", "finance", "sales"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();
    let mut nav = h.engine.subscribe();
    let mut dashboard = h.engine.subscribe();

    h.engine
        .drag_end(&admin, "finance", SectionId::Operations, 0)
        .await
        .unwrap();

    let event = nav.recv().await.unwrap();
    assert_eq!(event.kind, ChangeKind::Moved);
    assert_eq!(event.department_id.as_deref(), Some("finance"));
    assert_eq!(event.section_id, Some(SectionId::Operations));
    assert_eq!(event.affected_rows, 1);
    assert_eq!(dashboard.recv().await.unwrap(), event);
}

#[tokio::test]
async fn cancelling_a_drag_touches_nothing() {
    let h = harness(&["hr", "finance", "sales"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();
    let lists = h.store.list_calls();

    h.engine.drag_start(&admin, "finance").unwrap();
    h.engine.drag_over(&admin, Some("sales")).unwrap();
    assert_eq!(
        h.engine.drag_state(&admin),
        DragState::Dragging {
            active_id: "finance".into(),
            over_id: Some("sales".into())
        }
    );

    h.engine.drag_cancel(&admin);
    assert_eq!(h.engine.drag_state(&admin), DragState::Idle);
    assert_eq!(h.store.write_calls(), 0);
    assert_eq!(h.store.list_calls(), lists);

    let err = h.engine.drag_over(&admin, None).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(matches!(
        h.engine.drag_start(&admin, "ghost"),
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn reordering_within_a_section_persists_the_whole_order() {
    let h = harness(&["hr", "finance", "sales"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();

    h.engine
        .drag_end(&admin, "sales", SectionId::Departments, 0)
        .await
        .unwrap();

    assert_eq!(ids(&h.engine, SectionId::Departments), vec!["sales", "hr", "finance"]);
    let stored = placements(
        h.store
            .snapshot(&scope())
            .into_iter()
            .map(|a| (a.department_id, a.section_id, a.display_order)),
    );
    assert_eq!(
        stored,
        placements(vec![
            ("sales".to_string(), SectionId::Departments, 0),
            ("hr".to_string(), SectionId::Departments, 1),
            ("finance".to_string(), SectionId::Departments, 2),
        ])
    );
}

#[tokio::test]
async fn move_to_section_appends_after_the_last_entry() {
    let h = harness(&["hr", "finance", "logistics", "tasks"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();

    h.engine
        .move_to_section(&admin, "hr", SectionId::Operations)
        .await
        .unwrap();
    assert_eq!(ids(&h.engine, SectionId::Operations), vec!["logistics", "tasks", "hr"]);

    h.engine
        .move_to_section(&admin, "finance", SectionId::Documents)
        .await
        .unwrap();
    let view = h.engine.sections();
    assert_eq!(view.find("finance").unwrap().display_order, 0);
}

#[tokio::test]
async fn explicit_section_order_is_saved() {
    let h = harness(&["hr", "finance", "sales"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();

    let order = vec!["finance".to_string(), "sales".to_string(), "hr".to_string()];
    let receipt = h
        .engine
        .reorder_section(&admin, SectionId::Departments, &order)
        .await
        .unwrap();
    assert_eq!(receipt.affected_rows, 3);
    assert_eq!(ids(&h.engine, SectionId::Departments), vec!["finance", "sales", "hr"]);

    let duplicate = vec!["hr".to_string(), "hr".to_string()];
    assert!(matches!(
        h.engine.reorder_section(&admin, SectionId::Departments, &duplicate).await,
        Err(AppError::BadRequest(_))
    ));
}

#[tokio::test]
async fn visibility_rename_and_reset() {
    let h = harness(&["hr", "finance", "sales"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();

    h.engine.toggle_visibility(&admin, "finance").await.unwrap();
    for section in SectionId::ALL {
        assert!(!ids(&h.engine, section).contains(&"finance".to_string()));
    }

    h.engine
        .rename(&admin, "hr", Some("People Ops".into()), None)
        .await
        .unwrap();
    assert_eq!(h.engine.sections().find("hr").unwrap().name, "People Ops");

    h.engine.reset_department(&admin, "finance").await.unwrap();
    assert_eq!(ids(&h.engine, SectionId::Departments), vec!["hr", "finance", "sales"]);

    let receipt = h.engine.reset_department(&admin, "sales").await.unwrap();
    assert_eq!(receipt.affected_rows, 0);

    h.engine
        .drag_end(&admin, "sales", SectionId::Admin, 0)
        .await
        .unwrap();
    assert_eq!(h.engine.undo_depth(), 1);
    h.engine.reset_all(&admin).await.unwrap();
    assert!(h.store.snapshot(&scope()).is_empty());
    assert_eq!(h.engine.undo_depth(), 0);
    assert_eq!(h.engine.sections().find("hr").unwrap().name, "Hr");
}

#[tokio::test]
async fn failed_reset_keeps_the_override() {
    let h = harness(&["hr", "finance"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();
    h.engine.toggle_visibility(&admin, "finance").await.unwrap();
    let before = h.engine.assignments();

    h.store.set_zero_row_writes(true);
    let err = h.engine.reset_department(&admin, "finance").await.unwrap_err();
    assert!(matches!(err, AppError::ZeroRowsAffected(_)));
    assert_eq!(h.engine.assignments(), before);
}

// Interleaved gestures are not serialized. Only convergence with the store
// after the last reload is guaranteed, not which move "wins" locally.
#[tokio::test]
async fn interleaved_moves_converge_after_reload() {
    let h = harness(&["hr", "finance", "sales"]);
    let first = super_admin();
    let mut second = super_admin();
    second.user_id = "admin-2".into();
    h.engine.load().await.unwrap();

    let (a, b) = tokio::join!(
        h.engine.drag_end(&first, "hr", SectionId::Admin, 0),
        h.engine.drag_end(&second, "sales", SectionId::Admin, 0),
    );
    a.unwrap();
    b.unwrap();

    let local = placements(h.engine.assignments().iter().map(|t| {
        let a = t.assignment();
        (a.department_id.clone(), a.section_id, a.display_order)
    }));
    let stored = placements(
        h.store
            .snapshot(&scope())
            .into_iter()
            .map(|a| (a.department_id, a.section_id, a.display_order)),
    );
    assert_eq!(local, stored);
    assert!(h.engine.assignments().iter().all(|t| t.is_persisted()));
    assert_eq!(ids(&h.engine, SectionId::Admin).len(), 2);
}

#[tokio::test]
async fn moving_into_a_section_of_defaults_lands_at_the_requested_index() {
    let h = harness(&["logistics", "inventory", "quality", "reports"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();

    h.engine
        .drag_end(&admin, "reports", SectionId::Operations, 0)
        .await
        .unwrap();
    assert_eq!(
        ids(&h.engine, SectionId::Operations),
        vec!["reports", "logistics", "inventory", "quality"]
    );
    assert!(ids(&h.engine, SectionId::Departments).is_empty());

    h.engine.undo_last_move(&admin).await.unwrap();
    assert_eq!(ids(&h.engine, SectionId::Departments), vec!["reports"]);
    assert_eq!(
        ids(&h.engine, SectionId::Operations),
        vec!["logistics", "inventory", "quality"]
    );
}

#[tokio::test]
async fn moving_back_into_a_section_of_defaults_keeps_its_slot() {
    let h = harness(&["hr", "finance", "sales", "legal"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();

    h.engine
        .drag_end(&admin, "legal", SectionId::Admin, 0)
        .await
        .unwrap();
    h.engine
        .drag_end(&admin, "legal", SectionId::Departments, 1)
        .await
        .unwrap();

    assert_eq!(
        ids(&h.engine, SectionId::Departments),
        vec!["hr", "legal", "finance", "sales"]
    );
}

#[tokio::test]
async fn undoing_a_reorder_restores_the_section_order() {
    let h = harness(&["hr", "finance", "sales"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();

    h.engine
        .drag_end(&admin, "sales", SectionId::Departments, 0)
        .await
        .unwrap();
    assert_eq!(ids(&h.engine, SectionId::Departments), vec!["sales", "hr", "finance"]);

    h.engine.undo_last_move(&admin).await.unwrap();
    assert_eq!(ids(&h.engine, SectionId::Departments), vec!["hr", "finance", "sales"]);

    h.engine.load().await.unwrap();
    assert_eq!(ids(&h.engine, SectionId::Departments), vec!["hr", "finance", "sales"]);
}

#[tokio::test]
async fn missing_store_on_write_switches_to_read_only() {
    let h = harness(&["hr", "finance"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();
    h.store.set_unavailable(true);

    let err = h
        .engine
        .drag_end(&admin, "finance", SectionId::Admin, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StoreUnavailable(_)));
    assert!(h.engine.is_fallback());
    assert_eq!(h.store.write_calls(), 1);

    let err = h
        .engine
        .drag_end(&admin, "finance", SectionId::Admin, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ReadOnly(_)));
    assert_eq!(h.store.write_calls(), 1);

    h.engine.load().await.unwrap();
    assert_eq!(h.store.list_calls(), 1);
}

#[tokio::test]
async fn dropping_a_different_department_than_dragged_is_rejected() {
    let h = harness(&["hr", "finance", "sales"]);
    let admin = super_admin();
    h.engine.load().await.unwrap();

    h.engine.drag_start(&admin, "hr").unwrap();
    let err = h
        .engine
        .drag_end(&admin, "finance", SectionId::Admin, 0)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(h.store.write_calls(), 0);
    assert_eq!(
        h.engine.drag_state(&admin),
        DragState::Dragging {
            active_id: "hr".into(),
            over_id: None
        }
    );

    h.engine
        .drag_end(&admin, "hr", SectionId::Admin, 0)
        .await
        .unwrap();
    assert_eq!(h.engine.drag_state(&admin), DragState::Idle);
}
