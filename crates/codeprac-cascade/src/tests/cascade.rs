use codeprac_core::{
  entity::{
    EntityKind, EntityRef, ExternalId, NewBatch, NewCollege, NewDepartment,
    NewNote, NewPerformance, NewQuestion, NewStudent, NewTopic, Outcome,
  },
  lifecycle::{LifecycleState, Operation},
  store::EntityStore,
};
use std::sync::Arc;
use uuid::Uuid;

use super::fakes::{BrokenAudit, RecordingGateway, harness, test_config};
use crate::{Engine, Error, WarningSource, plan};

// ─── Fixture ─────────────────────────────────────────────────────────────────

/// C1 ⊃ D1 ⊃ B1 ⊃ {S1, S2}, with one topic, two questions, one note and two
/// performance records per student.
struct Campus {
  c1: Uuid,
  d1: Uuid,
  b1: Uuid,
  s1: Uuid,
  s2: Uuid,
  t1: Uuid,
  q1: Uuid,
  q2: Uuid,
  n1: Uuid,
}

fn ext(name: &str) -> Option<ExternalId> { Some(ExternalId(format!("ext-{name}"))) }

async fn campus<S: EntityStore>(s: &S) -> Campus {
  let c1 = s
    .create_college(NewCollege {
      name:         "Northfield".into(),
      email:        Some("admin@northfield.edu".into()),
      external_ref: ext("c1"),
    })
    .await
    .unwrap()
    .college_id;
  let d1 = s
    .create_department(NewDepartment {
      college_id:   c1,
      name:         "Computer Science".into(),
      email:        Some("cs@northfield.edu".into()),
      external_ref: ext("d1"),
    })
    .await
    .unwrap()
    .department_id;
  let b1 = s
    .create_batch(NewBatch {
      department_id: d1,
      name:          "2025-A".into(),
      email:         Some("cs-2025a@northfield.edu".into()),
      external_ref:  ext("b1"),
    })
    .await
    .unwrap()
    .batch_id;

  let mut students = Vec::new();
  for name in ["s1", "s2"] {
    let student = s
      .create_student(NewStudent {
        batch_id:                b1,
        username:                name.into(),
        email:                   format!("{name}@northfield.edu"),
        external_ref:            ext(name),
        password_reset_required: false,
      })
      .await
      .unwrap();
    students.push(student.student_id);
  }

  let t1 = s
    .create_topic(NewTopic { department_id: d1, name: "Graphs".into() })
    .await
    .unwrap()
    .topic_id;
  let q1 = s
    .create_question(NewQuestion {
      topic_id: t1,
      batch_id: Some(b1),
      title:    "Shortest path".into(),
    })
    .await
    .unwrap()
    .question_id;
  let q2 = s
    .create_question(NewQuestion {
      topic_id: t1,
      batch_id: None,
      title:    "Cycle detection".into(),
    })
    .await
    .unwrap()
    .question_id;
  let n1 = s
    .create_note(NewNote { topic_id: t1, title: "BFS vs DFS".into() })
    .await
    .unwrap()
    .note_id;

  for &student_id in &students {
    for question_id in [q1, q2] {
      s.record_performance(NewPerformance {
        student_id,
        question_id,
        outcome: Outcome::Passed,
      })
      .await
      .unwrap();
    }
  }

  Campus { c1, d1, b1, s1: students[0], s2: students[1], t1, q1, q2, n1 }
}

/// D2 ⊃ B2 ⊃ S3 next to D1 under the same college.
async fn sibling<S: EntityStore>(s: &S, c1: Uuid) -> (Uuid, Uuid, Uuid) {
  let d2 = s
    .create_department(NewDepartment {
      college_id:   c1,
      name:         "Mathematics".into(),
      email:        None,
      external_ref: ext("d2"),
    })
    .await
    .unwrap()
    .department_id;
  let b2 = s
    .create_batch(NewBatch {
      department_id: d2,
      name:          "2025-M".into(),
      email:         None,
      external_ref:  ext("b2"),
    })
    .await
    .unwrap()
    .batch_id;
  let s3 = s
    .create_student(NewStudent {
      batch_id:                b2,
      username:                "s3".into(),
      email:                   "s3@northfield.edu".into(),
      external_ref:            ext("s3"),
      password_reset_required: false,
    })
    .await
    .unwrap()
    .student_id;
  (d2, b2, s3)
}

async fn state_of<S: EntityStore>(s: &S, entity: EntityRef) -> LifecycleState {
  s.get(entity)
    .await
    .unwrap()
    .and_then(|e| e.state())
    .expect("hierarchy node exists")
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deleting_a_college_removes_its_whole_subtree() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;

  let result = h
    .engine
    .delete_node(EntityKind::College, c.c1, "admin-1")
    .await
    .unwrap();

  assert!(result.success);
  assert!(result.warnings.is_empty());
  assert_eq!(result.counts.get(EntityKind::Student), 2);
  assert_eq!(result.counts.get(EntityKind::Batch), 1);
  assert_eq!(result.counts.get(EntityKind::Department), 1);
  assert_eq!(result.counts.get(EntityKind::College), 1);
  assert_eq!(result.counts.get(EntityKind::Performance), 4);
  assert_eq!(result.counts.get(EntityKind::Topic), 1);
  assert_eq!(result.counts.get(EntityKind::Question), 2);
  assert_eq!(result.counts.get(EntityKind::Note), 1);

  for gone in [
    EntityRef::college(c.c1),
    EntityRef::department(c.d1),
    EntityRef::batch(c.b1),
    EntityRef::student(c.s1),
    EntityRef::student(c.s2),
    EntityRef::topic(c.t1),
    EntityRef::question(c.q1),
    EntityRef::note(c.n1),
  ] {
    assert!(h.store.get(gone).await.unwrap().is_none(), "{gone} survived");
  }

  let again = h.engine.delete_node(EntityKind::College, c.c1, "admin-1").await;
  assert!(matches!(again, Err(Error::NotFound(r)) if r == EntityRef::college(c.c1)));
}

#[tokio::test]
async fn delete_plan_never_removes_a_parent_before_its_children() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;

  let plan = plan(h.store.as_ref(), EntityRef::college(c.c1), Operation::Delete)
    .await
    .unwrap();
  assert_eq!(plan.len(), 13);

  for (i, step) in plan.steps.iter().enumerate() {
    let entity = h.store.get(*step).await.unwrap().unwrap();
    if let Some(parent) = entity.parent()
      && let Some(p) = plan.position(parent)
    {
      assert!(p > i, "{parent} planned before its child {step}");
    }
  }
  assert_eq!(plan.steps.last(), Some(&EntityRef::college(c.c1)));
}

#[tokio::test]
async fn delete_mirrors_as_disable_on_the_directory() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;

  h.engine
    .delete_node(EntityKind::Batch, c.b1, "admin-1")
    .await
    .unwrap();

  let mut disabled = h.gateway.disabled();
  disabled.sort();
  assert_eq!(disabled, vec!["ext-b1", "ext-s1", "ext-s2"]);
  assert!(h.gateway.enabled().is_empty());
}

#[tokio::test]
async fn deleting_a_batch_keeps_department_wide_content() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;

  let result = h
    .engine
    .delete_node(EntityKind::Batch, c.b1, "admin-1")
    .await
    .unwrap();

  assert_eq!(result.counts.get(EntityKind::Question), 1);
  assert_eq!(result.counts.get(EntityKind::Topic), 0);
  assert!(h.store.get(EntityRef::question(c.q1)).await.unwrap().is_none());
  assert!(h.store.get(EntityRef::question(c.q2)).await.unwrap().is_some());
  assert!(h.store.get(EntityRef::department(c.d1)).await.unwrap().is_some());
}

#[tokio::test]
async fn deleting_a_student_takes_only_their_records() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;

  let result = h
    .engine
    .delete_node(EntityKind::Student, c.s1, "admin-1")
    .await
    .unwrap();

  assert_eq!(result.counts.get(EntityKind::Student), 1);
  assert_eq!(result.counts.get(EntityKind::Performance), 2);
  assert_eq!(result.counts.total(), 3);
  assert!(h.store.get(EntityRef::student(c.s2)).await.unwrap().is_some());
}

// ─── Disable / enable ────────────────────────────────────────────────────────

#[tokio::test]
async fn disabling_a_department_leaves_siblings_untouched() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;
  let (d2, b2, s3) = sibling(h.store.as_ref(), c.c1).await;

  let result = h
    .engine
    .disable_node(EntityKind::Department, c.d1, "admin-1")
    .await
    .unwrap();

  assert_eq!(result.counts.get(EntityKind::Department), 1);
  assert_eq!(result.counts.get(EntityKind::Batch), 1);
  assert_eq!(result.counts.get(EntityKind::Student), 2);
  assert_eq!(result.counts.total(), 4);

  let s = h.store.as_ref();
  for node in [
    EntityRef::department(c.d1),
    EntityRef::batch(c.b1),
    EntityRef::student(c.s1),
    EntityRef::student(c.s2),
  ] {
    assert_eq!(state_of(s, node).await, LifecycleState::Disabled, "{node}");
  }
  for node in [
    EntityRef::college(c.c1),
    EntityRef::department(d2),
    EntityRef::batch(b2),
    EntityRef::student(s3),
  ] {
    assert_eq!(state_of(s, node).await, LifecycleState::Active, "{node}");
  }

  // Content has no lifecycle and is never touched by a disable.
  assert!(s.get(EntityRef::question(c.q1)).await.unwrap().is_some());
}

#[tokio::test]
async fn disable_plan_is_top_down() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;

  let plan = plan(h.store.as_ref(), EntityRef::college(c.c1), Operation::Disable)
    .await
    .unwrap();

  let kinds: Vec<_> = plan.steps.iter().map(|s| s.kind).collect();
  assert_eq!(kinds, vec![
    EntityKind::College,
    EntityKind::Department,
    EntityKind::Batch,
    EntityKind::Student,
    EntityKind::Student,
  ]);
}

#[tokio::test]
async fn disabling_twice_reports_identical_counts() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;

  let first = h
    .engine
    .disable_node(EntityKind::Batch, c.b1, "admin-1")
    .await
    .unwrap();
  let second = h
    .engine
    .disable_node(EntityKind::Batch, c.b1, "admin-1")
    .await
    .unwrap();

  assert_eq!(first.counts, second.counts);
  assert_eq!(
    state_of(h.store.as_ref(), EntityRef::student(c.s1)).await,
    LifecycleState::Disabled
  );
}

#[tokio::test]
async fn disable_then_enable_restores_every_descendant() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;

  h.engine
    .disable_node(EntityKind::College, c.c1, "admin-1")
    .await
    .unwrap();
  let enabled = h
    .engine
    .enable_node(EntityKind::College, c.c1, "admin-1")
    .await
    .unwrap();

  assert_eq!(enabled.counts.total(), 5);
  for node in [
    EntityRef::college(c.c1),
    EntityRef::department(c.d1),
    EntityRef::batch(c.b1),
    EntityRef::student(c.s1),
    EntityRef::student(c.s2),
  ] {
    assert_eq!(state_of(h.store.as_ref(), node).await, LifecycleState::Active);
  }
  assert_eq!(h.gateway.enabled().len(), 5);
}

#[tokio::test]
async fn enabling_beneath_a_disabled_ancestor_is_rejected() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;

  h.engine
    .disable_node(EntityKind::College, c.c1, "admin-1")
    .await
    .unwrap();
  let err = h
    .engine
    .enable_node(EntityKind::Batch, c.b1, "admin-1")
    .await
    .unwrap_err();

  assert_eq!(err.code(), "VALIDATION_ERROR");
  assert!(matches!(
    err,
    Error::AncestorDisabled { ancestor, .. } if ancestor == EntityRef::department(c.d1)
  ));
  assert_eq!(
    state_of(h.store.as_ref(), EntityRef::batch(c.b1)).await,
    LifecycleState::Disabled
  );
}

// ─── Collaborator failures ───────────────────────────────────────────────────

#[tokio::test]
async fn gateway_failure_on_one_student_does_not_stop_the_rest() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;
  h.gateway.fail_on("ext-s1");

  let result = h
    .engine
    .disable_node(EntityKind::Batch, c.b1, "admin-1")
    .await
    .unwrap();

  assert!(result.success);
  assert_eq!(result.counts.get(EntityKind::Student), 2);
  assert_eq!(result.warnings.len(), 1);
  assert_eq!(result.warnings[0].entity, EntityRef::student(c.s1));
  assert_eq!(result.warnings[0].source, WarningSource::Identity);
  assert_eq!(
    state_of(h.store.as_ref(), EntityRef::student(c.s1)).await,
    LifecycleState::Disabled
  );
  assert_eq!(
    state_of(h.store.as_ref(), EntityRef::student(c.s2)).await,
    LifecycleState::Disabled
  );
}

#[tokio::test]
async fn slow_gateway_calls_are_abandoned_after_the_timeout() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;
  h.gateway.stall_on("ext-s2");

  let result = h
    .engine
    .disable_node(EntityKind::Student, c.s2, "admin-1")
    .await
    .unwrap();

  assert!(result.success);
  assert_eq!(result.warnings.len(), 1);
  assert!(result.warnings[0].message.contains("timed out"));
  assert_eq!(
    state_of(h.store.as_ref(), EntityRef::student(c.s2)).await,
    LifecycleState::Disabled
  );
}

#[tokio::test]
async fn audit_failure_is_only_a_warning() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;
  let engine = Engine::new(
    Arc::clone(&h.store),
    Arc::new(RecordingGateway::default()),
    Arc::new(BrokenAudit),
    test_config(),
  );

  let result = engine
    .disable_node(EntityKind::Department, c.d1, "admin-1")
    .await
    .unwrap();

  assert!(result.success);
  assert_eq!(result.warnings.len(), 1);
  assert_eq!(result.warnings[0].source, WarningSource::Audit);
  assert_eq!(result.warnings[0].entity, EntityRef::department(c.d1));
}

#[tokio::test]
async fn store_failure_halts_and_a_retry_converges() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;
  let college = EntityRef::college(c.c1);
  h.store.break_writes_to(EntityRef::batch(c.b1));

  let err = h
    .engine
    .delete_node(EntityKind::College, c.c1, "admin-1")
    .await
    .unwrap_err();

  assert_eq!(err.code(), "PARTIAL_CASCADE_FAILURE");
  let partial = err.partial().expect("partial result");
  assert!(!partial.success);
  assert_eq!(partial.error.as_ref().unwrap().entity, EntityRef::batch(c.b1));
  assert_eq!(partial.counts.get(EntityKind::Student), 2);
  assert_eq!(partial.counts.get(EntityKind::Performance), 4);
  assert_eq!(partial.counts.get(EntityKind::Batch), 0);
  assert_eq!(partial.counts.get(EntityKind::College), 0);

  // Nothing above the failure point was removed.
  assert!(h.store.get(EntityRef::batch(c.b1)).await.unwrap().is_some());
  assert!(h.store.get(college).await.unwrap().is_some());

  let audit = h.store.inner.audit_entries(Some(college)).await.unwrap();
  assert_eq!(audit.len(), 1);
  assert_eq!(audit[0].details["success"], false);

  h.store.repair();
  let retried = h
    .engine
    .delete_node(EntityKind::College, c.c1, "admin-1")
    .await
    .unwrap();

  assert!(retried.success);
  assert_eq!(retried.counts.get(EntityKind::Batch), 1);
  assert_eq!(retried.counts.get(EntityKind::Department), 1);
  assert_eq!(retried.counts.get(EntityKind::College), 1);
  assert_eq!(retried.counts.get(EntityKind::Student), 0);
  assert!(h.store.get(college).await.unwrap().is_none());
}

// ─── Audit and validation ────────────────────────────────────────────────────

#[tokio::test]
async fn each_cascade_appends_exactly_one_audit_entry() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;

  h.engine
    .disable_node(EntityKind::College, c.c1, "admin-7")
    .await
    .unwrap();

  let all = h.store.inner.audit_entries(None).await.unwrap();
  assert_eq!(all.len(), 1);
  let entry = &all[0];
  assert_eq!(entry.action, "disable_college_cascade");
  assert_eq!(entry.actor_id, "admin-7");
  assert_eq!(entry.target, EntityRef::college(c.c1));
  assert_eq!(entry.details["counts"]["students"], 2);
  assert_eq!(entry.details["success"], true);
}

#[tokio::test]
async fn string_entry_point_validates_its_arguments() {
  let h = harness().await;
  let c = campus(h.store.as_ref()).await;

  let err = h.engine.run("campus", c.c1, "disable", "admin-1").await.unwrap_err();
  assert_eq!(err.code(), "VALIDATION_ERROR");

  let err = h.engine.run("college", c.c1, "archive", "admin-1").await.unwrap_err();
  assert_eq!(err.code(), "VALIDATION_ERROR");

  let err = h.engine.run("topic", c.t1, "delete", "admin-1").await.unwrap_err();
  assert_eq!(err.code(), "VALIDATION_ERROR");

  let err = h
    .engine
    .run("departments", Uuid::new_v4(), "disable", "admin-1")
    .await
    .unwrap_err();
  assert_eq!(err.code(), "NOT_FOUND");

  // Rejected invocations mutate nothing and leave no audit trail.
  assert!(h.store.inner.audit_entries(None).await.unwrap().is_empty());

  let ok = h.engine.run("Batches", c.b1, "DISABLE", "admin-1").await.unwrap();
  assert_eq!(ok.counts.total(), 3);
}
