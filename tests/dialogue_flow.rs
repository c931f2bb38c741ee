//! End-to-end dialogue tests against an in-memory libSQL store.
//!
//! Messages go in as transport payloads, exactly as a channel would hand
//! them to the engine, and the stored records are checked directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use student_intake::dialogue::{
    Controls, DialogueEngine, DialogueState, DialogueStep, Outbound, Payload, Reply, prompts,
};
use student_intake::error::DatabaseError;
use student_intake::store::{Database, LibSqlBackend};
use student_intake::students::{StudentRecord, UserId};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const JANE: UserId = UserId(1001);

async fn setup() -> (DialogueEngine, Arc<LibSqlBackend>) {
    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let engine = DialogueEngine::new(db.clone());
    (engine, db)
}

async fn say(engine: &DialogueEngine, user: UserId, text: &str) -> Vec<Outbound> {
    engine.handle_payload(user, &Payload::Text(text.into())).await
}

async fn press(engine: &DialogueEngine, user: UserId, data: &str) -> Vec<Outbound> {
    engine.handle_payload(user, &Payload::Control(data.into())).await
}

fn texts(outbound: &[Outbound]) -> Vec<&str> {
    outbound.iter().filter_map(Outbound::text).collect()
}

async fn step(engine: &DialogueEngine, user: UserId) -> Option<DialogueStep> {
    engine.sessions().get(user).await.map(|s| s.step())
}

async fn fill_form(engine: &DialogueEngine, user: UserId, name: &str, age: &str, grade: &str) {
    say(engine, user, "/start").await;
    say(engine, user, name).await;
    say(engine, user, age).await;
    say(engine, user, grade).await;
}

#[tokio::test]
async fn full_registration_is_stored() {
    let (engine, db) = setup().await;

    let out = say(&engine, JANE, "/start").await;
    assert_eq!(texts(&out), vec![prompts::START]);

    let out = say(&engine, JANE, "Jane Doe").await;
    assert_eq!(
        out,
        vec![Outbound::Reply(Reply::with_controls(prompts::ASK_AGE, Controls::CancelOnly))]
    );

    let out = say(&engine, JANE, "30").await;
    assert_eq!(
        out,
        vec![Outbound::Reply(Reply::with_controls(prompts::ASK_GRADE, Controls::GradeChoice))]
    );

    let out = say(&engine, JANE, "5").await;
    assert_eq!(
        out,
        vec![Outbound::Reply(Reply::with_controls(
            prompts::summary("Jane Doe", 30, "5"),
            Controls::ConfirmCancel
        ))]
    );
    assert_eq!(
        engine.sessions().get(JANE).await,
        Some(DialogueState::AwaitingConfirmation {
            name: "Jane Doe".into(),
            age: 30,
            grade: "5".into(),
        })
    );

    let out = press(&engine, JANE, "confirm").await;
    assert_eq!(texts(&out), vec![prompts::SAVED]);
    assert!(out.contains(&Outbound::ClearControls));
    assert_eq!(step(&engine, JANE).await, None);

    let record = db.find_student(JANE).await.unwrap().unwrap();
    assert_eq!(record.name, "Jane Doe");
    assert_eq!(record.age, 30);
    assert_eq!(record.grade, "5");

    let out = say(&engine, JANE, "/profile").await;
    assert_eq!(texts(&out), vec![prompts::record(&record)]);
}

#[tokio::test]
async fn invalid_age_then_cancel_stores_nothing() {
    let (engine, db) = setup().await;
    say(&engine, JANE, "/start").await;
    say(&engine, JANE, "Jane Doe").await;

    let out = say(&engine, JANE, "200").await;
    assert_eq!(texts(&out), vec![prompts::age_out_of_range()]);
    assert_eq!(
        engine.sessions().get(JANE).await,
        Some(DialogueState::AwaitingAge { name: "Jane Doe".into() })
    );

    say(&engine, JANE, "30").await;
    say(&engine, JANE, "5").await;
    assert_eq!(step(&engine, JANE).await, Some(DialogueStep::AwaitingConfirmation));

    let out = press(&engine, JANE, "cancel").await;
    assert_eq!(texts(&out), vec![prompts::CANCELLED]);
    assert_eq!(step(&engine, JANE).await, None);
    assert!(db.find_student(JANE).await.unwrap().is_none());
}

#[tokio::test]
async fn typed_cancel_works_from_every_question() {
    let (engine, db) = setup().await;
    let answers = ["Jane Doe", "30", "5"];

    for answered in 0..=answers.len() {
        say(&engine, JANE, "/start").await;
        for answer in &answers[..answered] {
            say(&engine, JANE, answer).await;
        }
        assert!(step(&engine, JANE).await.is_some());

        let out = say(&engine, JANE, "CANCEL").await;
        assert_eq!(texts(&out), vec![prompts::CANCELLED]);
        assert_eq!(step(&engine, JANE).await, None);
    }
    assert!(db.find_student(JANE).await.unwrap().is_none());
}

#[tokio::test]
async fn non_numeric_ages_are_rejected() {
    let (engine, _db) = setup().await;
    say(&engine, JANE, "/start").await;
    say(&engine, JANE, "Jane Doe").await;

    for bad in ["thirty", "12a", "-5", ""] {
        let out = say(&engine, JANE, bad).await;
        assert_eq!(texts(&out), vec![prompts::AGE_NOT_A_NUMBER], "input {bad:?}");
    }
    for out_of_range in ["4", "101", "99999999999999999999"] {
        let out = say(&engine, JANE, out_of_range).await;
        assert_eq!(texts(&out), vec![prompts::age_out_of_range()], "input {out_of_range:?}");
    }
    assert_eq!(step(&engine, JANE).await, Some(DialogueStep::AwaitingAge));

    say(&engine, JANE, "100").await;
    assert_eq!(step(&engine, JANE).await, Some(DialogueStep::AwaitingGrade));
}

#[tokio::test]
async fn restart_mid_dialogue_discards_answers() {
    let (engine, db) = setup().await;
    say(&engine, JANE, "/start").await;
    say(&engine, JANE, "Jane Doe").await;
    say(&engine, JANE, "30").await;
    assert_eq!(step(&engine, JANE).await, Some(DialogueStep::AwaitingGrade));

    let out = say(&engine, JANE, "/update").await;
    assert_eq!(texts(&out), vec![prompts::RESTART]);
    assert_eq!(engine.sessions().get(JANE).await, Some(DialogueState::AwaitingName));

    say(&engine, JANE, "Janet Roe").await;
    say(&engine, JANE, "31").await;
    say(&engine, JANE, "6").await;
    press(&engine, JANE, "confirm").await;

    let record = db.find_student(JANE).await.unwrap().unwrap();
    assert_eq!((record.name.as_str(), record.age, record.grade.as_str()), ("Janet Roe", 31, "6"));
}

#[tokio::test]
async fn second_registration_replaces_the_first() {
    let (engine, db) = setup().await;

    fill_form(&engine, JANE, "Jane Doe", "30", "5").await;
    press(&engine, JANE, "confirm").await;
    let first = db.find_student(JANE).await.unwrap().unwrap();

    fill_form(&engine, JANE, "Jane Doe", "31", "6").await;
    press(&engine, JANE, "confirm").await;
    let second = db.find_student(JANE).await.unwrap().unwrap();

    assert_eq!(second.age, 31);
    assert_eq!(second.grade, "6");
    assert!(second.updated_at >= first.updated_at);
}

#[tokio::test]
async fn cancel_button_at_confirmation_discards() {
    let (engine, db) = setup().await;
    fill_form(&engine, JANE, "Jane Doe", "30", "5").await;

    let out = press(&engine, JANE, "cancel").await;
    assert_eq!(texts(&out), vec![prompts::CANCELLED]);
    assert!(out.contains(&Outbound::ClearControls));
    assert_eq!(step(&engine, JANE).await, None);
    assert!(db.find_student(JANE).await.unwrap().is_none());
}

#[tokio::test]
async fn stale_confirm_leaves_record_alone() {
    let (engine, db) = setup().await;
    fill_form(&engine, JANE, "Jane Doe", "30", "5").await;
    press(&engine, JANE, "confirm").await;

    let out = press(&engine, JANE, "confirm").await;
    assert_eq!(texts(&out), vec![prompts::NOTHING_TO_CONFIRM]);
    assert!(out.contains(&Outbound::ClearControls));
    assert_eq!(step(&engine, JANE).await, None);

    let record = db.find_student(JANE).await.unwrap().unwrap();
    assert_eq!(record.grade, "5");
}

#[tokio::test]
async fn delete_then_view_reports_no_record() {
    let (engine, db) = setup().await;
    fill_form(&engine, JANE, "Jane Doe", "30", "5").await;
    press(&engine, JANE, "confirm").await;

    let out = say(&engine, JANE, "/delete").await;
    assert_eq!(texts(&out), vec![prompts::DELETED]);
    assert!(db.find_student(JANE).await.unwrap().is_none());

    let out = say(&engine, JANE, "/profile").await;
    assert_eq!(texts(&out), vec![prompts::NO_RECORD]);

    // Deleting again is harmless.
    let out = say(&engine, JANE, "/delete").await;
    assert_eq!(texts(&out), vec![prompts::DELETED]);
}

#[tokio::test]
async fn concurrent_users_do_not_interfere() {
    let (engine, db) = setup().await;
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for i in 0..20u8 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            let user = UserId(i64::from(i));
            let age = (10 + i).to_string();
            let grade = (1 + i % 11).to_string();
            fill_form(&engine, user, &format!("Student {i}"), &age, &grade).await;
            press(&engine, user, "confirm").await;
        }));
    }
    for handle in handles {
        timeout(TEST_TIMEOUT, handle).await.unwrap().unwrap();
    }

    for i in 0..20u8 {
        let record = db.find_student(UserId(i64::from(i))).await.unwrap().unwrap();
        assert_eq!(record.name, format!("Student {i}"));
        assert_eq!(record.age, 10 + i);
        assert_eq!(record.grade, (1 + i % 11).to_string());
    }
    assert_eq!(engine.sessions().tracked().await, 0);
}

#[tokio::test]
async fn double_press_saves_exactly_once() {
    let (engine, _db) = setup().await;
    let engine = Arc::new(engine);
    fill_form(&engine, JANE, "Jane Doe", "30", "5").await;

    let a = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { press(&engine, JANE, "confirm").await })
    };
    let b = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { press(&engine, JANE, "confirm").await })
    };
    let a = timeout(TEST_TIMEOUT, a).await.unwrap().unwrap();
    let b = timeout(TEST_TIMEOUT, b).await.unwrap().unwrap();

    let mut replies: Vec<&str> = texts(&a).into_iter().chain(texts(&b)).collect();
    replies.sort_unstable();
    let mut expected = vec![prompts::SAVED, prompts::NOTHING_TO_CONFIRM];
    expected.sort_unstable();
    assert_eq!(replies, expected);
}

/// Store whose first upsert fails, then behaves normally.
struct FlakyStore {
    inner: LibSqlBackend,
    failed_once: AtomicBool,
}

#[async_trait]
impl Database for FlakyStore {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        self.inner.run_migrations().await
    }

    async fn upsert_student(&self, record: &StudentRecord) -> Result<(), DatabaseError> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(DatabaseError::Query("database is locked".into()));
        }
        self.inner.upsert_student(record).await
    }

    async fn find_student(&self, user_id: UserId) -> Result<Option<StudentRecord>, DatabaseError> {
        self.inner.find_student(user_id).await
    }

    async fn delete_student(&self, user_id: UserId) -> Result<bool, DatabaseError> {
        self.inner.delete_student(user_id).await
    }
}

#[tokio::test]
async fn failed_save_can_be_retried() {
    let store = Arc::new(FlakyStore {
        inner: LibSqlBackend::new_memory().await.unwrap(),
        failed_once: AtomicBool::new(false),
    });
    let engine = DialogueEngine::new(store.clone());
    fill_form(&engine, JANE, "Jane Doe", "30", "5").await;

    let out = press(&engine, JANE, "confirm").await;
    assert_eq!(texts(&out), vec![prompts::SAVE_FAILED]);
    assert_eq!(step(&engine, JANE).await, Some(DialogueStep::AwaitingConfirmation));
    assert!(store.find_student(JANE).await.unwrap().is_none());

    let out = press(&engine, JANE, "confirm").await;
    assert_eq!(texts(&out), vec![prompts::SAVED]);
    assert_eq!(step(&engine, JANE).await, None);
    assert_eq!(store.find_student(JANE).await.unwrap().unwrap().name, "Jane Doe");
}
