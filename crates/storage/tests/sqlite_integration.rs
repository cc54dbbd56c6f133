use std::collections::BTreeMap;

use chrono::Duration;
use practice_core::model::{
    Answer, CompletedSession, Level, Question, QuestionBody, QuestionId, TestId, TestKind, Topic,
};
use practice_core::time::fixed_now;
use storage::TestBundle;
use storage::repository::{HistoryRepository, QuestionSource, StorageError};
use storage::sqlite::SqliteRepository;

fn listening_bundle(test_id: u64) -> TestBundle {
    let mut first = Question::listening(
        QuestionId::new(1),
        "What does the speaker want?",
        vec!["tea".into(), "coffee".into(), "water".into()],
        "2",
    )
    .with_explanation("咖啡 means coffee.");
    first.body = QuestionBody::Listening {
        audio_url: Some("https://cdn.example.com/audio/1.mp3".into()),
        transcript: Some("我想喝咖啡。".into()),
    };
    let second = Question::listening(
        QuestionId::new(2),
        "Where are they?",
        vec!["school".into(), "shop".into()],
        "1",
    );
    TestBundle::new(
        TestKind::Listening,
        Topic::new(TestId::new(test_id), "Ordering drinks", Level::Hsk2),
        vec![first, second],
    )
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_bundle_roundtrip_preserves_question_payloads() {
    let repo = connect("memdb_bundles").await;
    let bundle = listening_bundle(11);
    repo.upsert_bundle(&bundle).await.unwrap();

    let questions = repo
        .fetch_questions(TestKind::Listening, TestId::new(11))
        .await
        .unwrap();
    assert_eq!(questions, bundle.questions);
    assert_eq!(questions[0].transcript(), Some("我想喝咖啡。"));

    let topic = repo.fetch_topic(TestId::new(11)).await.unwrap();
    assert_eq!(topic.map(|t| t.level), Some(Level::Hsk2));

    let wrong_kind = repo
        .fetch_questions(TestKind::Reading, TestId::new(11))
        .await
        .unwrap_err();
    assert!(matches!(wrong_kind, StorageError::NotFound));
    assert!(repo.fetch_topic(TestId::new(12)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_history_lists_by_recency_and_deletes() {
    let repo = connect("memdb_history").await;
    let bundle = listening_bundle(3);
    let now = fixed_now();

    let mut saved = Vec::new();
    for minutes_ago in [40_i64, 5, 20] {
        let record = CompletedSession::finalize(
            bundle.topic.test_id,
            bundle.kind,
            now - Duration::minutes(minutes_ago),
            bundle.topic.clone(),
            bundle.questions.clone(),
            BTreeMap::from([(0, Answer::Option(1))]),
        )
        .unwrap();
        repo.save_completed_session(&record).await.unwrap();
        saved.push(record);
    }

    let listed = repo.list_completed_sessions(10).await.unwrap();
    let ids: Vec<_> = listed.iter().map(CompletedSession::history_id).collect();
    assert_eq!(
        ids,
        vec![saved[1].history_id(), saved[2].history_id(), saved[0].history_id()]
    );
    assert_eq!(listed[0].score().correct, 1);
    assert_eq!(listed[0].score().wrong, 1);
    assert_eq!(listed[0].selected_answers().get(&0), Some(&Answer::Option(1)));

    let limited = repo.list_completed_sessions(1).await.unwrap();
    assert_eq!(limited.len(), 1);

    let fetched = repo.get_completed_session(saved[0].history_id()).await.unwrap();
    assert_eq!(fetched, saved[0]);

    assert!(repo.delete_completed_session(saved[0].history_id()).await.unwrap());
    let err = repo
        .get_completed_session(saved[0].history_id())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_rejects_duplicate_history_ids() {
    let repo = connect("memdb_duplicates").await;
    let bundle = listening_bundle(8);
    let record = CompletedSession::finalize(
        bundle.topic.test_id,
        bundle.kind,
        fixed_now(),
        bundle.topic,
        bundle.questions,
        BTreeMap::new(),
    )
    .unwrap();

    repo.save_completed_session(&record).await.unwrap();
    let err = repo.save_completed_session(&record).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
    assert_eq!(repo.list_completed_sessions(10).await.unwrap().len(), 1);
}
