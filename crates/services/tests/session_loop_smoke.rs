use std::sync::Arc;

use practice_core::model::{Level, Question, QuestionId, TestId, TestKind, Topic};
use practice_core::time::fixed_now;
use services::{
    AdvanceOutcome, Clock, HistoryService, Lifecycle, PracticeLoopService, SharedSession,
    TickOutcome,
};
use storage::{InMemoryRepository, Storage, TestBundle};

fn seeded_repo(level: Level, n: u64) -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    let questions = (1..=n)
        .map(|id| {
            Question::listening(
                QuestionId::new(id),
                format!("Listen {id}"),
                vec!["一".into(), "二".into(), "三".into()],
                "3",
            )
            .with_translation(format!("Question {id}"))
        })
        .collect();
    repo.upsert_bundle(TestBundle::new(
        TestKind::Listening,
        Topic::new(TestId::new(1), "Smoke Test", level),
        questions,
    ))
    .unwrap();
    repo
}

#[tokio::test]
async fn session_loop_persists_completed_session() {
    let repo = seeded_repo(Level::Hsk1, 3);
    let storage = Storage::from_in_memory(repo.clone());
    let loop_svc = PracticeLoopService::from_storage(Clock::fixed(fixed_now()), &storage);

    let mut session = loop_svc
        .start_session(TestKind::Listening, TestId::new(1))
        .await
        .unwrap();

    let mut last = None;
    while session.lifecycle() == Lifecycle::Active {
        session.select_answer(2);
        last = Some(loop_svc.advance(&mut session).await.unwrap());
    }

    let last = last.expect("advanced at least once");
    assert_eq!(last.outcome, AdvanceOutcome::Completed);
    assert_eq!(session.scoring().tally().right, 3);

    let history = HistoryService::new(Clock::fixed(fixed_now()), Arc::new(repo));
    let items = history.list_recent(10).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(Some(items[0].history_id), last.history_id);
    assert_eq!(items[0].percentage, 100);
}

#[tokio::test]
async fn timed_out_shared_session_is_finalized_once() {
    let repo = seeded_repo(Level::Hsk1, 2);
    let storage = Storage::from_in_memory(repo.clone());
    let loop_svc = PracticeLoopService::from_storage(Clock::fixed(fixed_now()), &storage);

    let engine = loop_svc
        .start_session(TestKind::Listening, TestId::new(1))
        .await
        .unwrap();
    let session = SharedSession::new(engine);
    session.with(|e| e.select_answer(2)).await;

    let mut expirations = 0;
    for _ in 0..1805 {
        if session.tick().await == TickOutcome::Expired {
            expirations += 1;
        }
        session
            .finalize_if_completed(storage.history.as_ref())
            .await
            .unwrap();
    }

    assert_eq!(expirations, 1);
    assert_eq!(repo.history_len().unwrap(), 1);

    let snap = session.snapshot().await;
    assert_eq!(snap.lifecycle, Lifecycle::Completed);
    let score = snap.final_score.expect("scored");
    assert_eq!((score.correct, score.wrong), (1, 1));
    assert_eq!(score.percentage, 50);
}
