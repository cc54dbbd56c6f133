use std::time::Duration;

use practice_core::model::{Answer, HistoryId, QuestionBody, TestId, TestKind};
use practice_core::time::format_countdown;
use services::{
    AdvanceOutcome, AnswerOutcome, FontSize, Lifecycle, PracticeLoopService, SessionSnapshot,
    SharedSession, SubmitError, TickOutcome,
};
use storage::repository::HistoryRepository;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClockEvent {
    Remaining(u32),
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Finished(HistoryId),
    Quit,
}

/// Drive a timed session from stdin until it is submitted, times out or the learner quits.
pub async fn run_session(
    session_loop: &PracticeLoopService,
    kind: TestKind,
    test_id: TestId,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = session_loop.start_session(kind, test_id).await?;
    let session = SharedSession::new(engine);
    let history = session_loop.history();

    print_help();
    render(&session.snapshot().await);

    let (tx, mut rx) = mpsc::channel(8);
    let ticker = tokio::spawn(drive_clock(session.clone(), tx));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut auto_finalize = true;

    loop {
        let flow = tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => handle_input(&session, history.as_ref(), line.trim()).await,
                None => Flow::Quit,
            },
            Some(event) = rx.recv() => {
                match event {
                    ClockEvent::Remaining(secs) => println!("{} left", format_countdown(secs)),
                    ClockEvent::Expired => println!("Time is up."),
                }
                Flow::Continue
            }
        };

        let flow = match flow {
            Flow::Continue if auto_finalize => {
                match session.finalize_if_completed(history.as_ref()).await {
                    Ok(Some(id)) => Flow::Finished(id),
                    Ok(None) => Flow::Continue,
                    Err(err) => {
                        auto_finalize = false;
                        eprintln!("Could not save the result: {err}. Type `submit` to retry.");
                        Flow::Continue
                    }
                }
            }
            other => other,
        };

        match flow {
            Flow::Continue => {}
            Flow::Finished(id) => {
                print_result(&session.snapshot().await, id);
                break;
            }
            Flow::Quit => {
                println!("Session abandoned; nothing was saved.");
                break;
            }
        }
    }

    ticker.abort();
    Ok(())
}

async fn drive_clock(session: SharedSession, tx: mpsc::Sender<ClockEvent>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.tick().await;
    loop {
        interval.tick().await;
        let event = match session.tick().await {
            TickOutcome::Expired => Some(ClockEvent::Expired),
            TickOutcome::Counted => {
                let remaining = session.with(|engine| engine.timer().remaining()).await;
                (remaining % 60 == 0 || remaining <= 10).then_some(ClockEvent::Remaining(remaining))
            }
            TickOutcome::Idle => {
                if session.with(|engine| engine.lifecycle()).await == Lifecycle::Completed {
                    return;
                }
                None
            }
        };
        if let Some(event) = event {
            if tx.send(event).await.is_err() || event == ClockEvent::Expired {
                return;
            }
        }
    }
}

async fn handle_input(session: &SharedSession, history: &dyn HistoryRepository, line: &str) -> Flow {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match command {
        "" => {}
        "?" | "help" => {
            print_help();
            return Flow::Continue;
        }
        "q" | "quit" => return Flow::Quit,
        "n" | "next" => {
            if session.with(|e| e.advance()).await == AdvanceOutcome::Completed {
                println!("That was the last question.");
            }
        }
        "p" | "prev" => {
            session.with(|e| e.previous()).await;
        }
        "g" | "goto" => match rest.parse::<usize>() {
            Ok(number) if number > 0 => {
                if !session.with(|e| e.go_to(number - 1)).await {
                    println!("No question {number}.");
                }
            }
            _ => println!("Usage: g <question number>"),
        },
        "u" | "unanswered" => {
            if session.with(|e| e.go_to_next_unanswered()).await.is_none() {
                println!("Every question is answered.");
            }
        }
        "r" | "review" => {
            session
                .with(|e| {
                    let index = e.navigation().current_index();
                    e.mark_reviewed(index)
                })
                .await;
        }
        "t" => session.with(|e| e.toggle_translation()).await,
        "e" => session.with(|e| e.toggle_explanation()).await,
        "s" => session.with(|e| e.toggle_transcript()).await,
        "f" | "font" => match rest.parse::<FontSize>() {
            Ok(size) => session.with(|e| e.set_font_size(size)).await,
            Err(err) => println!("{err}"),
        },
        "c" | "clear" => {
            session.with(|e| e.clear_answer()).await;
        }
        "w" | "write" => {
            if session.with(|e| e.write_answer(rest)).await == AnswerOutcome::Ignored {
                println!("Written answers only apply to writing questions (and must not be blank).");
            }
        }
        "pause" => session.with(|e| e.pause_timer()).await,
        "resume" => session.with(|e| e.resume_timer()).await,
        "submit" | "submit!" => {
            let confirmed = command == "submit!";
            match session.submit(history, confirmed).await {
                Ok(id) => return Flow::Finished(id),
                Err(SubmitError::ConfirmationRequired { answered, total }) => {
                    println!("{answered} of {total} answered. Type `submit!` to submit anyway.");
                    return Flow::Continue;
                }
                Err(err) if err.is_retryable() => {
                    eprintln!("Could not save the result: {err}. Try `submit` again.");
                    return Flow::Continue;
                }
                Err(err) => {
                    println!("{err}");
                    return Flow::Continue;
                }
            }
        }
        number => match number.parse::<usize>() {
            Ok(choice) if choice > 0 => {
                if session.with(|e| e.select_answer(choice - 1)).await == AnswerOutcome::Ignored {
                    println!("Option {choice} is not available here.");
                }
            }
            _ => {
                println!("Unknown command `{line}`. Type ? for help.");
                return Flow::Continue;
            }
        },
    }

    render(&session.snapshot().await);
    Flow::Continue
}

fn render(snap: &SessionSnapshot) {
    let Some(question) = &snap.current_question else {
        return;
    };
    let presentation = snap.presentation;

    println!();
    println!(
        "[{}/{}] {} left | answered {}/{} | reviewed {} | font {}",
        snap.progress.current,
        snap.progress.total,
        format_countdown(snap.remaining_secs),
        snap.answered_count,
        snap.progress.total,
        snap.reviewed_count,
        presentation.font_size,
    );
    if !snap.timer.running && snap.lifecycle == Lifecycle::Active {
        println!("(timer paused)");
    }

    let prompt = match presentation.font_size {
        FontSize::Large => question.prompt_text.to_uppercase(),
        FontSize::Small | FontSize::Medium => question.prompt_text.clone(),
    };
    println!("{prompt}");

    match &question.body {
        QuestionBody::Listening {
            audio_url: Some(url),
            ..
        } => println!("audio: {url}"),
        QuestionBody::Reading {
            passage: Some(passage),
        } => println!("{passage}"),
        _ => {}
    }

    let selected = snap
        .statuses
        .get(snap.current_index)
        .and_then(|status| status.selected_answer.clone());
    for (index, option) in question.options.iter().enumerate() {
        let mark = if selected == Some(Answer::Option(index)) {
            '*'
        } else {
            ' '
        };
        println!(" {mark}{}. {option}", index + 1);
    }
    if let Some(Answer::Text(text)) = &selected {
        println!("your answer: {text}");
    }

    if presentation.show_translation {
        if let Some(translation) = &question.translation {
            println!("translation: {translation}");
        }
    }
    if presentation.show_transcript {
        if let Some(transcript) = question.transcript() {
            println!("transcript: {transcript}");
        }
    }
    if presentation.show_explanation {
        if let Some(explanation) = &question.explanation {
            println!("explanation: {explanation}");
        }
        if let QuestionBody::Writing {
            sample_answer: Some(sample),
        } = &question.body
        {
            println!("sample answer: {sample}");
        }
    }
    if presentation.is_show_answer_feedback {
        println!(
            "{}",
            if presentation.is_answer_correct {
                "Correct!"
            } else {
                "Not quite."
            }
        );
    }
}

fn print_result(snap: &SessionSnapshot, id: HistoryId) {
    println!();
    match snap.final_score {
        Some(score) => println!(
            "Finished: {}% ({} correct, {} wrong, {} ungraded of {})",
            score.percentage, score.correct, score.wrong, score.skipped, score.total
        ),
        None => println!("Finished."),
    }
    println!("Saved as {id}");
}

fn print_help() {
    println!("Commands:");
    println!("  1-9          choose an option");
    println!("  w <text>     write an answer (writing tests)");
    println!("  n / p        next / previous question");
    println!("  g <n>        go to question n");
    println!("  u            next unanswered question");
    println!("  r            mark current question for review");
    println!("  t / e / s    toggle translation / explanation / transcript");
    println!("  f <size>     font size: small, medium, large");
    println!("  c            clear current answer");
    println!("  pause/resume timer");
    println!("  submit       submit (submit! skips the confirmation)");
    println!("  q            quit without saving");
}
