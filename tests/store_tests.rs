
use std::time::Duration;

use serde_json::json;
use study_client::api::ContentForm;
use study_client::clients::MockReply;
use study_client::core::{Endpoint, RequestBody};
use study_client::error::{QuizError, StudyError};
use study_client::mindmap::MindmapView;
use study_client::notes::NotesFormat;
use study_client::quiz::{AnswerInput, QuizOptions};

use crate::test_utils::{loaded_store, mcq, mock_store, processed, quiz_reply, topic_form};

fn mixed_quiz() -> MockReply {
    quiz_reply(vec![
        mcq("Which process makes identical daughter cells?", "Mitosis"),
        json!({
            "type": "Fill_in_the_Blank",
            "question": "DNA is stored in the ____.",
            "correct_answer": ["nucleus", "nuclei"]
        }),
        json!({
            "type": "Matching",
            "question": "Match the phase to its event",
            "options": {
                "column_a": ["Prophase", "Metaphase", "Anaphase", "Telophase", "Cytokinesis"],
                "column_b": ["Align", "Condense", "Separate", "Reform", "Split"]
            },
            "correct_answer": ["0-1", "1-0", "2-2", "3-3", "4-4"]
        }),
        json!({
            "type": "Short_Answer",
            "question": "Why do cells divide?",
            "correct_answer": "Growth and repair"
        }),
    ])
}

fn answer_mixed_quiz(store: &study_client::StudyStore<study_client::clients::MockTransport>) {
    store.record_answer(0, AnswerInput::Choice("Mitosis".into())).unwrap();
    store.record_answer(1, AnswerInput::Text(" Nucleus ".into())).unwrap();
    let selections = ["1", "0", "2", "3", "3"].iter().map(|s| s.to_string()).collect();
    store.record_answer(2, AnswerInput::Selections(selections)).unwrap();
    store.record_answer(3, AnswerInput::Text("To grow and heal".into())).unwrap();
}

#[tokio::test]
async fn test_empty_content_form_is_rejected_locally() {
    let (store, handle) = mock_store();
    let result = store.process_content(ContentForm::default()).await;
    assert!(matches!(result, Err(StudyError::MissingInput(_))));
    assert!(handle.requests().is_empty());
}

#[tokio::test]
async fn test_process_content_ingests_initial_generations() {
    let (store, handle) = mock_store();
    let mut body = processed(json!({
        "initial_quiz": {
            "quiz_id": "q0",
            "status": "success",
            "questions": [
                mcq("Q1", "Mitosis"),
                {"type": "MCQ", "question": "Q2", "options": ["a", "b"], "correct_answer": "a"}
            ]
        },
        "initial_flashcards": {"status": "error", "error": "quota exceeded"},
        "initial_mindmap": {"status": "success", "mindmap_syntax": "graph TD\nA[Cell] --> B[Nucleus]"}
    }));
    body["warnings"] = json!(["One URL could not be fetched"]);
    handle.push(Endpoint::ProcessContent, MockReply::ok(body));

    let outcome = store.process_content(topic_form()).await.unwrap();
    assert_eq!(outcome.title, "Cells");
    assert_eq!(
        outcome.warnings,
        vec![
            "One URL could not be fetched".to_string(),
            "Initial Flashcard Generation: quota exceeded".to_string(),
        ]
    );

    let state = store.snapshot();
    let quiz = state.quiz.expect("initial quiz loaded");
    assert_eq!(quiz.len(), 1);
    assert_eq!(quiz.dropped(), 1);
    assert!(state.flashcards.is_empty());
    assert_eq!(state.mindmap.map(|m| m.graph.nodes.len()), Some(2));

    match store.render_mindmap() {
        Some(MindmapView::Rendered { renderer, .. }) => assert_eq!(renderer, "elements"),
        other => panic!("expected rendered mind map, got {:?}", other),
    }

    match &handle.requests()[0].body {
        RequestBody::Multipart(form) => assert_eq!(form.topic, "Cells"),
        other => panic!("expected multipart body, got {:?}", other),
    }
}

#[tokio::test]
async fn test_generation_requires_content() {
    let (store, _handle) = mock_store();
    assert!(matches!(store.generate_quiz(QuizOptions::default()).await, Err(StudyError::NoContent)));
    assert!(matches!(store.generate_mindmap().await, Err(StudyError::NoContent)));
}

#[tokio::test]
async fn test_quiz_requires_a_question_type() {
    let (store, handle) = loaded_store().await;
    let options = QuizOptions { question_types: Vec::new(), ..Default::default() };
    assert!(matches!(store.generate_quiz(options).await, Err(StudyError::MissingInput(_))));
    assert_eq!(handle.request_count(Endpoint::GenerateQuizzes), 0);
}

#[tokio::test]
async fn test_new_quiz_replaces_old_and_clears_answers() {
    let (store, handle) = loaded_store().await;
    handle.push(Endpoint::GenerateQuizzes, mixed_quiz());
    handle.push(Endpoint::GenerateQuizzes, quiz_reply(vec![mcq("Fresh", "Meiosis")]));

    store.generate_quiz(QuizOptions::default()).await.unwrap();
    store.record_answer(0, AnswerInput::Choice("Mitosis".into())).unwrap();
    assert_eq!(store.snapshot().answers.len(), 1);

    let set = store.generate_quiz(QuizOptions::default()).await.unwrap();
    assert_eq!(set.len(), 1);
    let state = store.snapshot();
    assert!(state.answers.is_empty());
    assert_eq!(state.quiz.map(|q| q.questions()[0].prompt.clone()), Some("Fresh".to_string()));
}

#[tokio::test]
async fn test_submit_requires_every_answer() {
    let (store, handle) = loaded_store().await;
    handle.push(Endpoint::GenerateQuizzes, mixed_quiz());
    store.generate_quiz(QuizOptions::default()).await.unwrap();

    store.record_answer(0, AnswerInput::Choice("Mitosis".into())).unwrap();
    assert!(!store.all_answered());
    assert!(matches!(
        store.submit_quiz().await,
        Err(StudyError::Quiz(QuizError::NotAllAnswered))
    ));
    // Still editable after a refused submit.
    assert!(store.record_answer(1, AnswerInput::Text("nucleus".into())).is_ok());
}

#[tokio::test]
async fn test_submit_grades_everything_once() {
    let (store, handle) = loaded_store().await;
    handle.push(Endpoint::GenerateQuizzes, mixed_quiz());
    handle.push(
        Endpoint::EvaluateAnswer,
        MockReply::ok(json!({"status": "success", "score": 8, "feedback": "Covers the key idea."})),
    );
    store.generate_quiz(QuizOptions::default()).await.unwrap();
    answer_mixed_quiz(&store);
    assert!(store.all_answered());

    let report = store.submit_quiz().await.unwrap();
    assert_eq!(report.total, 4);
    assert_eq!(report.total_correct, 3);
    assert_eq!(report.summary(), "Score: 3 / 4");

    let matching = report.results.get(2).unwrap();
    assert_eq!(matching.correct, Some(false));
    assert_eq!(matching.matched, Some(4));
    assert!(matching.feedback.starts_with("You matched 4 out of 5 correctly. Partially Correct."));

    let short = report.results.get(3).unwrap();
    assert_eq!(short.score, Some(8.0));
    assert_eq!(short.feedback, "Score: 8/10. Covers the key idea.");

    let scoring = handle
        .requests()
        .into_iter()
        .find(|r| r.endpoint == Endpoint::EvaluateAnswer)
        .expect("short answer was scored");
    match scoring.body {
        RequestBody::Json(body) => {
            assert_eq!(body["user_answer"], "To grow and heal");
            assert_eq!(body["notes_context"], "Cells divide by mitosis.");
        }
        other => panic!("expected JSON body, got {:?}", other),
    }

    assert!(matches!(store.submit_quiz().await, Err(StudyError::Quiz(QuizError::AlreadySubmitted))));
    assert!(matches!(
        store.record_answer(0, AnswerInput::Choice("Meiosis".into())),
        Err(StudyError::Quiz(QuizError::AlreadySubmitted))
    ));
    assert_eq!(store.snapshot().report, Some(report));
}

#[tokio::test]
async fn test_failed_short_answer_scoring_is_incorrect_and_not_retried() {
    let (store, handle) = loaded_store().await;
    handle.push(
        Endpoint::GenerateQuizzes,
        quiz_reply(vec![json!({"type": "Short_Answer", "question": "Why?", "correct_answer": "Because"})]),
    );
    handle.push(Endpoint::EvaluateAnswer, MockReply::error(500, "model unavailable"));
    store.generate_quiz(QuizOptions::default()).await.unwrap();
    store.record_answer(0, AnswerInput::Text("No idea".into())).unwrap();

    let report = store.submit_quiz().await.unwrap();
    let result = report.results.get(0).unwrap();
    assert_eq!(result.correct, Some(false));
    assert_eq!(result.feedback, "Evaluation failed: model unavailable");
    assert_eq!(report.summary(), "Score: 0 / 1");
    assert_eq!(handle.request_count(Endpoint::EvaluateAnswer), 1);
}

#[tokio::test]
async fn test_result_of_replaced_session_is_discarded() {
    let (store, handle) = loaded_store().await;
    handle.push(
        Endpoint::GenerateQuizzes,
        quiz_reply(vec![mcq("Late", "Mitosis")]).delayed(Duration::from_millis(50)),
    );

    let (result, _) = tokio::join!(store.generate_quiz(QuizOptions::default()), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.reset_for_new_content();
    });

    assert!(matches!(result, Err(StudyError::Stale)));
    let state = store.snapshot();
    assert!(state.quiz.is_none());
    assert!(state.content.is_none());
}

#[tokio::test]
async fn test_submit_for_replaced_question_set_is_discarded() {
    let (store, handle) = loaded_store().await;
    handle.push(
        Endpoint::GenerateQuizzes,
        quiz_reply(vec![json!({"type": "Short_Answer", "question": "Why?", "correct_answer": "Because"})]),
    );
    handle.push(
        Endpoint::EvaluateAnswer,
        MockReply::ok(json!({"status": "success", "score": 9.0, "feedback": "Good"}))
            .delayed(Duration::from_millis(50)),
    );
    handle.push(
        Endpoint::GenerateQuizzes,
        quiz_reply(vec![mcq("First", "Mitosis"), mcq("Second", "Meiosis")]),
    );
    store.generate_quiz(QuizOptions::default()).await.unwrap();
    store.record_answer(0, AnswerInput::Text("It just does".into())).unwrap();

    let (submitted, regenerated) = tokio::join!(store.submit_quiz(), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.generate_quiz(QuizOptions::default()).await
    });

    assert!(matches!(submitted, Err(StudyError::Stale)));
    assert_eq!(regenerated.unwrap().len(), 2);
    let state = store.snapshot();
    let quiz = state.quiz.expect("new set is displayed");
    assert_eq!(quiz.len(), 2);
    assert!(!quiz.is_submitted());
    assert!(state.report.is_none());
    assert!(state.results.is_empty());
    assert!(!state.answers.all_answered(&quiz));
}

#[tokio::test]
async fn test_chat_replaces_history_from_server() {
    let (store, handle) = loaded_store().await;
    handle.push(
        Endpoint::Chat,
        MockReply::ok(json!({
            "status": "success",
            "response": "Prophase comes first.",
            "history": [
                {"role": "user", "parts": ["What comes first?"]},
                {"role": "model", "parts": ["Prophase comes first."]}
            ]
        })),
    );

    let reply = store.send_chat("  What comes first?  ").await.unwrap();
    assert_eq!(reply, "Prophase comes first.");
    let chat = store.snapshot().chat;
    assert_eq!(chat.len(), 2);
    assert_eq!(chat.turns()[1].role, "model");
}

#[tokio::test]
async fn test_chat_failure_removes_user_turn() {
    let (store, handle) = loaded_store().await;
    handle.push(Endpoint::Chat, MockReply::ok(json!({"status": "success", "response": "Hi"})));
    handle.push(Endpoint::Chat, MockReply::error(500, "model crashed"));

    store.send_chat("hello").await.unwrap();
    assert_eq!(store.snapshot().chat.len(), 2);

    let err = store.send_chat("second").await.unwrap_err();
    assert!(err.to_string().contains("model crashed"));
    let chat = store.snapshot().chat;
    assert_eq!(chat.len(), 2);
    assert_eq!(chat.turns()[1].parts, vec!["Hi".to_string()]);
}

#[tokio::test]
async fn test_chat_sends_only_recent_turns() {
    let (store, handle) = loaded_store().await;
    for i in 0..7 {
        handle.push(Endpoint::Chat, MockReply::ok(json!({"status": "success", "response": format!("r{}", i)})));
    }
    for i in 0..7 {
        store.send_chat(&format!("m{}", i)).await.unwrap();
    }

    let last = handle.requests().into_iter().filter(|r| r.endpoint == Endpoint::Chat).last().unwrap();
    match last.body {
        RequestBody::Json(body) => {
            let history = body["history"].as_array().unwrap();
            assert_eq!(history.len(), 10);
            assert_eq!(history[9]["parts"][0], "m6");
        }
        other => panic!("expected JSON body, got {:?}", other),
    }
    assert_eq!(store.snapshot().chat.len(), 14);
}

#[tokio::test]
async fn test_flashcards_generate_and_navigate() {
    let (store, handle) = loaded_store().await;
    handle.push(
        Endpoint::GenerateFlashcards,
        MockReply::ok(json!({
            "status": "success",
            "flashcards": [
                {"question": "What is mitosis?", "answer": "Cell division"},
                {"question": "What is a nucleus?", "answer": "The control center"}
            ]
        })),
    );

    assert_eq!(store.generate_flashcards().await.unwrap(), 2);
    let counter = store.with_flashcards(|deck| {
        deck.flip();
        deck.next();
        deck.counter()
    });
    assert_eq!(counter, "Card 2 of 2");
    assert!(!store.with_flashcards(|deck| deck.is_flipped()));

    match &handle.requests().last().unwrap().body {
        RequestBody::Json(body) => assert_eq!(body["num_flashcards"], 10),
        other => panic!("expected JSON body, got {:?}", other),
    }
}

#[tokio::test]
async fn test_notes_export_uses_loaded_content() {
    let (store, _) = mock_store();
    assert!(matches!(store.export_notes(NotesFormat::Markdown), Err(StudyError::NoContent)));

    let (store, _) = loaded_store().await;
    let file = store.export_notes(NotesFormat::Text).unwrap();
    assert_eq!(file.file_name, "notes_cells.txt");
    assert_eq!(file.mime, "text/plain");
    assert_eq!(file.content, "Cells divide by mitosis.");
}

#[tokio::test]
async fn test_unparseable_mindmap_falls_back_to_raw_syntax() {
    let (store, handle) = loaded_store().await;
    handle.push(
        Endpoint::GenerateMindmap,
        MockReply::ok(json!({"status": "success", "mindmap_syntax": "nothing graph-like here"})),
    );

    let graph = store.generate_mindmap().await.unwrap();
    assert!(graph.is_parse_failure());
    match store.render_mindmap() {
        Some(MindmapView::Raw { syntax, .. }) => assert_eq!(syntax, "nothing graph-like here"),
        other => panic!("expected raw fallback, got {:?}", other),
    }
}
