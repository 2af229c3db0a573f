
use serde_json::json;
use study_client::api::{GenerateMindmapRequest, GenerateQuizRequest};
use study_client::clients::MockReply;
use study_client::config::TimeoutPolicy;
use study_client::core::{ApiClient, Endpoint, RequestBody, Transport};
use study_client::error::ApiError;
use study_client::quiz::QuestionSet;

use crate::test_utils::{fast_retry, mcq, mock_client};

fn mindmap_request() -> GenerateMindmapRequest {
    GenerateMindmapRequest { notes: "notes".into(), original_text: "text".into() }
}

fn quiz_request() -> GenerateQuizRequest {
    GenerateQuizRequest {
        notes: "notes".into(),
        original_text: "text".into(),
        existing_questions: "[]".into(),
        question_types: vec!["MCQ".into()],
        num_questions: 5,
        difficulty: "Apply".into(),
    }
}

#[tokio::test]
async fn test_connectivity_failures_are_retried() {
    let (client, handle) = mock_client();
    handle.push(Endpoint::GenerateMindmap, MockReply::ConnectivityFailure);
    handle.push(Endpoint::GenerateMindmap, MockReply::ConnectivityFailure);
    handle.push(
        Endpoint::GenerateMindmap,
        MockReply::ok(json!({"status": "success", "mindmap_syntax": "A --> B"})),
    );

    let response = client.generate_mindmap(&mindmap_request()).await.expect("third attempt succeeds");
    assert_eq!(response.mindmap_syntax, "A --> B");
    assert_eq!(handle.request_count(Endpoint::GenerateMindmap), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let (client, handle) = mock_client();
    for _ in 0..6 {
        handle.push(Endpoint::Chat, MockReply::ConnectivityFailure);
    }

    let request = study_client::api::ChatRequest {
        notes: "n".into(),
        original_text: String::new(),
        history: Vec::new(),
        message: "hi".into(),
        web_search_enabled: false,
    };
    match client.chat(&request).await {
        Err(ApiError::MaxRetriesExceeded { attempts, .. }) => assert_eq!(attempts, 4),
        other => panic!("expected MaxRetriesExceeded, got {:?}", other),
    }
    assert_eq!(handle.request_count(Endpoint::Chat), 4);
}

#[tokio::test]
async fn test_timeout_is_not_retried_and_uses_endpoint_budget() {
    let (client, handle) = mock_client();
    handle.push(Endpoint::GenerateMindmap, MockReply::Timeout);

    match client.generate_mindmap(&mindmap_request()).await {
        Err(ApiError::Timeout { seconds, .. }) => assert_eq!(seconds, 180),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(handle.request_count(Endpoint::GenerateMindmap), 1);
}

#[tokio::test]
async fn test_http_error_carries_details_without_retry() {
    let (client, handle) = mock_client();
    handle.push(
        Endpoint::ProcessContent,
        MockReply::Json {
            status: 400,
            body: json!({"error": "No input provided", "details": ["urls empty", "no files"]}),
        },
    );

    let err = client
        .process_content(study_client::api::ContentForm::default())
        .await
        .expect_err("400 is an error");
    match &err {
        ApiError::Http { status, details, .. } => {
            assert_eq!(*status, 400);
            assert_eq!(details.len(), 2);
        }
        other => panic!("expected Http error, got {:?}", other),
    }
    assert_eq!(err.to_string(), "No input provided - Details: urls empty, no files");
    assert_eq!(handle.request_count(Endpoint::ProcessContent), 1);
}

#[tokio::test]
async fn test_non_json_error_body_reports_raw_snippet() {
    let (client, handle) = mock_client();
    handle.push(Endpoint::GenerateMindmap, MockReply::Text { status: 502, body: "upstream down".into() });

    let message = client.generate_mindmap(&mindmap_request()).await.unwrap_err().to_string();
    assert!(message.starts_with("HTTP error 502: Bad Gateway"), "{}", message);
    assert!(message.contains("upstream down"));
}

#[tokio::test]
async fn test_noisy_quiz_text_is_cleaned_and_wrapped() {
    let (client, handle) = mock_client();
    let body = format!(
        "[\n{},\nPartial Transcript Snippet:\"and then the speaker said\",\n{}\n]",
        mcq("Q1", "Mitosis"),
        json!({"type": "MCQ", "question": "Q2", "options": ["a", "b"], "correct_answer": "a"})
    );
    handle.push(Endpoint::GenerateQuizzes, MockReply::Text { status: 200, body });

    let response = client.generate_quizzes(&quiz_request()).await.expect("cleaned quiz parses");
    assert_eq!(response.status, "success");
    assert!(response.quiz_id.as_deref().map_or(false, |id| id.starts_with("cleaned-")));
    assert_eq!(response.questions.len(), 2);

    // The two-option MCQ is dropped at ingest, never indexed.
    let set = QuestionSet::from_response(response);
    assert_eq!(set.len(), 1);
    assert_eq!(set.dropped(), 1);
}

#[tokio::test]
async fn test_unrecoverable_quiz_text_is_an_error() {
    let (client, handle) = mock_client();
    handle.push(Endpoint::GenerateQuizzes, MockReply::Text { status: 200, body: "Sorry, no quiz today".into() });

    match client.generate_quizzes(&quiz_request()).await {
        Err(ApiError::QuizPayload(_)) => {}
        other => panic!("expected QuizPayload error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_json_request_body_matches_wire_shape() {
    let (client, handle) = mock_client();
    handle.push(
        Endpoint::GenerateMindmap,
        MockReply::ok(json!({"status": "success", "mindmap_syntax": "A"})),
    );
    client.generate_mindmap(&mindmap_request()).await.unwrap();

    let requests = handle.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].body,
        RequestBody::Json(json!({"notes": "notes", "original_text": "text"}))
    );
}

#[tokio::test]
async fn test_boxed_transport_is_usable() {
    let (transport, handle) = study_client::clients::MockTransport::new();
    let boxed: Box<dyn Transport> = Box::new(transport);
    let client = ApiClient::new(boxed.clone(), TimeoutPolicy::default(), fast_retry());
    handle.push(
        Endpoint::EvaluateAnswer,
        MockReply::ok(json!({"status": "success", "score": 9.0, "feedback": "Great"})),
    );

    let request = study_client::api::EvaluateAnswerRequest {
        question: "Q".into(),
        ideal_answer: "A".into(),
        user_answer: "A".into(),
        notes_context: String::new(),
    };
    let response = client.evaluate_answer(&request).await.unwrap();
    assert_eq!(response.score, Some(9.0));
}
