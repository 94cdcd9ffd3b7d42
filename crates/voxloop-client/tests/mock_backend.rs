//! Mock-backend integration tests.
//!
//! Stands up a local HTTP server emulating the voice-agent backend and
//! drives the full engine through it: transport, gateway retry, health
//! signals, session history, and the turn state machine.
//!
//! Coverage:
//! - Full success turn with reply audio fetched and saved
//! - Conversation mode re-arming after a successful turn
//! - Soft fallback surfaced after exactly one attempt
//! - Non-2xx exhaustion, then retry_last succeeding against a recovered
//!   backend
//! - History 404 treated as a normal empty result
//! - Health probe folding into the dependency table
//! - Standalone TTS path

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voxloop_client::{
    FailureReason, GatewayConfig, HttpTransport, MemorySessionStore, NullPlayback, Outcome,
    PlaybackSink, RequestGateway, RequestSpec, SaveToDirPlayback, ServiceHealthTracker,
    SessionManager, TurnConfig, TurnOrchestrator, TurnParams, TurnState, WavFileRecorder,
    probe_once,
};
use voxloop_types::{Dependency, DependencyStatus};

const SESSION_ID: &str = "chat_1700000000000_testtest1";

/// Minimal PCM WAV (16 kHz, mono, 16-bit) with `secs` seconds of silence.
fn wav_bytes(secs: f64) -> Vec<u8> {
    let byte_rate: u32 = 16_000 * 2;
    let data_len = (f64::from(byte_rate) * secs) as u32;
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&16_000u32.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(out.len() + data_len as usize, 0);
    out
}

fn clip_file(dir: &tempfile::TempDir, secs: f64) -> PathBuf {
    let path = dir.path().join("clip.wav");
    std::fs::write(&path, wav_bytes(secs)).unwrap();
    path
}

/// Gateway with production semantics but millisecond backoff.
fn fast_gateway(health: Arc<ServiceHealthTracker>) -> Arc<RequestGateway<HttpTransport>> {
    Arc::new(RequestGateway::new(
        HttpTransport::new(),
        GatewayConfig {
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        },
        health,
    ))
}

fn orchestrator(
    server_url: &str,
    clip: PathBuf,
    playback: Box<dyn PlaybackSink>,
) -> TurnOrchestrator<HttpTransport> {
    let health = Arc::new(ServiceHealthTracker::default());
    let gateway = fast_gateway(health);
    let sessions = Arc::new(SessionManager::new(
        Arc::clone(&gateway),
        Box::new(MemorySessionStore::with_id(SESSION_ID)),
        server_url,
    ));
    let (orch, _events) = TurnOrchestrator::new(
        gateway,
        sessions,
        Box::new(WavFileRecorder::new(clip)),
        playback,
        TurnConfig {
            min_clip: Duration::from_millis(500),
            params: TurnParams {
                voice: "en-US-natalie".into(),
                max_tokens: 800,
                temperature: 0.7,
            },
            auto_continue: false,
        },
    );
    orch
}

fn chat_path() -> String {
    format!("/agent/chat/{SESSION_ID}")
}

// ── Success turn ───────────────────────────────────────────────────────

#[tokio::test]
async fn success_turn_plays_reply_audio() {
    let server = MockServer::start().await;
    let clip_dir = tempfile::tempdir().unwrap();
    let audio_dir = tempfile::tempdir().unwrap();

    let body = serde_json::json!({
        "success": true,
        "ai_response": "Nice to meet you",
        "audio_url": format!("{}/audio/a.mp3", server.uri()),
        "chat_history": [
            {"role": "user", "content": "hi there", "timestamp": "2025-06-01T10:00:00"},
            {"role": "assistant", "content": "Nice to meet you", "timestamp": "2025-06-01T10:00:02"}
        ],
        "session_info": {"session_id": SESSION_ID, "message_count": 2}
    });

    Mock::given(method("POST"))
        .and(path(chat_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/audio/a.mp3"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "audio/mpeg")
                .set_body_bytes(vec![0x49u8, 0x44, 0x33, 0x04]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let orch = orchestrator(
        &server.uri(),
        clip_file(&clip_dir, 2.0),
        Box::new(SaveToDirPlayback::new(audio_dir.path())),
    );

    assert!(orch.begin().await);
    let terminal = orch.stop().await;
    assert_eq!(terminal, TurnState::Success);
    assert_eq!(orch.state().await, TurnState::Idle);
    assert!(orch.recovery_context().is_none());

    // The reply audio was fetched and written out.
    let saved: Vec<_> = std::fs::read_dir(audio_dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].extension().unwrap(), "mp3");
}

#[tokio::test]
async fn conversation_mode_rearms_after_playback() {
    let server = MockServer::start().await;
    let clip_dir = tempfile::tempdir().unwrap();

    let body = serde_json::json!({
        "success": true,
        "ai_response": "Go on",
        "audio_url": null
    });

    Mock::given(method("POST"))
        .and(path(chat_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let orch = orchestrator(
        &server.uri(),
        clip_file(&clip_dir, 2.0),
        Box::new(NullPlayback),
    );
    orch.set_conversation_mode(true);

    assert!(orch.begin().await);
    let terminal = orch.stop().await;
    assert_eq!(terminal, TurnState::Success);

    // Auto-continue armed the next turn.
    assert_eq!(orch.state().await, TurnState::Recording);
    orch.cancel().await;
    assert_eq!(orch.state().await, TurnState::Idle);
}

// ── Soft fallback ──────────────────────────────────────────────────────

#[tokio::test]
async fn soft_fallback_after_exactly_one_attempt() {
    let server = MockServer::start().await;
    let clip_dir = tempfile::tempdir().unwrap();

    let body = serde_json::json!({
        "success": false,
        "error_type": "tts_error",
        "fallback_message": "TTS unavailable",
        "fallback_text": "hello"
    });

    // expect(1): a deterministic backend rejection is never retried.
    Mock::given(method("POST"))
        .and(path(chat_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let orch = orchestrator(
        &server.uri(),
        clip_file(&clip_dir, 2.0),
        Box::new(NullPlayback),
    );

    assert!(orch.begin().await);
    let terminal = orch.stop().await;
    assert_eq!(terminal, TurnState::SoftFallback);

    let context = orch.recovery_context().unwrap();
    assert_eq!(context.reason, FailureReason::SoftFallback);
    assert!(!orch.error_log().is_empty());
}

// ── Hard failure and recovery ──────────────────────────────────────────

#[tokio::test]
async fn server_errors_exhaust_attempts_then_retry_last_recovers() {
    let server = MockServer::start().await;
    let clip_dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(chat_path()))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let orch = orchestrator(
        &server.uri(),
        clip_file(&clip_dir, 2.0),
        Box::new(NullPlayback),
    );

    assert!(orch.begin().await);
    let terminal = orch.stop().await;
    assert_eq!(terminal, TurnState::Failed);

    let context = orch.recovery_context().unwrap();
    assert_eq!(context.reason, FailureReason::HttpError);

    // Backend recovers; the retry replays the same clip and succeeds.
    server.reset().await;
    Mock::given(method("POST"))
        .and(path(chat_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "ai_response": "Back online"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let terminal = orch.retry_last().await;
    assert_eq!(terminal, TurnState::Success);
    assert!(orch.recovery_context().is_none());
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_failure() {
    // Nothing listens on port 1.
    let clip_dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(
        "http://127.0.0.1:1",
        clip_file(&clip_dir, 2.0),
        Box::new(NullPlayback),
    );

    assert!(orch.begin().await);
    let terminal = orch.stop().await;
    assert_eq!(terminal, TurnState::Failed);
    let context = orch.recovery_context().unwrap();
    assert_eq!(context.reason, FailureReason::NetworkTransport);
}

// ── History ────────────────────────────────────────────────────────────

#[tokio::test]
async fn history_404_is_swallowed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/agent/chat/{SESSION_ID}/history")))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&server)
        .await;

    let health = Arc::new(ServiceHealthTracker::default());
    let gateway = fast_gateway(health);
    let sessions = SessionManager::new(
        Arc::clone(&gateway),
        Box::new(MemorySessionStore::with_id(SESSION_ID)),
        server.uri(),
    );

    // 404 is the normal case for a brand-new session: no error, no turns.
    assert!(sessions.load_history().await.is_none());
    assert!(sessions.cached_turns().is_empty());
}

#[tokio::test]
async fn history_fetch_populates_turn_cache() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "session_id": SESSION_ID,
        "messages": [
            {"role": "user", "content": "what's the weather", "timestamp": "2025-06-01T09:00:00"},
            {"role": "assistant", "content": "Sunny, 22 degrees", "timestamp": "2025-06-01T09:00:03"}
        ],
        "message_count": 2
    });

    Mock::given(method("GET"))
        .and(path(format!("/agent/chat/{SESSION_ID}/history")))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let health = Arc::new(ServiceHealthTracker::default());
    let gateway = fast_gateway(health);
    let sessions = SessionManager::new(
        Arc::clone(&gateway),
        Box::new(MemorySessionStore::with_id(SESSION_ID)),
        server.uri(),
    );

    let history = sessions.load_history().await.unwrap();
    assert_eq!(history.message_count, 2);
    let turns = sessions.cached_turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].content, "Sunny, 22 degrees");
}

// ── Health probing ─────────────────────────────────────────────────────

#[tokio::test]
async fn probe_folds_remote_statuses_into_tracker() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "degraded",
        "timestamp": "2025-06-01T10:00:00",
        "active_sessions": 1,
        "issues": ["stt: api key rejected"],
        "services": {
            "stt": {"status": "error", "error_count": 5, "last_error": "api key rejected"},
            "llm": {"status": "healthy", "error_count": 0},
            "tts": {"status": "healthy", "error_count": 0}
        }
    });

    // Probes are single-attempt.
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let health = Arc::new(ServiceHealthTracker::default());
    let gateway = fast_gateway(Arc::clone(&health));

    probe_once(&gateway, &server.uri()).await;

    let snapshot: std::collections::HashMap<_, _> = health.snapshot().into_iter().collect();
    assert_eq!(
        snapshot[&Dependency::Transcription].status,
        DependencyStatus::Unreachable
    );
    assert_eq!(
        snapshot[&Dependency::Transcription].last_error.as_deref(),
        Some("api key rejected")
    );
    assert_eq!(
        snapshot[&Dependency::Language].status,
        DependencyStatus::Healthy
    );
    assert_eq!(
        snapshot[&Dependency::Synthesis].status,
        DependencyStatus::Healthy
    );
    // The probe request itself succeeded.
    assert_eq!(
        snapshot[&Dependency::Network].status,
        DependencyStatus::Healthy
    );
}

#[tokio::test]
async fn failed_probe_marks_network_down() {
    let health = Arc::new(ServiceHealthTracker::default());
    let gateway = fast_gateway(Arc::clone(&health));

    probe_once(&gateway, "http://127.0.0.1:1").await;

    let snapshot: std::collections::HashMap<_, _> = health.snapshot().into_iter().collect();
    assert_eq!(
        snapshot[&Dependency::Network].status,
        DependencyStatus::Unreachable
    );
    assert_eq!(snapshot[&Dependency::Network].error_count, 1);
}

// ── Standalone TTS ─────────────────────────────────────────────────────

#[tokio::test]
async fn tts_path_returns_audio_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "audio_url": "https://cdn.example/tts/hello.mp3"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let health = Arc::new(ServiceHealthTracker::default());
    let gateway = fast_gateway(health);

    let spec = RequestSpec::post_json(
        format!("{}/tts", server.uri()),
        serde_json::json!({"text": "hello", "voice_id": "en-US-natalie"}),
    );
    let outcome = gateway.send(&spec).await;
    match outcome {
        Outcome::Success(payload) => {
            let parsed: voxloop_types::TtsResponse = serde_json::from_value(payload).unwrap();
            assert_eq!(
                parsed.audio_url.as_deref(),
                Some("https://cdn.example/tts/hello.mp3")
            );
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn tts_fallback_is_soft() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "fallback_text": "hello",
            "fallback_message": "synthesis quota exceeded"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let health = Arc::new(ServiceHealthTracker::default());
    let gateway = fast_gateway(health);

    let spec = RequestSpec::post_json(
        format!("{}/tts", server.uri()),
        serde_json::json!({"text": "hello", "voice_id": "en-US-natalie"}),
    );
    assert!(gateway.send(&spec).await.is_soft_fallback());
}
