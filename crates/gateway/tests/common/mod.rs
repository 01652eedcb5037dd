//! Shared harness: a real router on an ephemeral port, wired to scripted
//! downstream services and an in-memory chat store.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rc_domain::config::{Config, LockScope};
use rc_domain::error::{Error, Result};
use rc_gateway::api;
use rc_gateway::api::auth::hash_key;
use rc_gateway::runtime::{LocalPipeline, SessionOrchestrator, TurnGate};
use rc_gateway::sessions::SessionRegistry;
use rc_gateway::state::AppState;
use rc_pipeline::{PipelineRunner, PipelineSettings};
use rc_services::{GenerationGateway, RetrievalGateway, RetrievalResult, RetrievedDoc};
use rc_sessions::InMemoryChatStore;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

pub const SERVICE_KEY: &str = "test-service-key";

// ── Fakes ──────────────────────────────────────────────────────────

/// Always confident; records queries in arrival order.
#[derive(Default)]
pub struct RecordingRetrieval {
    pub queries: Mutex<Vec<String>>,
}

#[async_trait]
impl RetrievalGateway for RecordingRetrieval {
    async fn search(&self, query: &str, _top_k: u32) -> Result<RetrievalResult> {
        self.queries.lock().push(query.to_owned());
        if query == "retrieval down" {
            return Err(Error::Http("connection refused".into()));
        }
        Ok(RetrievalResult {
            rag_answer: format!("context for {query}"),
            confidence: 0.9,
            docs: vec![RetrievedDoc {
                text: format!("context for {query}"),
                score: 0.9,
            }],
        })
    }
}

/// Answers `reply to <question>` after `delay`, tracking how many
/// generations were in flight at once.
pub struct SlowEcho {
    pub delay: Duration,
    active: AtomicUsize,
    pub peak: AtomicUsize,
}

impl SlowEcho {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn answer(&self, prompt: &str) -> Result<String> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let question = question_of(prompt);
        if question == "break generation" {
            return Err(Error::Gateway {
                service: "llm_rag".into(),
                message: "HTTP 500".into(),
            });
        }
        Ok(format!("reply to {question}"))
    }
}

/// The user message inside either prompt template.
fn question_of(prompt: &str) -> &str {
    if let Some(rest) = prompt.split("Question: ").nth(1) {
        return rest.lines().next().unwrap_or("?");
    }
    prompt
        .trim_end_matches("\nRespond conversationally.")
        .rsplit("User: ")
        .next()
        .unwrap_or("?")
}

#[async_trait]
impl GenerationGateway for SlowEcho {
    async fn generate_with_context(&self, prompt: &str) -> Result<String> {
        self.answer(prompt).await
    }

    async fn generate_fallback(&self, prompt: &str) -> Result<String> {
        self.answer(prompt).await
    }
}

// ── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub state: AppState,
    pub addr: SocketAddr,
    pub store: Arc<InMemoryChatStore>,
    pub retrieval: Arc<RecordingRetrieval>,
    pub generation: Arc<SlowEcho>,
}

pub struct Options {
    pub scope: LockScope,
    pub service_key: Option<&'static str>,
    pub delay: Duration,
    pub config: Config,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            scope: LockScope::default(),
            service_key: None,
            delay: Duration::ZERO,
            config: Config::default(),
        }
    }
}

pub fn build_state(opts: Options) -> (AppState, Arc<InMemoryChatStore>, Arc<RecordingRetrieval>, Arc<SlowEcho>) {
    let mut config = opts.config;
    config.sessions.lock_scope = opts.scope;

    let store = Arc::new(InMemoryChatStore::new());
    let retrieval = Arc::new(RecordingRetrieval::default());
    let generation = Arc::new(SlowEcho::new(opts.delay));
    let runner = Arc::new(PipelineRunner::new(
        retrieval.clone(),
        generation.clone(),
        PipelineSettings::from(&config.pipeline),
    ));
    let executor = Arc::new(LocalPipeline::new(runner.clone()));
    let gate = Arc::new(TurnGate::new(opts.scope));
    let orchestrator = Arc::new(SessionOrchestrator::new(
        gate.clone(),
        store.clone(),
        executor.clone(),
        config.pipeline.history_limit,
    ));

    let state = AppState {
        config: Arc::new(config),
        registry: Arc::new(SessionRegistry::new()),
        gate,
        store: store.clone(),
        orchestrator,
        runner,
        executor,
        service_key_hash: opts.service_key.map(hash_key),
        started_at: Instant::now(),
        shutdown: CancellationToken::new(),
    };
    (state, store, retrieval, generation)
}

pub async fn spawn(opts: Options) -> Harness {
    let (state, store, retrieval, generation) = build_state(opts);
    let app = api::router(state.clone()).with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Harness {
        state,
        addr,
        store,
        retrieval,
        generation,
    }
}

// ── WebSocket client helpers ───────────────────────────────────────

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub async fn connect(addr: SocketAddr, session_id: &str) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/{session_id}"))
        .await
        .unwrap();
    ws
}

pub async fn send(ws: &mut Client, text: &str) {
    ws.send(Message::Text(text.to_owned())).await.unwrap();
}

/// Next text frame, or `None` once the server closed the socket.
pub async fn next_text(ws: &mut Client) -> Option<String> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame");
        match frame {
            Some(Ok(Message::Text(text))) => return Some(text),
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(_)) => continue,
        }
    }
}

pub fn is_event(frame: &str) -> bool {
    ["retrieval:", "rag:", "fallback:", "generated:", "memory:"]
        .iter()
        .any(|p| frame.starts_with(p))
}

/// Collect frames up to and including the bot reply.
pub async fn read_turn(ws: &mut Client) -> Vec<String> {
    let mut frames = Vec::new();
    while let Some(text) = next_text(ws).await {
        let done = !is_event(&text) && text != rc_gateway::runtime::orchestrator::FILE_ACK;
        frames.push(text);
        if done {
            break;
        }
    }
    frames
}
