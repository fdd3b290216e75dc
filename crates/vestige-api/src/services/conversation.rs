//! Conversation orchestration: session validation, memory retrieval, prompt
//! composition, and failure-contained reply streaming.

use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

use vestige_core::{
    ChatMessage, CompletionBackend, Error, Persona, PersonaRepository, Result, RetrievalMatch,
    SessionTicket, TokenStream,
};
use vestige_db::SessionManager;
use vestige_retrieval::{render_context, RetrievalAssembler};

/// Stream of reply text fragments ready to write to the response body.
/// Upstream failures have already been converted into a diagnostic fragment.
pub type ReplyStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Orchestrates one conversation turn end to end.
pub struct ConversationService {
    sessions: Arc<SessionManager>,
    personas: Arc<dyn PersonaRepository>,
    assembler: Arc<RetrievalAssembler>,
    completion: Arc<dyn CompletionBackend>,
}

impl ConversationService {
    pub fn new(
        sessions: Arc<SessionManager>,
        personas: Arc<dyn PersonaRepository>,
        assembler: Arc<RetrievalAssembler>,
        completion: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            sessions,
            personas,
            assembler,
            completion,
        }
    }

    /// Run one turn: validate the session, ground the last user message
    /// against the relationship's memories, compose the system prompt, and
    /// open the reply stream.
    ///
    /// Validation failures return before any model call. Retrieval failures
    /// degrade to an empty memory block. Once the stream is open, upstream
    /// errors terminate it with a single trailing diagnostic fragment.
    pub async fn converse(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        messages: Vec<ChatMessage>,
    ) -> Result<ReplyStream> {
        let ticket = self.sessions.validate(session_id, user_id).await?;

        let persona = self
            .personas
            .get_for_relationship(user_id, ticket.relationship_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "persona for relationship {}",
                    ticket.relationship_id
                ))
            })?;

        let last_user_turn = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let matches = match self
            .assembler
            .retrieve(ticket.relationship_id, last_user_turn)
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!(
                    subsystem = "conversation",
                    session_id = %session_id,
                    error_msg = %e,
                    "Memory retrieval failed, replying without context"
                );
                vec![]
            }
        };

        let system = compose_system(&persona, &ticket, &matches);
        debug!(
            subsystem = "conversation",
            session_id = %session_id,
            match_count = matches.len(),
            remaining_seconds = ticket.remaining_seconds,
            "Opening reply stream"
        );

        let upstream = self.completion.stream_chat(&system, &messages).await?;
        Ok(contain_stream_failures(upstream))
    }
}

/// Compose the system prompt: persona instructions, the time-remaining
/// notice, the fixed boundary line, and the memory block, in that order.
fn compose_system(persona: &Persona, ticket: &SessionTicket, matches: &[RetrievalMatch]) -> String {
    let minutes_left = ticket.remaining_seconds / 60;

    [
        persona.system_instructions(),
        format!("The session ends in about {} minute(s).", minutes_left),
        "Respect boundaries, never claim to be the real person.".to_string(),
        render_context(matches),
    ]
    .join("\n")
}

/// Wrap the model's token stream so a mid-flight failure emits one trailing
/// diagnostic fragment and then ends the stream. Never retried.
fn contain_stream_failures(upstream: TokenStream) -> ReplyStream {
    Box::pin(stream::unfold(Some(upstream), |state| async move {
        let mut upstream = state?;
        match upstream.next().await {
            Some(Ok(fragment)) => Some((fragment, Some(upstream))),
            Some(Err(e)) => {
                warn!(
                    subsystem = "conversation",
                    error_msg = %e,
                    "Reply stream failed mid-flight"
                );
                Some((format!("\n\n[stream error] {}", e), None))
            }
            None => None,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;
    use vestige_core::{
        Artifact, ChunkRepository, NewMemoryChunk, RitualSession, SessionRepository,
        UpsertPersonaRequest, Vector,
    };
    use vestige_inference::{MockCompletionBackend, MockEmbeddingBackend};

    struct MemorySessionRepository {
        sessions: Mutex<Vec<RitualSession>>,
    }

    #[async_trait]
    impl SessionRepository for MemorySessionRepository {
        async fn start(
            &self,
            _user_id: Uuid,
            _relationship_id: Uuid,
            _minutes: i64,
        ) -> Result<RitualSession> {
            unimplemented!()
        }

        async fn find(&self, session_id: Uuid) -> Result<Option<RitualSession>> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.id == session_id)
                .cloned())
        }

        async fn end_all(&self, user_id: Uuid) -> Result<u64> {
            let mut sessions = self.sessions.lock().unwrap();
            let mut count = 0;
            for s in sessions.iter_mut() {
                if s.user_id == user_id && s.active {
                    s.active = false;
                    count += 1;
                }
            }
            Ok(count)
        }
    }

    struct FakePersonaRepository {
        persona: Option<Persona>,
    }

    #[async_trait]
    impl PersonaRepository for FakePersonaRepository {
        async fn upsert(&self, _req: UpsertPersonaRequest) -> Result<Persona> {
            unimplemented!()
        }

        async fn get_for_relationship(
            &self,
            _user_id: Uuid,
            _relationship_id: Uuid,
        ) -> Result<Option<Persona>> {
            Ok(self.persona.clone())
        }
    }

    struct FakeChunkRepository {
        matches: Vec<RetrievalMatch>,
    }

    #[async_trait]
    impl ChunkRepository for FakeChunkRepository {
        async fn replace_for_artifact(
            &self,
            _artifact: &Artifact,
            _chunks: Vec<NewMemoryChunk>,
        ) -> Result<usize> {
            unimplemented!()
        }

        async fn rank_by_similarity(
            &self,
            _relationship_id: Uuid,
            _query: &Vector,
            _k: i64,
        ) -> Result<Vec<RetrievalMatch>> {
            Ok(self.matches.clone())
        }

    }

    struct Fixture {
        user_id: Uuid,
        session_id: Uuid,
        completion: Arc<MockCompletionBackend>,
        embedder: Arc<MockEmbeddingBackend>,
        service: ConversationService,
    }

    struct FixtureConfig {
        session_active: bool,
        session_expired: bool,
        persona: bool,
        matches: Vec<RetrievalMatch>,
        embedder: MockEmbeddingBackend,
        completion: MockCompletionBackend,
    }

    impl Default for FixtureConfig {
        fn default() -> Self {
            Self {
                session_active: true,
                session_expired: false,
                persona: true,
                matches: vec![],
                embedder: MockEmbeddingBackend::new().with_dimension(8),
                completion: MockCompletionBackend::new(vec!["Hello", " there."]),
            }
        }
    }

    fn persona_for(user_id: Uuid, relationship_id: Uuid) -> Persona {
        Persona {
            id: Uuid::new_v4(),
            user_id,
            relationship_id,
            name: "Ada".to_string(),
            tone: None,
            description: None,
            boundaries: None,
            topics_allow: vec![],
            topics_block: vec![],
            max_minutes: 60,
            farewell_style: "gentle".to_string(),
            system_prompt: None,
            language_code: "en".to_string(),
            tts_enabled: false,
            updated_at: Utc::now(),
        }
    }

    fn build(config: FixtureConfig) -> Fixture {
        let user_id = Uuid::new_v4();
        let relationship_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let now = Utc::now();

        let session_repo = Arc::new(MemorySessionRepository {
            sessions: Mutex::new(vec![RitualSession {
                id: session_id,
                user_id,
                relationship_id,
                started_at: now - Duration::minutes(5),
                ends_at: if config.session_expired {
                    now - Duration::seconds(1)
                } else {
                    now + Duration::minutes(25)
                },
                active: config.session_active,
            }]),
        });

        let personas = Arc::new(FakePersonaRepository {
            persona: config
                .persona
                .then(|| persona_for(user_id, relationship_id)),
        });

        let embedder = Arc::new(config.embedder);
        let chunks = Arc::new(FakeChunkRepository {
            matches: config.matches,
        });
        let assembler = Arc::new(RetrievalAssembler::new(embedder.clone(), chunks));
        let completion = Arc::new(config.completion);

        let service = ConversationService::new(
            Arc::new(SessionManager::new(session_repo, personas.clone())),
            personas,
            assembler,
            completion.clone(),
        );

        Fixture {
            user_id,
            session_id,
            completion,
            embedder,
            service,
        }
    }

    async fn collect(stream: ReplyStream) -> Vec<String> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_clean_stream_passes_fragments_through() {
        let fx = build(FixtureConfig::default());

        let stream = fx
            .service
            .converse(fx.user_id, fx.session_id, vec![ChatMessage::user("hi")])
            .await
            .unwrap();

        assert_eq!(collect(stream).await, vec!["Hello", " there."]);
    }

    #[tokio::test]
    async fn test_mid_flight_failure_emits_one_diagnostic_then_ends() {
        let fx = build(FixtureConfig {
            completion: MockCompletionBackend::new(vec!["one", "two", "three"]).fail_after(2),
            ..Default::default()
        });

        let stream = fx
            .service
            .converse(fx.user_id, fx.session_id, vec![ChatMessage::user("hi")])
            .await
            .unwrap();

        let fragments = collect(stream).await;
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0], "one");
        assert_eq!(fragments[1], "two");
        assert!(fragments[2].starts_with("\n\n[stream error] "));
        assert!(fragments[2].contains("mock stream failure"));
    }

    #[tokio::test]
    async fn test_ended_session_short_circuits_without_model_call() {
        let fx = build(FixtureConfig {
            session_active: false,
            ..Default::default()
        });

        let err = fx
            .service
            .converse(fx.user_id, fx.session_id, vec![ChatMessage::user("hi")])
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::SessionEnded(_)));
        assert!(fx.completion.calls().is_empty());
        assert_eq!(fx.embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_session_short_circuits_without_model_call() {
        let fx = build(FixtureConfig {
            session_expired: true,
            ..Default::default()
        });

        let err = fx
            .service
            .converse(fx.user_id, fx.session_id, vec![ChatMessage::user("hi")])
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::SessionExpired(_)));
        assert!(fx.completion.calls().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_session_looks_missing() {
        let fx = build(FixtureConfig::default());

        let err = fx
            .service
            .converse(Uuid::new_v4(), fx.session_id, vec![ChatMessage::user("hi")])
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_persona_is_not_found() {
        let fx = build(FixtureConfig {
            persona: false,
            ..Default::default()
        });

        let err = fx
            .service
            .converse(fx.user_id, fx.session_id, vec![ChatMessage::user("hi")])
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::NotFound(_)));
        assert!(fx.completion.calls().is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_failure_degrades_to_empty_context() {
        let fx = build(FixtureConfig {
            embedder: MockEmbeddingBackend::new().failing(),
            ..Default::default()
        });

        let stream = fx
            .service
            .converse(fx.user_id, fx.session_id, vec![ChatMessage::user("hi")])
            .await
            .unwrap();
        collect(stream).await;

        let calls = fx.completion.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].system.contains("# Memories"));
    }

    #[tokio::test]
    async fn test_system_prompt_composition_order() {
        let fx = build(FixtureConfig {
            matches: vec![
                RetrievalMatch {
                    content: "She loved the sea.".to_string(),
                    similarity: 0.9,
                },
                RetrievalMatch {
                    content: "Sunday pancakes.".to_string(),
                    similarity: 0.8,
                },
            ],
            ..Default::default()
        });

        let stream = fx
            .service
            .converse(
                fx.user_id,
                fx.session_id,
                vec![ChatMessage::user("tell me about her")],
            )
            .await
            .unwrap();
        collect(stream).await;

        let calls = fx.completion.calls();
        let system = &calls[0].system;

        assert!(system.starts_with("You are a caring simulation named Ada."));
        let time_pos = system.find("The session ends in about").unwrap();
        let boundary_pos = system
            .find("Respect boundaries, never claim to be the real person.")
            .unwrap();
        let memories_pos = system.find("# Memories (private context)").unwrap();
        assert!(time_pos < boundary_pos);
        assert!(boundary_pos < memories_pos);
        assert!(system.contains("- [m1] She loved the sea."));
        assert!(system.contains("- [m2] Sunday pancakes."));
    }

    #[tokio::test]
    async fn test_last_user_turn_drives_retrieval() {
        let fx = build(FixtureConfig::default());

        let stream = fx
            .service
            .converse(
                fx.user_id,
                fx.session_id,
                vec![
                    ChatMessage::user("first question"),
                    ChatMessage::assistant("an answer"),
                    ChatMessage::user("second question"),
                ],
            )
            .await
            .unwrap();
        collect(stream).await;

        let batches = fx.embedder.calls();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], vec!["second question".to_string()]);
    }

    #[tokio::test]
    async fn test_no_user_turn_skips_retrieval() {
        let fx = build(FixtureConfig::default());

        let stream = fx
            .service
            .converse(fx.user_id, fx.session_id, vec![])
            .await
            .unwrap();
        collect(stream).await;

        // Empty query never reaches the embedding backend.
        assert_eq!(fx.embedder.call_count(), 0);
        assert_eq!(fx.completion.calls().len(), 1);
    }
}
