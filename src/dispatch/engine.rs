//! Dispatch Engine: serializes user messages against a single in-flight
//! gateway call and reveals replies at a typing pace.
//!
//! All mutation goes through [`DispatchEngine::submit`]; the presentation
//! layer reads snapshots or subscribes to [`EngineEvent`]s.

use crate::SessionId;
use crate::config::{Config, PacingConfig};
use crate::conversation::{ConversationStore, Message};
use crate::dispatch::pacing::{Pacer, TokioPacer};
use crate::dispatch::state::{
    DispatchEffect, DispatchEvent, DispatchState, PendingMessage, SubmissionId,
};
use crate::gateway::{GatewayClient, ReplyGateway};
use crate::session::Session;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};

/// Capacity of the presentation event channel. Slow subscribers lag, they
/// never block the engine.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A message was appended to the conversation log.
    MessageAppended(Message),
    /// The typing indicator changed; `None` hides it.
    TypingChanged(Option<String>),
    /// Input became enabled (idle) or disabled (dispatching).
    InputEnabled(bool),
}

/// What happened to an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A dispatch started for it right away.
    Dispatched,
    /// It waits behind the current dispatch.
    Queued,
}

/// Receipt for an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub id: SubmissionId,
    pub disposition: Disposition,
}

struct EngineState {
    messages: Vec<Message>,
    typing: Option<String>,
    dispatch: DispatchState,
    next_submission: u64,
}

struct Shared<G, P> {
    session: Session,
    store: ConversationStore,
    gateway: GatewayClient<G>,
    pacer: P,
    pacing: PacingConfig,
    typing_status: String,
    quick_questions: Vec<String>,
    state: Mutex<EngineState>,
    events: broadcast::Sender<EngineEvent>,
    busy: watch::Sender<bool>,
}

/// Handle to the engine. Cheap to clone; clones drive the same conversation.
pub struct DispatchEngine<G, P = TokioPacer> {
    shared: Arc<Shared<G, P>>,
}

impl<G, P> Clone for DispatchEngine<G, P> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<G, P> std::fmt::Debug for DispatchEngine<G, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("session", &self.shared.session)
            .finish_non_exhaustive()
    }
}

impl<G: ReplyGateway, P: Pacer> DispatchEngine<G, P> {
    /// Create the engine for `session`, restoring its log or greeting a new one.
    pub fn new(session: Session, gateway: GatewayClient<G>, pacer: P, config: &Config) -> Self {
        let store = ConversationStore::new(session.clone());

        let messages = match store.load() {
            Some(messages) => {
                tracing::info!(
                    session_id = %session.id(),
                    count = messages.len(),
                    "conversation restored"
                );
                messages
            }
            None => {
                let welcome = vec![Message::agent(config.content.welcome.clone())];
                store.save(&welcome);
                tracing::info!(session_id = %session.id(), "new conversation started");
                welcome
            }
        };

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (busy, _) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                session,
                store,
                gateway,
                pacer,
                pacing: config.pacing,
                typing_status: config.content.typing_status.clone(),
                quick_questions: config.quick_questions.clone(),
                state: Mutex::new(EngineState {
                    messages,
                    typing: None,
                    dispatch: DispatchState::new(),
                    next_submission: 1,
                }),
                events,
                busy,
            }),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        self.shared.session.id()
    }

    /// Snapshot of the conversation log, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    /// Current typing indicator text, if shown.
    pub fn typing_status(&self) -> Option<String> {
        self.lock().typing.clone()
    }

    /// False while a dispatch is underway.
    pub fn is_input_enabled(&self) -> bool {
        !self.lock().dispatch.is_busy()
    }

    /// Submissions waiting behind the current dispatch, in order.
    pub fn pending(&self) -> Vec<(SubmissionId, String)> {
        self.lock()
            .dispatch
            .queue()
            .iter()
            .map(|message| (message.id, message.text.clone()))
            .collect()
    }

    pub fn quick_questions(&self) -> &[String] {
        &self.shared.quick_questions
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    /// Accept a user message.
    ///
    /// Blank input is ignored and returns `None`. Otherwise the message is
    /// appended to the log at once, then dispatched or queued. Must be called
    /// from within a tokio runtime.
    pub fn submit(&self, text: &str) -> Option<Submission> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let (id, effects) = {
            let mut state = self.lock();
            self.append_locked(&mut state, Message::user(text));

            let id = SubmissionId(state.next_submission);
            state.next_submission += 1;

            let effects = state.dispatch.apply(DispatchEvent::Submitted(PendingMessage {
                id,
                text: text.to_string(),
            }));
            self.publish_busy(&state);
            (id, effects)
        };

        let mut disposition = Disposition::Queued;
        for effect in effects {
            match effect {
                DispatchEffect::Dispatch {
                    message,
                    after_cooldown,
                } => {
                    disposition = Disposition::Dispatched;
                    let engine = self.clone();
                    tokio::spawn(async move { engine.drive(message, after_cooldown).await });
                }
                DispatchEffect::Queued(queued) => {
                    tracing::debug!(session_id = %self.session_id(), submission = %queued, "submission queued");
                }
                DispatchEffect::Cancelled(_) | DispatchEffect::BecameIdle => {}
            }
        }

        Some(Submission { id, disposition })
    }

    /// Submit the configured quick question at `index`.
    pub fn submit_quick_question(&self, index: usize) -> Option<Submission> {
        let question = self.shared.quick_questions.get(index)?.clone();
        self.submit(&question)
    }

    /// Withdraw a submission that is still queued. The user's message stays
    /// in the log; only the pending dispatch is dropped.
    pub fn cancel_queued(&self, id: SubmissionId) -> bool {
        let effects = self.lock().dispatch.apply(DispatchEvent::CancelRequested(id));
        let cancelled = effects.contains(&DispatchEffect::Cancelled(id));
        if cancelled {
            tracing::debug!(session_id = %self.session_id(), submission = %id, "queued submission cancelled");
        }
        cancelled
    }

    /// Resolve once the engine is idle with nothing queued.
    pub async fn wait_idle(&self) {
        let mut busy = self.shared.busy.subscribe();
        // The sender lives in `shared`, which `self` keeps alive.
        let _ = busy.wait_for(|busy| !*busy).await;
    }

    /// Run dispatches back to back until the queue drains.
    async fn drive(self, first: PendingMessage, first_after_cooldown: bool) {
        let mut next = Some((first, first_after_cooldown));

        while let Some((message, after_cooldown)) = next.take() {
            if after_cooldown {
                self.shared
                    .pacer
                    .pause(self.shared.pacing.turn_cooldown())
                    .await;
            }

            self.reveal(&message).await;

            let effects = {
                let mut state = self.lock();
                let effects = state.dispatch.apply(DispatchEvent::RevealCompleted);
                self.publish_busy(&state);
                effects
            };

            for effect in effects {
                match effect {
                    DispatchEffect::Dispatch {
                        message,
                        after_cooldown,
                    } => next = Some((message, after_cooldown)),
                    DispatchEffect::BecameIdle => {
                        tracing::debug!(session_id = %self.session_id(), "dispatch queue drained");
                    }
                    DispatchEffect::Queued(_) | DispatchEffect::Cancelled(_) => {}
                }
            }
        }
    }

    /// Reveal protocol for one dispatch.
    async fn reveal(&self, message: &PendingMessage) {
        let shared = &self.shared;
        tracing::debug!(session_id = %self.session_id(), submission = %message.id, "dispatch started");

        self.set_typing(Some(shared.typing_status.clone()));
        let reply = shared.gateway.send(shared.session.id(), &message.text).await;

        let count = reply.segments.len();
        for (index, segment) in reply.segments.into_iter().enumerate() {
            if index > 0 {
                self.set_typing(Some(shared.typing_status.clone()));
                shared.pacer.pause(shared.pacing.typing_hold()).await;
            }

            self.set_typing(None);
            self.append(Message::agent(segment));

            if index + 1 < count {
                shared.pacer.pause(shared.pacing.segment_gap()).await;
            }
        }

        self.set_typing(None);
        tracing::debug!(
            session_id = %self.session_id(),
            submission = %message.id,
            outcome = ?reply.outcome,
            segments = count,
            "dispatch finished"
        );
    }

    fn append(&self, message: Message) {
        let mut state = self.lock();
        self.append_locked(&mut state, message);
    }

    fn append_locked(&self, state: &mut EngineState, message: Message) {
        state.messages.push(message.clone());
        self.shared.store.save(&state.messages);
        let _ = self.shared.events.send(EngineEvent::MessageAppended(message));
    }

    fn set_typing(&self, status: Option<String>) {
        let mut state = self.lock();
        if state.typing != status {
            state.typing.clone_from(&status);
            let _ = self.shared.events.send(EngineEvent::TypingChanged(status));
        }
    }

    fn publish_busy(&self, state: &EngineState) {
        let busy = state.dispatch.is_busy();
        let changed = self.shared.busy.send_if_modified(|current| {
            if *current == busy {
                false
            } else {
                *current = busy;
                true
            }
        });
        if changed {
            let _ = self.shared.events.send(EngineEvent::InputEnabled(!busy));
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_EMPTY_REPLY_FALLBACK, DEFAULT_FAILURE_FALLBACK, DEFAULT_WELCOME};
    use crate::conversation::Origin;
    use crate::dispatch::pacing::RecordingPacer;
    use crate::error::GatewayError;
    use crate::session::{MemoryStorage, SessionStorage};

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    type Respond = Box<dyn Fn(&str) -> Result<String, GatewayError> + Send + Sync>;

    struct FakeInner {
        received: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        gate: Semaphore,
        respond: Respond,
    }

    /// Scripted reply service that records every call.
    #[derive(Clone)]
    struct FakeGateway {
        inner: Arc<FakeInner>,
    }

    impl FakeGateway {
        fn new(respond: impl Fn(&str) -> Result<String, GatewayError> + Send + Sync + 'static) -> Self {
            Self::with_gate(respond, Semaphore::MAX_PERMITS)
        }

        /// Calls block until `release` hands out permits.
        fn gated(respond: impl Fn(&str) -> Result<String, GatewayError> + Send + Sync + 'static) -> Self {
            Self::with_gate(respond, 0)
        }

        fn with_gate(
            respond: impl Fn(&str) -> Result<String, GatewayError> + Send + Sync + 'static,
            permits: usize,
        ) -> Self {
            Self {
                inner: Arc::new(FakeInner {
                    received: Mutex::new(Vec::new()),
                    in_flight: AtomicUsize::new(0),
                    max_in_flight: AtomicUsize::new(0),
                    gate: Semaphore::new(permits),
                    respond: Box::new(respond),
                }),
            }
        }

        fn release(&self, calls: usize) {
            self.inner.gate.add_permits(calls);
        }

        fn received(&self) -> Vec<String> {
            self.inner.received.lock().expect("received lock").clone()
        }

        fn max_in_flight(&self) -> usize {
            self.inner.max_in_flight.load(Ordering::SeqCst)
        }
    }

    impl ReplyGateway for FakeGateway {
        async fn exchange(&self, _session_id: &SessionId, text: &str) -> Result<String, GatewayError> {
            self.inner
                .received
                .lock()
                .expect("received lock")
                .push(text.to_string());
            let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Ok(permit) = self.inner.gate.acquire().await {
                permit.forget();
            }
            tokio::task::yield_now().await;

            self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
            (self.inner.respond)(text)
        }
    }

    struct Harness {
        engine: DispatchEngine<FakeGateway, RecordingPacer>,
        gateway: FakeGateway,
        pacer: RecordingPacer,
        storage: MemoryStorage,
    }

    fn harness_with(storage: MemoryStorage, gateway: FakeGateway, config: Config) -> Harness {
        let pacer = RecordingPacer::new();
        let session = Session::open(Arc::new(storage.clone()), config.storage.clone());
        let engine = DispatchEngine::new(
            session,
            GatewayClient::new(gateway.clone(), &config),
            pacer.clone(),
            &config,
        );
        Harness {
            engine,
            gateway,
            pacer,
            storage,
        }
    }

    fn harness(gateway: FakeGateway) -> Harness {
        harness_with(MemoryStorage::new(), gateway, Config::default())
    }

    fn agent_texts(messages: &[Message]) -> Vec<String> {
        messages
            .iter()
            .filter(|message| message.origin == Origin::Agent)
            .map(|message| message.text.clone())
            .collect()
    }

    fn drain(receiver: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn new_session_starts_with_one_persisted_welcome() {
        let h = harness(FakeGateway::new(|_| Ok(String::new())));

        let messages = h.engine.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].origin, Origin::Agent);
        assert_eq!(messages[0].text, DEFAULT_WELCOME);
        assert!(h.engine.is_input_enabled());
        assert!(h.engine.typing_status().is_none());

        let key = format!("chat_messages_{}", h.engine.session_id());
        assert!(h.storage.get(&key).is_some(), "welcome is persisted");
    }

    #[tokio::test]
    async fn financing_question_reveals_two_segments_in_order() {
        let h = harness(FakeGateway::new(|_| {
            Ok("Yes!\\kWe have flexible options.".to_string())
        }));
        let mut events = h.engine.subscribe();

        let submission = h
            .engine
            .submit("Do you offer financing?")
            .expect("non-blank submission is accepted");
        assert_eq!(submission.disposition, Disposition::Dispatched);
        h.engine.wait_idle().await;

        assert_eq!(h.gateway.received(), vec!["Do you offer financing?"]);

        let messages = h.engine.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].origin, Origin::User);
        assert_eq!(messages[1].text, "Do you offer financing?");
        assert_eq!(messages[2].text, "Yes!");
        assert_eq!(messages[3].text, "We have flexible options.");

        // First segment: gap after it. Second segment: typing hold before it.
        assert_eq!(
            h.pacer.pauses(),
            vec![Duration::from_millis(200), Duration::from_millis(1000)]
        );

        let events = drain(&mut events);
        let first_reply = events
            .iter()
            .position(|e| matches!(e, EngineEvent::MessageAppended(m) if m.text == "Yes!"))
            .expect("first reply event");
        let second_reply = events
            .iter()
            .position(|e| matches!(e, EngineEvent::MessageAppended(m) if m.text == "We have flexible options."))
            .expect("second reply event");
        assert!(
            events[first_reply..second_reply]
                .iter()
                .any(|e| matches!(e, EngineEvent::TypingChanged(Some(_)))),
            "typing indicator must show between the two segments"
        );
        assert_eq!(events.last(), Some(&EngineEvent::InputEnabled(true)));
        assert!(h.engine.typing_status().is_none());
    }

    #[tokio::test]
    async fn failed_exchange_appends_one_contact_fallback() {
        let h = harness(FakeGateway::new(|_| {
            Err(GatewayError::Transport("connection refused".into()))
        }));

        h.engine.submit("hello?");
        h.engine.wait_idle().await;

        let messages = h.engine.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].origin, Origin::Agent);
        assert_eq!(messages[2].text, DEFAULT_FAILURE_FALLBACK);
        assert!(h.engine.is_input_enabled());
        assert!(h.engine.typing_status().is_none());
        assert!(h.pacer.pauses().is_empty());
    }

    #[tokio::test]
    async fn empty_or_delimiter_only_reply_uses_greeting_fallback() {
        for raw in ["", "\\k"] {
            let reply = raw.to_string();
            let h = harness(FakeGateway::new(move |_| Ok(reply.clone())));

            h.engine.submit("hi");
            h.engine.wait_idle().await;

            let messages = h.engine.messages();
            assert_eq!(messages.len(), 3);
            assert_eq!(messages[2].text, DEFAULT_EMPTY_REPLY_FALLBACK);
        }
    }

    #[tokio::test]
    async fn engine_stays_usable_after_a_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let h = harness(FakeGateway::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(GatewayError::Decode("not json".into()))
            } else {
                Ok("Back online.".to_string())
            }
        }));

        h.engine.submit("first");
        h.engine.wait_idle().await;
        h.engine.submit("second");
        h.engine.wait_idle().await;

        assert_eq!(
            agent_texts(&h.engine.messages()),
            vec![DEFAULT_WELCOME, DEFAULT_FAILURE_FALLBACK, "Back online."]
        );
    }

    #[tokio::test]
    async fn queued_message_drains_after_a_failed_exchange() {
        let h = harness(FakeGateway::new(|text| {
            if text == "a" {
                Err(GatewayError::Status {
                    status: 502,
                    body: "upstream down".into(),
                })
            } else {
                Ok("second ok".to_string())
            }
        }));

        h.engine.submit("a");
        let queued = h.engine.submit("b").expect("accepted");
        assert_eq!(queued.disposition, Disposition::Queued);
        h.engine.wait_idle().await;

        assert_eq!(h.gateway.received(), vec!["a", "b"]);
        assert_eq!(h.gateway.max_in_flight(), 1);
        assert_eq!(
            agent_texts(&h.engine.messages())[1..],
            [DEFAULT_FAILURE_FALLBACK, "second ok"]
        );
        let cooldowns = h
            .pacer
            .pauses()
            .into_iter()
            .filter(|pause| *pause == Duration::from_millis(2000))
            .count();
        assert_eq!(cooldowns, 1);
        assert!(h.engine.is_input_enabled());
    }

    /// Never answers its first call; answers every later one.
    struct StallsOnce {
        calls: AtomicUsize,
    }

    impl ReplyGateway for StallsOnce {
        async fn exchange(&self, _session_id: &SessionId, text: &str) -> Result<String, GatewayError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::future::pending::<()>().await;
            }
            Ok(format!("re {text}"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_exchange_times_out_and_queue_continues() {
        let config = Config::default();
        let session = Session::open(Arc::new(MemoryStorage::new()), config.storage.clone());
        let gateway = StallsOnce {
            calls: AtomicUsize::new(0),
        };
        let engine = DispatchEngine::new(
            session,
            GatewayClient::new(gateway, &config),
            RecordingPacer::new(),
            &config,
        );
        let started = tokio::time::Instant::now();

        engine.submit("a");
        engine.submit("b");
        engine.wait_idle().await;

        assert!(started.elapsed() >= config.gateway.timeout());
        assert_eq!(
            agent_texts(&engine.messages())[1..],
            [DEFAULT_FAILURE_FALLBACK, "re b"]
        );
        assert!(engine.is_input_enabled());
    }

    #[tokio::test]
    async fn rapid_submissions_are_serialized_and_none_dropped() {
        let h = harness(FakeGateway::new(|text| Ok(format!("re {text} a\\kre {text} b"))));

        let first = h.engine.submit("one").expect("accepted");
        let second = h.engine.submit("two").expect("accepted");
        let third = h.engine.submit("three").expect("accepted");
        assert_eq!(first.disposition, Disposition::Dispatched);
        assert_eq!(second.disposition, Disposition::Queued);
        assert_eq!(third.disposition, Disposition::Queued);
        assert!(!h.engine.is_input_enabled());

        h.engine.wait_idle().await;

        assert_eq!(h.gateway.received(), vec!["one", "two", "three"]);
        assert_eq!(h.gateway.max_in_flight(), 1);
        assert_eq!(
            agent_texts(&h.engine.messages())[1..],
            [
                "re one a", "re one b", "re two a", "re two b", "re three a", "re three b"
            ]
        );

        let cooldowns = h
            .pacer
            .pauses()
            .into_iter()
            .filter(|pause| *pause == Duration::from_millis(2000))
            .count();
        assert_eq!(cooldowns, 2, "one cooldown before each queued turn");
        assert!(h.engine.is_input_enabled());
    }

    #[tokio::test]
    async fn user_messages_appear_before_their_replies_arrive() {
        let h = harness(FakeGateway::gated(|_| Ok("ok".to_string())));

        h.engine.submit("first");
        h.engine.submit("second");

        let texts: Vec<String> = h.engine.messages().iter().map(|m| m.text.clone()).collect();
        assert_eq!(texts, vec![DEFAULT_WELCOME, "first", "second"]);
        assert_eq!(
            h.engine.pending(),
            vec![(SubmissionId(2), "second".to_string())]
        );

        h.gateway.release(2);
        h.engine.wait_idle().await;
        assert!(h.engine.pending().is_empty());
    }

    #[tokio::test]
    async fn cancelled_submission_is_never_dispatched() {
        let h = harness(FakeGateway::gated(|text| Ok(format!("re {text}"))));

        let first = h.engine.submit("first").expect("accepted");
        let second = h.engine.submit("second").expect("accepted");
        h.engine.submit("third").expect("accepted");

        assert!(!h.engine.cancel_queued(first.id), "in-flight dispatch cannot be cancelled");
        assert!(h.engine.cancel_queued(second.id));
        assert!(!h.engine.cancel_queued(second.id), "already cancelled");

        h.gateway.release(2);
        h.engine.wait_idle().await;

        assert_eq!(h.gateway.received(), vec!["first", "third"]);
        let messages = h.engine.messages();
        assert!(
            messages
                .iter()
                .any(|m| m.origin == Origin::User && m.text == "second"),
            "the user's own message stays in the log"
        );
        assert_eq!(agent_texts(&messages)[1..], ["re first", "re third"]);
    }

    #[tokio::test]
    async fn blank_submissions_are_ignored() {
        let h = harness(FakeGateway::new(|_| Ok("never".to_string())));

        assert!(h.engine.submit("").is_none());
        assert!(h.engine.submit("   \n\t").is_none());

        assert_eq!(h.engine.messages().len(), 1);
        assert!(h.gateway.received().is_empty());
        assert!(h.engine.is_input_enabled());
    }

    #[tokio::test]
    async fn submissions_are_trimmed() {
        let h = harness(FakeGateway::new(|_| Ok("ok".to_string())));

        h.engine.submit("  Do you provide free estimates?  ");
        h.engine.wait_idle().await;

        assert_eq!(h.gateway.received(), vec!["Do you provide free estimates?"]);
        assert_eq!(h.engine.messages()[1].text, "Do you provide free estimates?");
    }

    #[tokio::test]
    async fn quick_questions_flow_through_submit() {
        let mut config = Config::default();
        config.quick_questions = vec![
            "What types of flooring do you offer?".into(),
            "Do you provide free estimates?".into(),
        ];
        let h = harness_with(
            MemoryStorage::new(),
            FakeGateway::new(|_| Ok("Yes.".to_string())),
            config,
        );

        assert!(h.engine.submit_quick_question(5).is_none());
        h.engine
            .submit_quick_question(1)
            .expect("configured question is submitted");
        h.engine.wait_idle().await;

        assert_eq!(h.gateway.received(), vec!["Do you provide free estimates?"]);
        assert_eq!(h.engine.quick_questions().len(), 2);
    }

    #[tokio::test]
    async fn reload_restores_log_without_new_welcome() {
        let storage = MemoryStorage::new();
        let first = harness_with(
            storage.clone(),
            FakeGateway::new(|_| Ok("Yes!\\kWe have flexible options.".to_string())),
            Config::default(),
        );
        first.engine.submit("Do you offer financing?");
        first.engine.wait_idle().await;
        let before = first.engine.messages();

        let reloaded = harness_with(
            storage,
            FakeGateway::new(|_| Ok(String::new())),
            Config::default(),
        );

        assert_eq!(reloaded.engine.session_id(), first.engine.session_id());
        assert_eq!(reloaded.engine.messages(), before);
        assert_eq!(before.len(), 4);
    }

    #[tokio::test]
    async fn corrupted_log_starts_fresh_with_welcome() {
        let storage = MemoryStorage::new();
        let probe = Session::open(Arc::new(storage.clone()), Config::default().storage);
        storage.set(&probe.log_key(), "{{definitely not json").expect("set");

        let h = harness_with(
            storage,
            FakeGateway::new(|_| Ok(String::new())),
            Config::default(),
        );

        let messages = h.engine.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, DEFAULT_WELCOME);
    }

    #[tokio::test]
    async fn every_append_is_persisted() {
        let h = harness(FakeGateway::new(|_| Ok("a\\kb\\kc".to_string())));

        h.engine.submit("go");
        h.engine.wait_idle().await;

        let reopened = ConversationStore::new(Session::open(
            Arc::new(h.storage.clone()),
            Config::default().storage,
        ))
        .load()
        .expect("persisted log");
        assert_eq!(reopened, h.engine.messages());
        assert_eq!(reopened.len(), 5);
    }
}
