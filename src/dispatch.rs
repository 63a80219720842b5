//! # Effect Dispatcher
//!
//! Runs the `Effect`s returned by `core::action::update` on tokio tasks and
//! reports every outcome back to the event loop as an `Action`.
//!
//! ```text
//!   update() ──► Vec<Effect> ──► Dispatcher::dispatch
//!                                   │ tokio::spawn
//!                                   ▼
//!                 AuthService / ChatStore / ChangeFeed / GenerationProvider
//!                                   │
//!   event loop ◄── mpsc::Sender<Action> ◄─┘
//! ```
//!
//! Errors never escape a task: they are logged and turned into the failure
//! variant of the matching result action.
//!
//! A change-feed subscription gets a forwarder task. It reports
//! `Subscribed` first and only then relays events, through the same
//! channel, so the reducer always sees the handle before the first event.
//! The forwarder ends when the feed drops the subscription's sink on close.

use std::future::Future;
use std::sync::{Arc, mpsc};

use chrono::Utc;
use log::{debug, info, warn};

use crate::backend::{
    self, AuthService, AuthSession, BackendError, ChangeFeed, ChatStore, FeedFilter,
    SignUpOutcome,
};
use crate::core::action::{Action, Effect};
use crate::core::copilot::CopilotError;
use crate::core::conversations::SEARCH_LIMIT;
use crate::core::session::SessionFile;
use crate::inference::GenerationProvider;

/// Everything an effect may touch.
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<dyn AuthService>,
    pub store: Arc<dyn ChatStore>,
    pub feed: Arc<dyn ChangeFeed>,
    pub copilot: Arc<dyn GenerationProvider>,
    pub session_file: SessionFile,
}

impl Services {
    /// Points the store and the feed at the given bearer token.
    fn use_token(&self, token: Option<String>) {
        self.store.set_access_token(token.clone());
        self.feed.set_access_token(token);
    }
}

pub struct Dispatcher {
    services: Services,
    keeper: Arc<SessionKeeper>,
    tx: mpsc::Sender<Action>,
}

impl Dispatcher {
    pub fn new(services: Services, tx: mpsc::Sender<Action>) -> Self {
        Self {
            services,
            keeper: Arc::new(SessionKeeper::default()),
            tx,
        }
    }

    /// Runs every effect. Returns true if one of them asked to quit.
    pub fn dispatch(&self, effects: Vec<Effect>) -> bool {
        let mut quit = false;
        for effect in effects {
            if effect == Effect::Quit {
                quit = true;
                continue;
            }
            self.run(effect);
        }
        quit
    }

    /// Spawns `work` and sends the action it resolves to.
    fn spawn<F>(&self, label: &'static str, work: F)
    where
        F: Future<Output = Action> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let action = work.await;
            if tx.send(action).is_err() {
                warn!("Failed to report {}: receiver dropped", label);
            }
        });
    }

    fn run(&self, effect: Effect) {
        debug!("Dispatching {:?}", effect);
        let services = self.services.clone();
        let keeper = self.keeper.clone();
        let tx = self.tx.clone();
        match effect {
            Effect::Quit => {}
            Effect::RestoreSession => {
                self.spawn("session restore", async move {
                    let session = restore_session(&services).await;
                    keeper.install(&services, session.clone()).await;
                    Action::SessionRestored(session)
                });
            }
            Effect::PersistSession(session) => {
                if let Err(e) = services.session_file.save(&session) {
                    warn!("Failed to persist session: {}", e);
                }
            }
            Effect::ForgetSession => {
                if let Err(e) = services.session_file.clear() {
                    warn!("Failed to remove stored session: {}", e);
                }
            }
            Effect::SignIn { email, password } => {
                self.spawn("sign-in", async move {
                    let result = services.auth.sign_in(&email, &password).await;
                    if let Ok(session) = &result {
                        info!("Signed in as {}", session.user.id);
                        keeper.install(&services, Some(session.clone())).await;
                    }
                    Action::SignedIn(result.map_err(|e| e.to_string()))
                });
            }
            Effect::SignUp {
                email,
                password,
                profile,
            } => {
                self.spawn("sign-up", async move {
                    let result = services.auth.sign_up(&email, &password, &profile).await;
                    if let Ok(SignUpOutcome::SignedIn(session)) = &result {
                        keeper.install(&services, Some(session.clone())).await;
                    }
                    Action::SignedUp(result.map_err(|e| e.to_string()))
                });
            }
            Effect::SignOut { access_token } => {
                self.spawn("sign-out", async move {
                    let result = services.auth.sign_out(&access_token).await;
                    keeper.install(&services, None).await;
                    Action::SignedOut(result.map_err(|e| e.to_string()))
                });
            }
            Effect::FetchProfile(user_id) => {
                self.spawn("profile fetch", async move {
                    let result = authorized(&services, &keeper, &tx, || {
                        services.store.fetch_profile(user_id)
                    })
                    .await;
                    Action::ProfileLoaded(result.map_err(|e| e.to_string()))
                });
            }
            Effect::SaveProfile { user_id, update } => {
                self.spawn("profile save", async move {
                    let result = authorized(&services, &keeper, &tx, || {
                        services.store.update_profile(user_id, &update)
                    })
                    .await;
                    Action::ProfileSaved(result.map(|()| update).map_err(|e| e.to_string()))
                });
            }
            Effect::LoadConversations(user_id) => {
                self.spawn("conversation list", async move {
                    let result = authorized(&services, &keeper, &tx, || {
                        services.store.list_conversations(user_id)
                    })
                    .await;
                    Action::ConversationsLoaded(result.map_err(|e| e.to_string()))
                });
            }
            Effect::SearchUsers { query, exclude } => {
                self.spawn("user search", async move {
                    let result = authorized(&services, &keeper, &tx, || {
                        services.store.search_profiles(&query, exclude, SEARCH_LIMIT)
                    })
                    .await;
                    Action::SearchResults {
                        query,
                        result: result.map_err(|e| e.to_string()),
                    }
                });
            }
            Effect::StartConversation { me, target } => {
                self.spawn("start conversation", async move {
                    let result = authorized(&services, &keeper, &tx, || {
                        backend::start_conversation(services.store.as_ref(), me, target)
                    })
                    .await;
                    Action::ConversationStarted(result.map_err(|e| e.to_string()))
                });
            }
            Effect::DeleteConversation(id) => {
                self.spawn("delete conversation", async move {
                    let result = authorized(&services, &keeper, &tx, || {
                        services.store.delete_conversation(id)
                    })
                    .await;
                    Action::ConversationDeleted {
                        id,
                        result: result.map_err(|e| e.to_string()),
                    }
                });
            }
            Effect::ClearConversation(id) => {
                self.spawn("clear conversation", async move {
                    let result = authorized(&services, &keeper, &tx, || {
                        services.store.clear_conversation(id)
                    })
                    .await;
                    Action::ConversationCleared {
                        id,
                        result: result.map_err(|e| e.to_string()),
                    }
                });
            }
            Effect::FetchHistory {
                conversation_id,
                generation,
            } => {
                self.spawn("history fetch", async move {
                    let result = authorized(&services, &keeper, &tx, || {
                        services.store.fetch_messages(conversation_id)
                    })
                    .await;
                    Action::HistoryLoaded {
                        generation,
                        result: result.map_err(|e| e.to_string()),
                    }
                });
            }
            Effect::OpenFeed {
                conversation_id,
                generation,
            } => self.open_feed(conversation_id, generation),
            Effect::CloseFeed(handle) => {
                tokio::spawn(async move {
                    let topic = handle.topic.clone();
                    match services.feed.close(handle).await {
                        Ok(()) => debug!("Closed subscription {}", topic),
                        Err(e) => warn!("Closing subscription {} failed: {}", topic, e),
                    }
                });
            }
            Effect::SendMessage(message) => {
                self.spawn("send message", async move {
                    let result = authorized(&services, &keeper, &tx, || {
                        services.store.send_message(&message)
                    })
                    .await;
                    Action::MessageSent {
                        conversation_id: message.conversation_id,
                        result: result.map_err(|e| e.to_string()),
                    }
                });
            }
            Effect::EditMessage {
                conversation_id,
                id,
                content,
            } => {
                self.spawn("edit message", async move {
                    let result = authorized(&services, &keeper, &tx, || {
                        services.store.edit_message(id, &content)
                    })
                    .await;
                    Action::MessageEdited {
                        conversation_id,
                        id,
                        content,
                        result: result.map_err(|e| e.to_string()),
                    }
                });
            }
            Effect::Generate(request) => {
                self.spawn("copilot request", async move {
                    info!(
                        "Copilot request #{} via {}",
                        request.seq,
                        services.copilot.name()
                    );
                    let result = services.copilot.generate(&request.prompt).await;
                    if let Err(e) = &result {
                        warn!("Copilot request #{} failed: {}", request.seq, e);
                    }
                    Action::CopilotResult {
                        seq: request.seq,
                        purpose: request.purpose,
                        result: result.map_err(CopilotError::from),
                    }
                });
            }
        }
    }

    fn open_feed(&self, conversation_id: uuid::Uuid, generation: u64) {
        let services = self.services.clone();
        let keeper = self.keeper.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let (sink, mut events) = tokio::sync::mpsc::unbounded_channel();
            let filter = FeedFilter::messages_in(conversation_id);
            // The join carries the access token, so it must be current.
            let opened = if report(keeper.ensure_fresh(&services, None).await, &tx) {
                services.feed.open(filter, sink).await
            } else {
                Err(BackendError::Auth("Session expired".to_string()))
            };
            let handle = match opened {
                Ok(handle) => handle,
                Err(e) => {
                    warn!("Subscribing to {} failed: {}", conversation_id, e);
                    let _ = tx.send(Action::SubscribeFailed {
                        generation,
                        error: e.to_string(),
                    });
                    return;
                }
            };

            let subscription_id = handle.id;
            info!("Subscribed to {} as {}", conversation_id, handle.topic);
            if tx.send(Action::Subscribed { generation, handle }).is_err() {
                warn!("Failed to report subscription: receiver dropped");
                return;
            }
            while let Some(event) = events.recv().await {
                if tx
                    .send(Action::FeedEvent {
                        subscription_id,
                        event,
                    })
                    .is_err()
                {
                    warn!("Failed to forward feed event: receiver dropped");
                    return;
                }
            }
            debug!("Feed forwarder for subscription {} finished", subscription_id);
        });
    }
}

// ============================================================================
// Session upkeep
// ============================================================================

/// The session the backend clients authenticate with while the app runs.
/// Refreshes go through the lock, so calls racing on one expired token
/// cause a single refresh.
#[derive(Default)]
struct SessionKeeper {
    current: tokio::sync::Mutex<Option<AuthSession>>,
}

/// What `SessionKeeper::ensure_fresh` did.
#[derive(Debug)]
enum Freshness {
    Unchanged,
    Refreshed(AuthSession),
    /// The refresh token was refused; the user is signed out.
    Lost,
}

impl SessionKeeper {
    async fn install(&self, services: &Services, session: Option<AuthSession>) {
        services.use_token(session.as_ref().map(|s| s.access_token.clone()));
        *self.current.lock().await = session;
    }

    async fn access_token(&self) -> Option<String> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    /// Refreshes the held session once if it has expired, or if `rejected`
    /// is still its access token.
    async fn ensure_fresh(&self, services: &Services, rejected: Option<&str>) -> Freshness {
        let mut current = self.current.lock().await;
        let Some(session) = current.as_ref() else {
            return Freshness::Unchanged;
        };
        let stale = match rejected {
            Some(token) => token == session.access_token,
            None => session.is_expired(Utc::now()),
        };
        if !stale {
            return Freshness::Unchanged;
        }

        info!("Access token for {} is stale, refreshing", session.user.id);
        let refresh_token = session.refresh_token.clone();
        match services.auth.refresh(&refresh_token).await {
            Ok(fresh) => {
                if let Err(e) = services.session_file.save(&fresh) {
                    warn!("Failed to persist refreshed session: {}", e);
                }
                services.use_token(Some(fresh.access_token.clone()));
                *current = Some(fresh.clone());
                Freshness::Refreshed(fresh)
            }
            Err(e) => {
                warn!("Session refresh failed, signing out: {}", e);
                if let Err(e) = services.session_file.clear() {
                    warn!("Failed to remove stored session: {}", e);
                }
                services.use_token(None);
                *current = None;
                Freshness::Lost
            }
        }
    }
}

/// Tells the reducer about a refresh. Returns false once the session is
/// gone.
fn report(freshness: Freshness, tx: &mpsc::Sender<Action>) -> bool {
    let (action, alive) = match freshness {
        Freshness::Unchanged => return true,
        Freshness::Refreshed(session) => (Action::SessionRefreshed(session), true),
        Freshness::Lost => (Action::SessionLost, false),
    };
    if tx.send(action).is_err() {
        warn!("Failed to report session change: receiver dropped");
    }
    alive
}

/// Runs a backend call with a current token. An expired token is refreshed
/// first; a call the backend refuses with `Auth` is retried once after a
/// refresh.
async fn authorized<T, F, Fut>(
    services: &Services,
    keeper: &SessionKeeper,
    tx: &mpsc::Sender<Action>,
    call: F,
) -> Result<T, BackendError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    if !report(keeper.ensure_fresh(services, None).await, tx) {
        return Err(BackendError::Auth("Session expired".to_string()));
    }
    let used = keeper.access_token().await;
    match call().await {
        Err(BackendError::Auth(message)) => {
            let Some(used) = used else {
                return Err(BackendError::Auth(message));
            };
            warn!("Backend refused the access token: {}", message);
            if !report(keeper.ensure_fresh(services, Some(&used)).await, tx) {
                return Err(BackendError::Auth(message));
            }
            call().await
        }
        result => result,
    }
}

/// Loads the stored session, refreshing it once if the access token has
/// expired, then asks the backend whether the user still exists. A session
/// that cannot be refreshed, or whose user is gone, is discarded.
async fn restore_session(services: &Services) -> Option<AuthSession> {
    let stored = services.session_file.load()?;
    let mut session = if stored.is_expired(Utc::now()) {
        info!("Stored session expired, refreshing");
        match services.auth.refresh(&stored.refresh_token).await {
            Ok(session) => {
                if let Err(e) = services.session_file.save(&session) {
                    warn!("Failed to persist refreshed session: {}", e);
                }
                session
            }
            Err(e) => {
                warn!("Session refresh failed, signing out: {}", e);
                forget_stored_session(services);
                return None;
            }
        }
    } else {
        stored
    };

    match services.auth.current_user(&session.access_token).await {
        Ok(user) if user.id == session.user.id => session.user = user,
        Ok(user) => {
            warn!(
                "Stored session belongs to {} but the token is {}'s, discarding",
                session.user.id, user.id
            );
            forget_stored_session(services);
            return None;
        }
        Err(BackendError::Auth(e)) => {
            warn!("Stored session was rejected, discarding: {}", e);
            forget_stored_session(services);
            return None;
        }
        // Offline start: keep the session, the first call will tell.
        Err(e) => warn!("Could not verify stored session: {}", e),
    }
    Some(session)
}

fn forget_stored_session(services: &Services) {
    if let Err(e) = services.session_file.clear() {
        warn!("Failed to remove stored session: {}", e);
    }
}
