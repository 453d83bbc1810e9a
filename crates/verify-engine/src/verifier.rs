//! Verification manager: orchestrates exchange results, wallet discovery,
//! backend registration, and local persistence.

use crate::api::ReconciliationApi;
use crate::error::{VerifyError, VerifyResult};
use crate::fsm::{VerifyMachine, VerifyMachineInput, VerifyPhase};
use crate::poll::{poll_until, PollConfig};
use crate::wallet::{ChainFamily, CreateWalletRequest, WalletError, WalletProvider};
use backend_client::UserProfile;
use bridge_storage::{ChainAddress, SessionStore, StorageResult};
use chrono::{Duration as ChronoDuration, Utc};
use session_bus::SessionBus;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Window after a successful verification during which re-entry stays
/// quiet: no visible loading signal, since the session is effectively
/// still fresh.
pub const RECENT_VERIFY_WINDOW_SECS: i64 = 15;

/// A phase transition notification.
///
/// `quiet` is set when the run started inside the grace window; consumers
/// use it to suppress loading UI, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub phase: VerifyPhase,
    pub quiet: bool,
}

/// Callback type for phase change notifications.
pub type PhaseCallback = Box<dyn Fn(PhaseChange) + Send + Sync>;

/// How a verification trigger resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// Reconciliation completed. The profile is `None` when the provider's
    /// wallet creation failed non-fatally.
    Verified { profile: Option<UserProfile> },
    /// This exact token was already verified; nothing was done.
    AlreadyVerified,
    /// No local token exists yet (legitimate during cold start).
    NoToken,
    /// The identity provider does not report an authenticated session.
    NotTriggered,
    /// Another run is in flight; this trigger was a no-op.
    InFlight,
    /// The token changed mid-run; the result was silently dropped.
    Discarded,
}

/// Internal result of the step sequence.
enum RunOutcome {
    Completed { profile: Option<UserProfile> },
    CreationTolerated,
    Discarded,
}

/// Orchestrates verification runs over the session store, the backend, the
/// wallet provider, and the session bus.
///
/// Guarantees at most one in-flight run; a second trigger while `Verifying`
/// (or for an already-verified token) is a no-op. Before persisting, each
/// run re-checks that the stored token is still the one it started with and
/// silently discards its result otherwise, so a concurrent logout is never
/// resurrected.
pub struct VerificationManager {
    store: Arc<SessionStore>,
    api: Arc<dyn ReconciliationApi>,
    wallets: Arc<dyn WalletProvider>,
    bus: SessionBus,
    fsm: Mutex<VerifyMachine>,
    last_verified: Mutex<Option<String>>,
    poll: PollConfig,
    grace_window: ChronoDuration,
    phase_callback: Mutex<Option<PhaseCallback>>,
}

impl VerificationManager {
    /// Create a manager with the default wallet-polling bounds.
    pub fn new(
        store: Arc<SessionStore>,
        api: Arc<dyn ReconciliationApi>,
        wallets: Arc<dyn WalletProvider>,
        bus: SessionBus,
    ) -> Self {
        Self::with_poll_config(store, api, wallets, bus, PollConfig::default())
    }

    /// Create a manager with custom wallet-polling bounds.
    pub fn with_poll_config(
        store: Arc<SessionStore>,
        api: Arc<dyn ReconciliationApi>,
        wallets: Arc<dyn WalletProvider>,
        bus: SessionBus,
        poll: PollConfig,
    ) -> Self {
        Self {
            store,
            api,
            wallets,
            bus,
            fsm: Mutex::new(VerifyMachine::new()),
            last_verified: Mutex::new(None),
            poll,
            grace_window: ChronoDuration::seconds(RECENT_VERIFY_WINDOW_SECS),
            phase_callback: Mutex::new(None),
        }
    }

    /// Set a callback to be notified of phase changes (for UI bindings).
    pub fn set_phase_callback(&self, callback: PhaseCallback) {
        let mut cb = self.phase_callback.lock().unwrap();
        *cb = Some(callback);
    }

    /// Current phase of the verification machine.
    pub fn phase(&self) -> VerifyPhase {
        let fsm = self.fsm.lock().unwrap();
        VerifyPhase::from(fsm.state())
    }

    /// The session bus this manager announces on.
    pub fn bus(&self) -> &SessionBus {
        &self.bus
    }

    /// Install a freshly exchanged session token: persist it, reset the
    /// verified marker (the new token has not been reconciled yet), and
    /// announce the change.
    pub fn install_session(&self, token: &str) -> StorageResult<()> {
        self.store.save_token(token)?;
        self.store.clear_last_verified_at();
        self.bus.broadcast_token_updated();
        info!("session token installed");
        Ok(())
    }

    /// Tear the session down: clear both backing stores and announce.
    ///
    /// A run in flight for the old token will notice the change at its
    /// stale-result check and discard itself.
    pub fn logout(&self) {
        self.teardown_session();
        let _ = self.transition(&VerifyMachineInput::Invalidate, false);
        self.bus.broadcast_token_updated();
        info!("logged out");
    }

    /// The global unauthorized reaction: any consuming-layer call that got a
    /// 401 routes here. Clears the session and broadcasts exactly once.
    pub fn handle_unauthorized(&self) {
        warn!("backend rejected the session token");
        self.teardown_session();
        let _ = self.transition(&VerifyMachineInput::Invalidate, false);
        self.bus.broadcast_token_updated();
    }

    /// Run verification if the trigger condition holds: the identity
    /// provider reports an authenticated session, a local token exists, and
    /// no run is in flight or already complete for that token.
    pub async fn verify(&self, provider_authenticated: bool) -> VerifyResult<VerifyOutcome> {
        if !provider_authenticated {
            debug!("identity provider not authenticated, skipping verification");
            return Ok(VerifyOutcome::NotTriggered);
        }

        let Some(token) = self.store.token() else {
            // Legitimate transient state during cold start. Return to Idle
            // without surfacing an error. A run in flight is left alone; it
            // discards itself at the stale-result check.
            let _ = self.transition(&VerifyMachineInput::Invalidate, true);
            return Ok(VerifyOutcome::NoToken);
        };

        if self.last_verified.lock().unwrap().as_deref() == Some(token.as_str()) {
            debug!("token already verified, short-circuiting");
            return Ok(VerifyOutcome::AlreadyVerified);
        }

        let quiet = self.within_grace_window();

        // Claim the sole in-flight slot. The state check and the Begin
        // transition happen under one lock so overlapping triggers cannot
        // both enter.
        {
            let mut fsm = self.fsm.lock().unwrap();
            if VerifyPhase::from(fsm.state()).is_transient() {
                debug!("verification already in flight, ignoring trigger");
                return Ok(VerifyOutcome::InFlight);
            }
            fsm.consume(&VerifyMachineInput::Begin).map_err(|_| {
                VerifyError::InvalidStateTransition(format!(
                    "cannot begin verification from {:?}",
                    fsm.state()
                ))
            })?;
        }
        self.notify_phase(VerifyPhase::Verifying, quiet);
        info!(quiet, "verification started");

        match self.run(&token).await {
            Ok(RunOutcome::Completed { profile }) => {
                *self.last_verified.lock().unwrap() = Some(token);
                self.transition(&VerifyMachineInput::Confirmed, quiet)?;
                info!("verification complete");
                Ok(VerifyOutcome::Verified { profile })
            }
            Ok(RunOutcome::CreationTolerated) => {
                *self.last_verified.lock().unwrap() = Some(token);
                self.transition(&VerifyMachineInput::Confirmed, quiet)?;
                info!("verified without backend profile; wallet creation deferred");
                Ok(VerifyOutcome::Verified { profile: None })
            }
            Ok(RunOutcome::Discarded) => {
                let _ = self.transition(&VerifyMachineInput::Aborted, quiet);
                debug!("token changed mid-run, result discarded");
                Ok(VerifyOutcome::Discarded)
            }
            Err(e) => {
                let previously_verified = self.store.last_verified_at().is_some();
                if matches!(e, VerifyError::Network(_)) && previously_verified {
                    // A transient failure must not tear down a session that
                    // a previous run verified.
                    warn!(error = %e, "transient failure, keeping previously verified session");
                    let _ = self.transition(&VerifyMachineInput::Aborted, quiet);
                } else {
                    warn!(error = %e, "verification failed, clearing session");
                    self.teardown_session();
                    let _ = self.transition(&VerifyMachineInput::Failed, quiet);
                    self.bus.broadcast_token_updated();
                }
                Err(e)
            }
        }
    }

    /// Spawn a task that re-runs the trigger check on every bus event.
    ///
    /// `provider_authenticated` is polled at each event; the usual trigger
    /// rules (token present, no run in flight, token not already verified)
    /// apply, so the re-broadcast emitted by a successful run terminates in
    /// an idempotent no-op rather than looping.
    pub fn spawn_bus_trigger<F>(self: &Arc<Self>, provider_authenticated: F) -> JoinHandle<()>
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        let manager = Arc::clone(self);
        let mut subscription = self.bus.subscribe();
        tokio::spawn(async move {
            while subscription.recv().await.is_some() {
                if let Err(e) = manager.verify(provider_authenticated()).await {
                    debug!(error = %e, "bus-triggered verification failed");
                }
            }
        })
    }

    /// The step sequence of one verification run.
    async fn run(&self, token: &str) -> Result<RunOutcome, VerifyError> {
        // Backend's current view of this subject.
        let initial_profile = self.api.fetch_me(token).await.map_err(VerifyError::from)?;
        let has_backend_address = initial_profile
            .as_ref()
            .map(|p| p.has_any_address())
            .unwrap_or(false);
        debug!(
            profile_exists = initial_profile.is_some(),
            has_backend_address, "backend state fetched"
        );

        // Resolve a wallet id from the provider, creating one only when the
        // backend has no address for this subject; an existing address
        // means a wallet already exists and a second one must not be made.
        let mut wallet_id = self.poll_wallet_id().await;
        if wallet_id.is_none() {
            if has_backend_address {
                debug!("no local wallet id but backend has addresses; not creating");
            } else {
                match self.wallets.create_wallet(CreateWalletRequest::primary()).await {
                    Ok(()) => {
                        wallet_id = self.poll_wallet_id().await;
                    }
                    Err(WalletError::Creation(msg)) => {
                        warn!(error = %msg, "provider wallet creation failed, tolerated");
                        return Ok(RunOutcome::CreationTolerated);
                    }
                    Err(WalletError::Provider(msg)) => {
                        return Err(VerifyError::Wallet(msg));
                    }
                }
            }
        }

        // Register when the backend had no record, then re-fetch once for
        // canonical post-registration state.
        let profile = match initial_profile {
            Some(profile) => Some(profile),
            None => {
                let wallet_id = wallet_id.ok_or(VerifyError::RegistrationBlocked)?;
                self.api
                    .register_wallet(token, &wallet_id)
                    .await
                    .map_err(VerifyError::from)?;
                self.api.fetch_me(token).await.map_err(VerifyError::from)?
            }
        };

        // A concurrent logout or re-login invalidates this run.
        match self.store.token() {
            Some(current) if current == token => {}
            _ => return Ok(RunOutcome::Discarded),
        }

        // Persist, record the verification, announce once.
        self.store.save_token(token)?;
        if let Some(profile) = &profile {
            if let Ok(snapshot) = serde_json::to_value(profile) {
                self.store.save_profile_snapshot(&snapshot);
            }
            self.store.save_wallet_addresses(&chain_addresses(profile));
        }
        self.store.set_last_verified_at(Utc::now());
        self.bus.broadcast_token_updated();

        Ok(RunOutcome::Completed { profile })
    }

    async fn poll_wallet_id(&self) -> Option<String> {
        poll_until(&self.poll, || {
            let wallets = Arc::clone(&self.wallets);
            async move {
                match wallets.list_wallets().await {
                    Ok(list) => list.into_iter().next().map(|w| w.wallet_id),
                    Err(e) => {
                        debug!(error = %e, "wallet list failed, will retry");
                        None
                    }
                }
            }
        })
        .await
    }

    fn within_grace_window(&self) -> bool {
        self.store
            .last_verified_at()
            .map(|at| Utc::now().signed_duration_since(at) <= self.grace_window)
            .unwrap_or(false)
    }

    /// Clear the session and reset in-memory bookkeeping. The caller emits
    /// the state transition and the single broadcast.
    fn teardown_session(&self) {
        self.store.clear_session();
        *self.last_verified.lock().unwrap() = None;
    }

    /// Transition the machine and notify the callback on change.
    fn transition(&self, input: &VerifyMachineInput, quiet: bool) -> VerifyResult<VerifyPhase> {
        let new_phase = {
            let mut fsm = self.fsm.lock().unwrap();
            let old_phase = VerifyPhase::from(fsm.state());
            fsm.consume(input).map_err(|_| {
                VerifyError::InvalidStateTransition(format!(
                    "cannot apply {:?} in state {:?}",
                    input,
                    fsm.state()
                ))
            })?;
            let new_phase = VerifyPhase::from(fsm.state());
            if new_phase == old_phase {
                return Ok(new_phase);
            }
            new_phase
        };
        self.notify_phase(new_phase, quiet);
        Ok(new_phase)
    }

    fn notify_phase(&self, phase: VerifyPhase, quiet: bool) {
        let cb = self.phase_callback.lock().unwrap();
        if let Some(callback) = cb.as_ref() {
            callback(PhaseChange { phase, quiet });
        }
    }
}

/// Extract the cached wallet-address list from a profile.
fn chain_addresses(profile: &UserProfile) -> Vec<ChainAddress> {
    let mut addresses = Vec::new();
    if let Some(address) = &profile.evm_address {
        addresses.push(ChainAddress {
            chain: ChainFamily::Evm.as_str().to_string(),
            address: address.clone(),
        });
    }
    if let Some(address) = &profile.solana_address {
        addresses.push(ChainAddress {
            chain: ChainFamily::Solana.as_str().to_string(),
            address: address.clone(),
        });
    }
    if let Some(address) = &profile.movement_address {
        addresses.push(ChainAddress {
            chain: ChainFamily::Movement.as_str().to_string(),
            address: address.clone(),
        });
    }
    addresses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::WalletSummary;
    use async_trait::async_trait;
    use backend_client::{ApiError, ApiResult};
    use bridge_storage::{MemoryStore, TokenStore};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted backend: queued responses, call counting, optional delay.
    struct MockApi {
        me_results: Mutex<VecDeque<ApiResult<Option<UserProfile>>>>,
        register_results: Mutex<VecDeque<ApiResult<UserProfile>>>,
        fetch_calls: AtomicUsize,
        register_calls: AtomicUsize,
        delay: Duration,
    }

    impl MockApi {
        fn new() -> Self {
            Self {
                me_results: Mutex::new(VecDeque::new()),
                register_results: Mutex::new(VecDeque::new()),
                fetch_calls: AtomicUsize::new(0),
                register_calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn queue_me(&self, result: ApiResult<Option<UserProfile>>) {
            self.me_results.lock().unwrap().push_back(result);
        }

        fn queue_register(&self, result: ApiResult<UserProfile>) {
            self.register_results.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl ReconciliationApi for MockApi {
        async fn fetch_me(&self, _token: &str) -> ApiResult<Option<UserProfile>> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.me_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }

        async fn register_wallet(&self, _token: &str, _wallet_id: &str) -> ApiResult<UserProfile> {
            self.register_calls.fetch_add(1, Ordering::SeqCst);
            self.register_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(full_profile()))
        }
    }

    /// Scripted wallet provider.
    struct MockWallets {
        wallets: Mutex<Vec<WalletSummary>>,
        create_error: Mutex<Option<WalletError>>,
        create_adds_wallet: bool,
        create_calls: AtomicUsize,
    }

    impl MockWallets {
        fn empty() -> Self {
            Self {
                wallets: Mutex::new(Vec::new()),
                create_error: Mutex::new(None),
                create_adds_wallet: true,
                create_calls: AtomicUsize::new(0),
            }
        }

        fn with_wallet(wallet_id: &str) -> Self {
            let mock = Self::empty();
            mock.wallets.lock().unwrap().push(WalletSummary {
                wallet_id: wallet_id.to_string(),
                name: Some("Primary".to_string()),
            });
            mock
        }

        fn failing_creation(error: WalletError) -> Self {
            let mock = Self::empty();
            *mock.create_error.lock().unwrap() = Some(error);
            mock
        }

        fn never_provisions() -> Self {
            let mut mock = Self::empty();
            mock.create_adds_wallet = false;
            mock
        }
    }

    #[async_trait]
    impl WalletProvider for MockWallets {
        async fn list_wallets(&self) -> Result<Vec<WalletSummary>, WalletError> {
            Ok(self.wallets.lock().unwrap().clone())
        }

        async fn create_wallet(&self, _request: CreateWalletRequest) -> Result<(), WalletError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.create_error.lock().unwrap().take() {
                return Err(error);
            }
            if self.create_adds_wallet {
                self.wallets.lock().unwrap().push(WalletSummary {
                    wallet_id: "w1".to_string(),
                    name: Some("Primary".to_string()),
                });
            }
            Ok(())
        }
    }

    fn full_profile() -> UserProfile {
        UserProfile {
            evm_address: Some("0xAbC0000000000000000000000000000000000001".to_string()),
            solana_address: Some("So1anaAddr".to_string()),
            movement_address: Some("0xMoveAddr".to_string()),
            referral_link: Some("https://tapdeck.cards/r/u1".to_string()),
            referral_count: Some(0),
        }
    }

    fn evm_only_profile() -> UserProfile {
        UserProfile {
            evm_address: Some("0xAbC0000000000000000000000000000000000001".to_string()),
            solana_address: None,
            movement_address: None,
            referral_link: None,
            referral_count: None,
        }
    }

    struct Harness {
        manager: Arc<VerificationManager>,
        store: Arc<SessionStore>,
        api: Arc<MockApi>,
        wallets: Arc<MockWallets>,
        bus: SessionBus,
    }

    fn harness(api: MockApi, wallets: MockWallets) -> Harness {
        let store = Arc::new(SessionStore::new(TokenStore::new(
            Box::new(MemoryStore::new()),
            Box::new(MemoryStore::new()),
        )));
        let bus = SessionBus::new();
        let api = Arc::new(api);
        let wallets = Arc::new(wallets);
        let manager = Arc::new(VerificationManager::with_poll_config(
            store.clone(),
            api.clone(),
            wallets.clone(),
            bus.clone(),
            PollConfig {
                timeout: Duration::from_millis(50),
                interval: Duration::from_millis(10),
            },
        ));
        Harness {
            manager,
            store,
            api,
            wallets,
            bus,
        }
    }

    fn drain(sub: &mut session_bus::SessionSubscription) -> usize {
        let mut count = 0;
        while sub.try_recv().is_some() {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn test_not_triggered_without_provider_auth() {
        let h = harness(MockApi::new(), MockWallets::empty());
        h.store.save_token("t1").unwrap();

        let outcome = h.manager.verify(false).await.unwrap();
        assert_eq!(outcome, VerifyOutcome::NotTriggered);
        assert_eq!(h.api.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_token_aborts_silently() {
        let h = harness(MockApi::new(), MockWallets::empty());

        let outcome = h.manager.verify(true).await.unwrap();
        assert_eq!(outcome, VerifyOutcome::NoToken);
        assert_eq!(h.manager.phase(), VerifyPhase::Idle);
        assert_eq!(h.api.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_new_user_end_to_end() {
        let h = harness(MockApi::new(), MockWallets::empty());
        h.store.save_token("t1").unwrap();
        // No backend record yet; registration then canonical re-fetch.
        h.api.queue_me(Ok(None));
        h.api.queue_register(Ok(full_profile()));
        h.api.queue_me(Ok(Some(full_profile())));
        let mut sub = h.bus.subscribe();

        let outcome = h.manager.verify(true).await.unwrap();

        assert_eq!(
            outcome,
            VerifyOutcome::Verified {
                profile: Some(full_profile())
            }
        );
        assert_eq!(h.manager.phase(), VerifyPhase::Verified);
        assert_eq!(h.api.fetch_calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.api.register_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.wallets.create_calls.load(Ordering::SeqCst), 1);

        // Persisted state: token, profile snapshot, all three chain slots,
        // verification marker.
        assert_eq!(h.store.token(), Some("t1".to_string()));
        assert!(h.store.profile_snapshot().is_some());
        assert_eq!(h.store.wallet_addresses().len(), 3);
        assert!(h.store.last_verified_at().is_some());
        assert_eq!(drain(&mut sub), 1);
    }

    #[tokio::test]
    async fn test_idempotent_reentry_makes_no_network_calls() {
        let h = harness(MockApi::new(), MockWallets::with_wallet("w1"));
        h.store.save_token("t1").unwrap();
        h.api.queue_me(Ok(Some(evm_only_profile())));

        let first = h.manager.verify(true).await.unwrap();
        assert!(matches!(first, VerifyOutcome::Verified { .. }));
        let fetches = h.api.fetch_calls.load(Ordering::SeqCst);

        let second = h.manager.verify(true).await.unwrap();
        assert_eq!(second, VerifyOutcome::AlreadyVerified);
        assert_eq!(h.api.fetch_calls.load(Ordering::SeqCst), fetches);
        assert_eq!(h.manager.phase(), VerifyPhase::Verified);
    }

    #[tokio::test]
    async fn test_concurrent_triggers_run_one_sequence() {
        let api = MockApi::new().with_delay(Duration::from_millis(50));
        api.queue_me(Ok(Some(evm_only_profile())));
        let h = harness(api, MockWallets::with_wallet("w1"));
        h.store.save_token("t1").unwrap();

        let a = h.manager.clone();
        let b = h.manager.clone();
        let (first, second) = tokio::join!(a.verify(true), b.verify(true));
        let outcomes = [first.unwrap(), second.unwrap()];

        assert!(outcomes
            .iter()
            .any(|o| matches!(o, VerifyOutcome::Verified { .. })));
        assert!(outcomes.iter().any(|o| *o == VerifyOutcome::InFlight));
        assert_eq!(h.api.fetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.api.register_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backend_address_suppresses_wallet_creation() {
        let h = harness(MockApi::new(), MockWallets::empty());
        h.store.save_token("t1").unwrap();
        // Backend already has an address; no wallet id is cached locally.
        h.api.queue_me(Ok(Some(evm_only_profile())));

        let outcome = h.manager.verify(true).await.unwrap();

        assert!(matches!(outcome, VerifyOutcome::Verified { .. }));
        assert_eq!(h.wallets.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.api.register_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_clears_token_and_broadcasts_once() {
        let h = harness(MockApi::new(), MockWallets::with_wallet("w1"));
        h.store.save_token("t1").unwrap();
        h.api.queue_me(Err(ApiError::Unauthorized));
        let mut sub = h.bus.subscribe();

        let result = h.manager.verify(true).await;
        assert!(matches!(result, Err(VerifyError::Unauthorized)));

        assert_eq!(h.store.token(), None);
        assert_eq!(h.manager.phase(), VerifyPhase::Idle);
        assert_eq!(drain(&mut sub), 1);
    }

    #[tokio::test]
    async fn test_wallet_timeout_blocks_registration() {
        let h = harness(MockApi::new(), MockWallets::never_provisions());
        h.store.save_token("t1").unwrap();
        h.api.queue_me(Ok(None));
        let mut sub = h.bus.subscribe();

        let result = h.manager.verify(true).await;
        assert!(matches!(result, Err(VerifyError::RegistrationBlocked)));

        // Fatal: the session is gone and listeners were told exactly once.
        assert_eq!(h.store.token(), None);
        assert_eq!(h.manager.phase(), VerifyPhase::Idle);
        assert_eq!(drain(&mut sub), 1);
    }

    #[tokio::test]
    async fn test_creation_error_is_tolerated() {
        let h = harness(
            MockApi::new(),
            MockWallets::failing_creation(WalletError::Creation("quota".to_string())),
        );
        h.store.save_token("t1").unwrap();
        h.api.queue_me(Ok(None));
        let mut sub = h.bus.subscribe();

        let outcome = h.manager.verify(true).await.unwrap();

        assert_eq!(outcome, VerifyOutcome::Verified { profile: None });
        assert_eq!(h.manager.phase(), VerifyPhase::Verified);
        // Session kept; nothing persisted or announced by this run.
        assert_eq!(h.store.token(), Some("t1".to_string()));
        assert!(h.store.last_verified_at().is_none());
        assert_eq!(drain(&mut sub), 0);
    }

    #[tokio::test]
    async fn test_non_creation_provider_error_is_fatal() {
        let h = harness(
            MockApi::new(),
            MockWallets::failing_creation(WalletError::Provider("down".to_string())),
        );
        h.store.save_token("t1").unwrap();
        h.api.queue_me(Ok(None));

        let result = h.manager.verify(true).await;
        assert!(matches!(result, Err(VerifyError::Wallet(_))));
        assert_eq!(h.store.token(), None);
    }

    #[tokio::test]
    async fn test_logout_mid_run_discards_result() {
        let api = MockApi::new().with_delay(Duration::from_millis(50));
        api.queue_me(Ok(Some(evm_only_profile())));
        let h = harness(api, MockWallets::with_wallet("w1"));
        h.store.save_token("t1").unwrap();

        let manager = h.manager.clone();
        let run = tokio::spawn(async move { manager.verify(true).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.store.clear_token();

        let outcome = run.await.unwrap().unwrap();
        assert_eq!(outcome, VerifyOutcome::Discarded);
        // The logged-out session must not be resurrected.
        assert_eq!(h.store.token(), None);
        assert!(h.store.last_verified_at().is_none());
        assert_eq!(h.manager.phase(), VerifyPhase::Idle);
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_previously_verified_token() {
        let h = harness(MockApi::new(), MockWallets::with_wallet("w1"));
        h.store.save_token("t1").unwrap();
        // A previous run verified this token (marker persisted).
        h.store
            .set_last_verified_at(Utc::now() - ChronoDuration::minutes(5));
        h.api.queue_me(Err(ApiError::Api {
            status: 503,
            message: "unavailable".to_string(),
        }));

        let result = h.manager.verify(true).await;
        assert!(matches!(result, Err(VerifyError::Network(_))));

        assert_eq!(h.store.token(), Some("t1".to_string()));
        assert_eq!(h.manager.phase(), VerifyPhase::Idle);
    }

    #[tokio::test]
    async fn test_transient_failure_on_unverified_token_is_fatal() {
        let h = harness(MockApi::new(), MockWallets::with_wallet("w1"));
        h.store.save_token("t1").unwrap();
        h.api.queue_me(Err(ApiError::Api {
            status: 503,
            message: "unavailable".to_string(),
        }));

        let result = h.manager.verify(true).await;
        assert!(matches!(result, Err(VerifyError::Network(_))));
        assert_eq!(h.store.token(), None);
    }

    #[tokio::test]
    async fn test_grace_window_keeps_reentry_quiet() {
        let h = harness(MockApi::new(), MockWallets::with_wallet("w1"));
        h.store.save_token("t1").unwrap();
        h.store.set_last_verified_at(Utc::now());
        h.api.queue_me(Ok(Some(evm_only_profile())));

        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        h.manager.set_phase_callback(Box::new(move |change| {
            sink.lock().unwrap().push(change);
        }));

        h.manager.verify(true).await.unwrap();

        let changes = changes.lock().unwrap();
        assert!(!changes.is_empty());
        assert!(changes.iter().all(|c| c.quiet));
    }

    #[tokio::test]
    async fn test_first_verification_is_not_quiet() {
        let h = harness(MockApi::new(), MockWallets::with_wallet("w1"));
        h.store.save_token("t1").unwrap();
        h.api.queue_me(Ok(Some(evm_only_profile())));

        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        h.manager.set_phase_callback(Box::new(move |change| {
            sink.lock().unwrap().push(change);
        }));

        h.manager.verify(true).await.unwrap();

        let changes = changes.lock().unwrap();
        assert!(changes.iter().any(|c| c.phase == VerifyPhase::Verifying));
        assert!(changes.iter().all(|c| !c.quiet));
    }

    #[tokio::test]
    async fn test_install_session_resets_marker_and_broadcasts() {
        let h = harness(MockApi::new(), MockWallets::empty());
        h.store.set_last_verified_at(Utc::now());
        let mut sub = h.bus.subscribe();

        h.manager.install_session("t2").unwrap();

        assert_eq!(h.store.token(), Some("t2".to_string()));
        assert!(h.store.last_verified_at().is_none());
        assert_eq!(drain(&mut sub), 1);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let h = harness(MockApi::new(), MockWallets::with_wallet("w1"));
        h.store.save_token("t1").unwrap();
        h.api.queue_me(Ok(Some(full_profile())));
        h.manager.verify(true).await.unwrap();
        let mut sub = h.bus.subscribe();

        h.manager.logout();

        assert_eq!(h.store.token(), None);
        assert!(h.store.profile_snapshot().is_none());
        assert!(h.store.wallet_addresses().is_empty());
        assert_eq!(h.manager.phase(), VerifyPhase::Idle);
        assert_eq!(drain(&mut sub), 1);

        // A fresh token after logout verifies from scratch.
        h.store.save_token("t2").unwrap();
        h.api.queue_me(Ok(Some(evm_only_profile())));
        let outcome = h.manager.verify(true).await.unwrap();
        assert!(matches!(outcome, VerifyOutcome::Verified { .. }));
    }

    #[tokio::test]
    async fn test_handle_unauthorized_reaction() {
        let h = harness(MockApi::new(), MockWallets::with_wallet("w1"));
        h.store.save_token("t1").unwrap();
        h.api.queue_me(Ok(Some(evm_only_profile())));
        h.manager.verify(true).await.unwrap();
        let mut sub = h.bus.subscribe();

        h.manager.handle_unauthorized();

        assert_eq!(h.store.token(), None);
        assert_eq!(h.manager.phase(), VerifyPhase::Idle);
        assert_eq!(drain(&mut sub), 1);
    }

    #[tokio::test]
    async fn test_bus_trigger_verifies_after_install() {
        let h = harness(MockApi::new(), MockWallets::with_wallet("w1"));
        h.api.queue_me(Ok(Some(evm_only_profile())));
        let trigger = h.manager.spawn_bus_trigger(|| true);

        h.manager.install_session("t1").unwrap();

        for _ in 0..100 {
            if h.manager.phase() == VerifyPhase::Verified {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(h.manager.phase(), VerifyPhase::Verified);
        assert_eq!(h.api.fetch_calls.load(Ordering::SeqCst), 1);

        trigger.abort();
    }

    #[test]
    fn test_chain_addresses_extraction() {
        let addresses = chain_addresses(&full_profile());
        assert_eq!(addresses.len(), 3);
        assert_eq!(addresses[0].chain, "evm");
        assert_eq!(addresses[1].chain, "solana");
        assert_eq!(addresses[2].chain, "movement");

        let addresses = chain_addresses(&evm_only_profile());
        assert_eq!(addresses.len(), 1);
    }
}
