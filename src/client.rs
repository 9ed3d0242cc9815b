use crate::{
    chain::{
        ChainCache,
        ChainField,
        ChainReading,
        ContractCall,
        LuckyMoneyChain,
        RpcChain,
        SubmitError,
        TxKind,
        TxOutcome,
    },
    config::{
        AppConfig,
        Network,
        NetworkTarget,
    },
    grab::{
        self,
        GrabLookupPolicy,
        GrabResult,
    },
    indexer_client::{
        DistributionIndex,
        DistributionRecord,
        IndexerClient,
    },
    panels::{
        self,
        GrabButton,
        OwnerForm,
    },
    tracker::{
        Confirmation,
        Observation,
        Panel,
        PendingTransaction,
        RefreshHook,
        Submission,
        TransactionTracker,
        TxHandle,
        TxStatus,
    },
    ui::{
        self,
        UserEvent,
    },
    units,
    view_state::{
        self,
        ConnectionState,
        ViewState,
    },
};
use alloy::{
    primitives::{
        Address,
        TxHash,
        U256,
    },
    signers::local::PrivateKeySigner,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use futures::future::join_all;
use std::time::Duration;
use tokio::{
    sync::mpsc,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    error,
    info,
    warn,
};

pub const HISTORY_DEPTH: usize = 10;
const MAX_ERRORS: usize = 50;

/// Builds the chain handle for a network. Swapped out for fakes in tests.
pub trait Connector: Send + Sync + 'static {
    type Chain: LuckyMoneyChain;

    fn connect(&self, target: &NetworkTarget) -> Result<Self::Chain>;
}

pub struct RpcConnector {
    signer: Option<PrivateKeySigner>,
}

impl RpcConnector {
    pub fn new(signer: Option<PrivateKeySigner>) -> Self {
        Self { signer }
    }
}

impl Connector for RpcConnector {
    type Chain = RpcChain;

    fn connect(&self, target: &NetworkTarget) -> Result<RpcChain> {
        let chain = match &self.signer {
            Some(signer) => RpcChain::with_signer(
                target.rpc_url.clone(),
                target.contract,
                signer.clone(),
            ),
            None => RpcChain::read_only(target.rpc_url.clone(), target.contract),
        };
        Ok(chain)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ControllerSettings {
    pub poll_interval: Duration,
    pub confirmations: u64,
    pub grab_policy: GrabLookupPolicy,
    pub history_depth: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(crate::config::DEFAULT_POLL_MS),
            confirmations: 1,
            grab_policy: GrabLookupPolicy::default(),
            history_depth: HISTORY_DEPTH,
        }
    }
}

impl From<&AppConfig> for ControllerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            confirmations: config.confirmations,
            ..Self::default()
        }
    }
}

/// A transaction waiting for the user to approve signing it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SigningPrompt {
    pub panel: Panel,
    pub call: ContractCall,
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub view: ViewState,
    pub network: Network,
    pub chain_id: Option<u64>,
    pub connection: ConnectionState,
    pub account: Option<Address>,
    pub native_balance: Option<U256>,
    pub contract: Address,
    pub owner: Option<Address>,
    pub balance: Option<U256>,
    pub remaining_count: Option<U256>,
    pub history: Vec<DistributionRecord>,
    pub owner_form: OwnerForm,
    pub owner_busy: bool,
    pub landing_busy: bool,
    pub grab_button: GrabButton,
    pub pending: Vec<PendingTransaction>,
    pub prompt: Option<SigningPrompt>,
    pub grab_result: Option<GrabResult>,
    pub status: String,
    pub errors: Vec<String>,
}

/// Messages from background tasks to the UI loop. Poll results carry the
/// generation they were started under so results from a previous network are
/// dropped.
#[derive(Debug)]
pub enum WorkerEvent {
    Connected { generation: u64, chain_id: u64 },
    ConnectFailed { generation: u64, error: String },
    Chain { generation: u64, reading: ChainReading },
    History {
        generation: u64,
        records: Vec<DistributionRecord>,
    },
    /// The node's answer to a signed transaction.
    Submitted {
        handle: TxHandle,
        result: std::result::Result<TxHash, SubmitError>,
    },
    TxOutcome { handle: TxHandle, outcome: TxOutcome },
    GrabAmount { hash: TxHash, amount: U256 },
}

enum ReadCommand {
    Refresh(Vec<ChainField>),
}

enum HistoryCommand {
    Refresh,
}

/// Dropping this closes the command channels, which stops both workers.
struct Workers {
    reads: mpsc::UnboundedSender<ReadCommand>,
    history: mpsc::UnboundedSender<HistoryCommand>,
}

pub struct AppController<K: Connector, I: DistributionIndex> {
    connector: K,
    index: I,
    settings: ControllerSettings,
    targets: Vec<NetworkTarget>,
    current: usize,
    generation: u64,
    chain: Option<K::Chain>,
    workers: Option<Workers>,
    connection: ConnectionState,
    chain_id: Option<u64>,
    account: Option<Address>,
    mounted: bool,
    cache: ChainCache,
    history: Vec<DistributionRecord>,
    tracker: TransactionTracker,
    owner_form: OwnerForm,
    prompt: Option<SigningPrompt>,
    grab_result: Option<GrabResult>,
    status: String,
    errors: Vec<String>,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl<K: Connector, I: DistributionIndex> AppController<K, I> {
    pub fn new(
        connector: K,
        index: I,
        targets: Vec<NetworkTarget>,
        settings: ControllerSettings,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WorkerEvent>)> {
        if targets.is_empty() {
            return Err(eyre!("at least one network target is required"));
        }
        let (events, events_rx) = mpsc::unbounded_channel();
        let controller = Self {
            connector,
            index,
            settings,
            targets,
            current: 0,
            generation: 0,
            chain: None,
            workers: None,
            connection: ConnectionState::Disconnected,
            chain_id: None,
            account: None,
            mounted: false,
            cache: ChainCache::default(),
            history: Vec::new(),
            tracker: TransactionTracker::default(),
            owner_form: OwnerForm::default(),
            prompt: None,
            grab_result: None,
            status: String::new(),
            errors: Vec::new(),
            events,
        };
        Ok((controller, events_rx))
    }

    pub fn start(&mut self) {
        self.connect();
    }

    fn target(&self) -> &NetworkTarget {
        &self.targets[self.current]
    }

    pub fn network(&self) -> Network {
        self.target().network
    }

    pub fn connect(&mut self) {
        if self.connection != ConnectionState::Disconnected {
            return;
        }
        let target = self.target().clone();
        let chain = match self.connector.connect(&target) {
            Ok(chain) => chain,
            Err(err) => {
                self.push_errors(vec![format!(
                    "Connecting to {} failed: {err:#}",
                    target.network
                )]);
                return;
            }
        };
        if chain.signer_address().is_none() {
            self.set_status(
                "No wallet unlocked. Restart with --wallet <name> or --private-key.",
            );
            return;
        }
        info!(network = %target.network, url = %target.rpc_url, contract = %target.contract, "connecting");
        self.connection = ConnectionState::Connecting;
        self.chain = Some(chain.clone());
        self.set_status(format!("Connecting to {}...", target.network));

        let generation = self.generation;
        let events = self.events.clone();
        tokio::spawn(async move {
            let event = match chain.chain_id().await {
                Ok(chain_id) => WorkerEvent::Connected {
                    generation,
                    chain_id,
                },
                Err(err) => WorkerEvent::ConnectFailed {
                    generation,
                    error: format!("{err:#}"),
                },
            };
            let _ = events.send(event);
        });
    }

    pub fn disconnect(&mut self) {
        self.generation += 1;
        self.workers = None;
        self.chain = None;
        self.connection = ConnectionState::Disconnected;
        self.chain_id = None;
        self.account = None;
        self.prompt = None;
        self.invalidate_caches();
        self.set_status("Disconnected");
    }

    /// Moves to the next configured network and reconnects when a session was
    /// active.
    pub fn switch_network(&mut self) {
        let was_connected = self.connection != ConnectionState::Disconnected;
        self.disconnect();
        self.current = (self.current + 1) % self.targets.len();
        info!(network = %self.network(), generation = self.generation, "switched network");
        self.set_status(format!("Switched to {}", self.network()));
        if was_connected {
            self.connect();
        }
    }

    fn invalidate_caches(&mut self) {
        self.cache = ChainCache::default();
        self.history.clear();
    }

    pub fn mark_mounted(&mut self) {
        self.mounted = true;
    }

    pub fn view_state(&self) -> ViewState {
        view_state::resolve(
            self.mounted,
            self.connection,
            self.cache.snapshot().as_ref(),
            self.account,
        )
    }

    fn grab_button(&self) -> GrabButton {
        panels::grab_button(
            self.cache.remaining_count,
            self.tracker.is_busy(Panel::Participant),
        )
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            view: self.view_state(),
            network: self.network(),
            chain_id: self.chain_id,
            connection: self.connection,
            account: self.account,
            native_balance: self.cache.native_balance,
            contract: self.target().contract,
            owner: self.cache.owner,
            balance: self.cache.balance,
            remaining_count: self.cache.remaining_count,
            history: self.history.clone(),
            owner_form: self.owner_form.clone(),
            owner_busy: self.tracker.is_busy(Panel::Owner),
            landing_busy: self.tracker.is_busy(Panel::Landing),
            grab_button: self.grab_button(),
            pending: self.tracker.pending().cloned().collect(),
            prompt: self.prompt.clone(),
            grab_result: self.grab_result.clone(),
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    fn is_stale(&self, generation: u64) -> bool {
        if generation != self.generation {
            debug!(generation, current = self.generation, "dropping stale worker result");
            return true;
        }
        false
    }

    pub fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Connected {
                generation,
                chain_id,
            } => {
                if self.is_stale(generation) {
                    return;
                }
                self.on_connected(chain_id);
            }
            WorkerEvent::ConnectFailed { generation, error } => {
                if self.is_stale(generation) {
                    return;
                }
                self.connection = ConnectionState::Disconnected;
                self.chain = None;
                self.push_errors(vec![format!(
                    "Connection to {} failed: {error}",
                    self.network()
                )]);
            }
            WorkerEvent::Chain {
                generation,
                reading,
            } => {
                if self.is_stale(generation) {
                    return;
                }
                self.cache.apply(reading);
            }
            WorkerEvent::History {
                generation,
                records,
            } => {
                if self.is_stale(generation) {
                    return;
                }
                self.history = records;
            }
            WorkerEvent::Submitted { handle, result } => self.on_submitted(handle, result),
            WorkerEvent::TxOutcome { handle, outcome } => {
                self.on_tx_outcome(handle, outcome);
            }
            WorkerEvent::GrabAmount { hash, amount } => {
                info!(%hash, %amount, "grab amount resolved");
                self.grab_result = Some(GrabResult { amount });
                self.set_status(format!("You grabbed {} ETH", units::format_ether(amount)));
            }
        }
    }

    fn on_connected(&mut self, chain_id: u64) {
        let Some(chain) = self.chain.clone() else {
            return;
        };
        let expected = self.network().chain_id();
        if chain_id != expected {
            warn!(chain_id, expected, "RPC endpoint reports an unexpected chain id");
            self.push_errors(vec![format!(
                "RPC endpoint reports chain id {chain_id}, expected {expected} for {}",
                self.network()
            )]);
        }
        self.connection = ConnectionState::Connected;
        self.chain_id = Some(chain_id);
        self.account = chain.signer_address();
        self.workers = Some(self.spawn_workers(chain));
        self.set_status(format!("Connected to {} ({chain_id})", self.network()));
    }

    fn spawn_workers(&self, chain: K::Chain) -> Workers {
        let (reads_tx, reads_rx) = mpsc::unbounded_channel();
        let (history_tx, history_rx) = mpsc::unbounded_channel();
        tokio::spawn(chain_read_worker(
            chain,
            self.generation,
            self.settings.poll_interval,
            reads_rx,
            self.events.clone(),
        ));
        tokio::spawn(history_worker(
            self.index.clone(),
            self.generation,
            self.settings.poll_interval,
            self.settings.history_depth,
            history_rx,
            self.events.clone(),
        ));
        Workers {
            reads: reads_tx,
            history: history_tx,
        }
    }

    fn on_submitted(
        &mut self,
        handle: TxHandle,
        result: std::result::Result<TxHash, SubmitError>,
    ) {
        match self.tracker.submitted(handle, result) {
            Submission::Accepted(tx) => {
                let hash = tx.hash.map(|h| h.to_string()).unwrap_or_default();
                self.set_status(format!("{} submitted: {hash}", kind_label(tx.kind)));
            }
            Submission::Rejected { kind, reason } => {
                info!(?kind, %reason, "signer rejected the transaction");
                self.set_status("Transaction cancelled");
            }
            Submission::Failed { kind, error } => {
                self.push_errors(vec![format!("{} failed: {error}", kind_label(kind))]);
            }
            Submission::Unknown => {
                debug!(?handle, "submission result for unknown handle");
            }
        }
    }

    fn on_tx_outcome(&mut self, handle: TxHandle, outcome: TxOutcome) {
        match self.tracker.observe(handle, outcome) {
            Observation::Unchanged => {}
            Observation::Failed { hash, kind, reason } => {
                self.push_errors(vec![format!(
                    "{} transaction {hash} failed: {reason}",
                    kind_label(kind)
                )]);
            }
            Observation::Confirmed(confirmation) => self.run_refresh_hooks(confirmation),
        }
    }

    fn run_refresh_hooks(&mut self, confirmation: Confirmation) {
        // gas was spent whatever the kind
        let mut fields = vec![ChainField::NativeBalance];
        let mut refresh_history = false;
        for hook in &confirmation.hooks {
            match hook {
                RefreshHook::Owner => fields.push(ChainField::Owner),
                RefreshHook::Balance => fields.push(ChainField::Balance),
                RefreshHook::RemainingCount => fields.push(ChainField::RemainingCount),
                RefreshHook::History => refresh_history = true,
                RefreshHook::ClearOwnerForm => self.owner_form.clear(),
                RefreshHook::LookupGrabAmount => self.spawn_grab_lookup(confirmation.hash),
            }
        }
        if let Some(workers) = &self.workers {
            let _ = workers.reads.send(ReadCommand::Refresh(fields));
            if refresh_history {
                let _ = workers.history.send(HistoryCommand::Refresh);
            }
        }
        self.set_status(format!("{} confirmed", kind_label(confirmation.kind)));
    }

    fn spawn_grab_lookup(&self, hash: TxHash) {
        let Some(recipient) = self.account else {
            return;
        };
        let index = self.index.clone();
        let policy = self.settings.grab_policy;
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Some(amount) =
                grab::lookup_grab_amount(&index, policy, recipient, hash).await
            {
                let _ = events.send(WorkerEvent::GrabAmount { hash, amount });
            }
        });
    }

    fn open_prompt(&mut self, panel: Panel, call: ContractCall) {
        if self.tracker.is_busy(panel) {
            self.set_status("A transaction from this screen is still pending");
            return;
        }
        self.prompt = Some(SigningPrompt { panel, call });
    }

    pub fn prepare_create(&mut self) {
        if self.view_state() != ViewState::OwnerPanel {
            return;
        }
        if !self.owner_form.can_submit(self.tracker.is_busy(Panel::Owner)) {
            return;
        }
        match self.owner_form.build_call() {
            Ok(call) => self.open_prompt(Panel::Owner, call),
            Err(err) => self.owner_form.error = Some(err.to_string()),
        }
    }

    pub fn prepare_grab(&mut self) {
        if self.view_state() != ViewState::ParticipantPanel || !self.grab_button().is_enabled()
        {
            return;
        }
        let Some(recipient) = self.account else {
            return;
        };
        self.open_prompt(Panel::Participant, ContractCall::GiveOutMoney { recipient });
    }

    pub fn prepare_init_owner(&mut self) {
        if self.view_state() != ViewState::Uninitialized {
            return;
        }
        let Some(owner) = self.account else {
            return;
        };
        self.open_prompt(Panel::Landing, ContractCall::InitOwner { owner });
    }

    pub fn prepare_reset(&mut self) {
        let panel = match self.view_state() {
            ViewState::OwnerPanel => Panel::Owner,
            ViewState::Exhausted => Panel::Landing,
            _ => return,
        };
        self.open_prompt(panel, ContractCall::Reset);
    }

    /// Reserves a handle for the prompted transaction and hands signing and
    /// sending to a background task. The result arrives as
    /// [`WorkerEvent::Submitted`], followed by [`WorkerEvent::TxOutcome`] once
    /// the receipt is final.
    pub fn approve(&mut self) -> Option<TxHandle> {
        let prompt = self.prompt.take()?;
        let label = kind_label(prompt.call.kind());
        let Some(chain) = self.chain.clone() else {
            self.push_errors(vec![format!("{label} failed: {}", SubmitError::NoWallet)]);
            return None;
        };
        let handle = match self.tracker.begin(prompt.panel, prompt.call.kind()) {
            Ok(handle) => handle,
            Err(err) => {
                self.push_errors(vec![format!("{label} failed: {err}")]);
                return None;
            }
        };
        self.set_status(format!("{label}: waiting for the node..."));
        tokio::spawn(submission_task(
            chain,
            prompt.call,
            handle,
            self.settings.confirmations,
            self.settings.poll_interval,
            self.events.clone(),
        ));
        Some(handle)
    }

    pub fn decline(&mut self) {
        if self.prompt.take().is_some() {
            self.set_status("Transaction cancelled");
        }
    }

    pub fn tx_status(&self, handle: TxHandle) -> Option<TxStatus> {
        self.tracker.status(handle)
    }

    pub fn dismiss_grab(&mut self) {
        self.grab_result = None;
    }

    pub fn dismiss_errors(&mut self) {
        self.errors.clear();
    }

    pub fn owner_form_mut(&mut self) -> &mut OwnerForm {
        &mut self.owner_form
    }

    /// Applies one interpreted key press. Never waits on the network.
    pub fn apply(&mut self, event: UserEvent) {
        match event {
            UserEvent::Quit | UserEvent::Redraw => {}
            UserEvent::Connect => self.connect(),
            UserEvent::Disconnect => self.disconnect(),
            UserEvent::SwitchNetwork => self.switch_network(),
            UserEvent::DismissErrors => self.dismiss_errors(),
            UserEvent::DismissGrab => self.dismiss_grab(),
            UserEvent::CreatePacket => self.prepare_create(),
            UserEvent::Grab => self.prepare_grab(),
            UserEvent::InitOwner => self.prepare_init_owner(),
            UserEvent::Reset => self.prepare_reset(),
            UserEvent::Approve => {
                self.approve();
            }
            UserEvent::Decline => self.decline(),
            UserEvent::FormInput(c) => self.owner_form.push_char(c),
            UserEvent::FormBackspace => self.owner_form.backspace(),
            UserEvent::FormNextField => self.owner_form.toggle_focus(),
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        info!(status = %self.status);
    }

    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }
}

pub fn kind_label(kind: TxKind) -> &'static str {
    match kind {
        TxKind::InitOwner => "Become owner",
        TxKind::CreatePacket => "Create red packet",
        TxKind::Grab => "Grab",
        TxKind::Reset => "Reset",
    }
}

async fn chain_read_worker<C: LuckyMoneyChain>(
    chain: C,
    generation: u64,
    poll_interval: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<ReadCommand>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    async fn read_fields<C: LuckyMoneyChain>(
        chain: &C,
        generation: u64,
        fields: &[ChainField],
        events: &mpsc::UnboundedSender<WorkerEvent>,
    ) -> bool {
        let results = join_all(fields.iter().map(|field| chain.read(*field))).await;
        for (field, result) in fields.iter().zip(results) {
            match result {
                Ok(Some(reading)) => {
                    if events
                        .send(WorkerEvent::Chain {
                            generation,
                            reading,
                        })
                        .is_err()
                    {
                        return false;
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(?err, ?field, "chain read failed"),
            }
        }
        true
    }

    let mut ticker = time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        let keep_going = tokio::select! {
            _ = ticker.tick() => {
                read_fields(&chain, generation, &ChainField::ALL, &events).await
            }
            cmd = cmd_rx.recv() => {
                let Some(ReadCommand::Refresh(fields)) = cmd else {
                    break;
                };
                read_fields(&chain, generation, &fields, &events).await
            }
        };
        if !keep_going {
            break;
        }
    }
    debug!(generation, "chain read worker stopped");
}

async fn history_worker<I: DistributionIndex>(
    index: I,
    generation: u64,
    poll_interval: Duration,
    depth: usize,
    mut cmd_rx: mpsc::UnboundedReceiver<HistoryCommand>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    async fn fetch_history<I: DistributionIndex>(
        index: &I,
        generation: u64,
        depth: usize,
        events: &mpsc::UnboundedSender<WorkerEvent>,
    ) -> bool {
        match index.recent_distributions(depth).await {
            Ok(records) => events
                .send(WorkerEvent::History {
                    generation,
                    records,
                })
                .is_ok(),
            Err(err) => {
                warn!(?err, "history fetch failed");
                true
            }
        }
    }

    let mut ticker = time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        let keep_going = tokio::select! {
            _ = ticker.tick() => fetch_history(&index, generation, depth, &events).await,
            cmd = cmd_rx.recv() => {
                let Some(HistoryCommand::Refresh) = cmd else {
                    break;
                };
                fetch_history(&index, generation, depth, &events).await
            }
        };
        if !keep_going {
            break;
        }
    }
    debug!(generation, "history worker stopped");
}

/// Sends one transaction, reports the node's answer, then watches the receipt.
async fn submission_task<C: LuckyMoneyChain>(
    chain: C,
    call: ContractCall,
    handle: TxHandle,
    confirmations: u64,
    poll_interval: Duration,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    let result = chain.send(&call).await;
    let accepted = result.as_ref().ok().copied();
    if events.send(WorkerEvent::Submitted { handle, result }).is_err() {
        return;
    }
    if let Some(hash) = accepted {
        confirmation_watcher(chain, handle, hash, confirmations, poll_interval, events).await;
    }
}

/// Polls the receipt until the transaction is final. There is no local timeout.
async fn confirmation_watcher<C: LuckyMoneyChain>(
    chain: C,
    handle: TxHandle,
    hash: TxHash,
    confirmations: u64,
    poll_interval: Duration,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    let mut ticker = time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    while !events.is_closed() {
        ticker.tick().await;
        match chain.transaction_outcome(hash, confirmations).await {
            Ok(TxOutcome::Pending) => {}
            Ok(outcome) => {
                let _ = events.send(WorkerEvent::TxOutcome { handle, outcome });
                break;
            }
            Err(err) => warn!(?err, %hash, "receipt poll failed"),
        }
    }
}

pub async fn run_app(config: AppConfig, signer: Option<PrivateKeySigner>) -> Result<()> {
    let targets = config.targets()?;
    let index = IndexerClient::new(config.subgraph_url.as_str())?;
    let settings = ControllerSettings::from(&config);
    let (controller, events) =
        AppController::new(RpcConnector::new(signer), index, targets, settings)?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(controller, events, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop<K: Connector, I: DistributionIndex>(
    mut controller: AppController<K, I>,
    mut events: mpsc::UnboundedReceiver<WorkerEvent>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    controller.start();
    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;
    controller.mark_mounted();

    loop {
        let snapshot = controller.snapshot();
        ui::draw(ui_state, &snapshot).wrap_err("draw failed")?;
        tokio::select! {
            maybe_event = events.recv() => {
                let Some(event) = maybe_event else {
                    warn!("worker channel closed");
                    break;
                };
                controller.handle_event(event);
            }
            _ = tokio::signal::ctrl_c() => break,
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, &snapshot, event) else {
                    continue;
                };
                if ev == UserEvent::Quit {
                    break;
                }
                controller.apply(ev);
            }
        }
    }
    info!("UI loop finished");
    Ok(())
}
