use crate::broker::{is_process_error, BrokerError, Delivery, FileBroker};
use crate::commands::Dispatcher;
use crate::config::TransportSettings;
use crate::prompt::PromptStore;
use crate::shared::LogQueue;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("orchestrator is not wired: {0}")]
    Configuration(String),
    #[error("orchestrator is not connected")]
    NotConnected,
    #[error(transparent)]
    Transport(#[from] BrokerError),
    #[error("external agent process reported a failure: {0}")]
    ProcessFailure(String),
}

/// Operating mode for one exchange. `Chatting` never reaches the
/// dispatcher; `Coding` and `Simulation` always do, differing only in how
/// the raw text gets there (through the transport vs. directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Chatting,
    Coding,
    Simulation,
}

impl Mode {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "chatting" => Ok(Mode::Chatting),
            "coding" => Ok(Mode::Coding),
            "simulation" => Ok(Mode::Simulation),
            other => Err(format!(
                "unknown mode `{other}` (expected chatting|coding|simulation)"
            )),
        }
    }

    pub fn is_structured(self) -> bool {
        self != Mode::Chatting
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Capability interface over the concrete wire to the external process.
/// Variants are selected at configuration time, not via inheritance.
pub trait Transport: Send {
    fn connect(&mut self) -> Result<(), BrokerError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    fn send_text(&self, text: &str) -> Result<Delivery, BrokerError>;
}

/// The file-drop transport: a `FileBroker` brought up on connect and torn
/// down on disconnect.
#[derive(Debug)]
pub struct FileTransport {
    settings: TransportSettings,
    log: Arc<LogQueue>,
    broker: Option<FileBroker>,
}

impl FileTransport {
    pub fn new(settings: TransportSettings, log: Arc<LogQueue>) -> Self {
        Self {
            settings,
            log,
            broker: None,
        }
    }
}

impl Transport for FileTransport {
    fn connect(&mut self) -> Result<(), BrokerError> {
        if self.broker.is_none() {
            self.broker = Some(FileBroker::start(&self.settings, Arc::clone(&self.log))?);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(mut broker) = self.broker.take() {
            broker.shutdown();
        }
    }

    fn is_connected(&self) -> bool {
        self.broker.as_ref().is_some_and(FileBroker::is_running)
    }

    fn send_text(&self, text: &str) -> Result<Delivery, BrokerError> {
        match &self.broker {
            Some(broker) => broker.send(text),
            None => Err(BrokerError::Disconnected { id: 0 }),
        }
    }
}

/// Wires the transport into the dispatcher: composes the outbound prompt,
/// ships it, classifies the reply, and runs command extraction when the
/// mode calls for it.
pub struct Orchestrator {
    transport: Option<Box<dyn Transport>>,
    dispatcher: Option<Dispatcher>,
    prompts: Arc<PromptStore>,
    state: ConnectionState,
    status_subscribers: Vec<Sender<bool>>,
}

impl Orchestrator {
    pub fn new(prompts: Arc<PromptStore>) -> Self {
        Self {
            transport: None,
            dispatcher: None,
            prompts,
            state: ConnectionState::Disconnected,
            status_subscribers: Vec::new(),
        }
    }

    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connection status notifications, one boolean per transition.
    pub fn subscribe_status(&mut self) -> Receiver<bool> {
        let (tx, rx) = mpsc::channel();
        self.status_subscribers.push(tx);
        rx
    }

    /// Fails with a configuration error (and stays Disconnected) unless
    /// both a transport and a dispatcher are wired.
    pub fn connect(&mut self) -> Result<(), OrchestratorError> {
        if self.dispatcher.is_none() {
            return Err(OrchestratorError::Configuration(
                "no dispatcher wired".to_string(),
            ));
        }
        let Some(transport) = self.transport.as_mut() else {
            return Err(OrchestratorError::Configuration(
                "no transport wired".to_string(),
            ));
        };

        self.state = ConnectionState::Connecting;
        match transport.connect() {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                self.notify_status(true);
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Disconnected;
                self.notify_status(false);
                Err(err.into())
            }
        }
    }

    /// Idempotent teardown back to Disconnected.
    pub fn disconnect(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.disconnect();
        }
        if self.state != ConnectionState::Disconnected {
            self.state = ConnectionState::Disconnected;
            self.notify_status(false);
        }
    }

    /// Full round trip: system prompt (unless Chatting) + user text out,
    /// dispatched reply back.
    pub fn send_user_message(
        &self,
        text: &str,
        mode: Mode,
    ) -> Result<String, OrchestratorError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| OrchestratorError::Configuration("no transport wired".to_string()))?;
        let dispatcher = self
            .dispatcher
            .as_ref()
            .ok_or_else(|| OrchestratorError::Configuration("no dispatcher wired".to_string()))?;
        if self.state != ConnectionState::Connected || !transport.is_connected() {
            return Err(OrchestratorError::NotConnected);
        }

        let mut outbound = self.prompts.compose(mode);
        outbound.push_str(text);

        let reply = transport.send_text(&outbound)?.wait()?;
        if is_process_error(&reply) {
            return Err(OrchestratorError::ProcessFailure(reply));
        }
        Ok(dispatcher.parse_and_execute(&reply, mode.is_structured()))
    }

    /// Feeds `text` straight to the dispatcher, bypassing the transport.
    /// Lets the command layer be exercised without the external process.
    pub fn simulate(&self, text: &str, mode: Mode) -> Result<String, OrchestratorError> {
        let dispatcher = self
            .dispatcher
            .as_ref()
            .ok_or_else(|| OrchestratorError::Configuration("no dispatcher wired".to_string()))?;
        Ok(dispatcher.parse_and_execute(text, mode.is_structured()))
    }

    fn notify_status(&mut self, connected: bool) {
        self.status_subscribers
            .retain(|tx| tx.send(connected).is_ok());
    }
}
