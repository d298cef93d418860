// Connection manager - Owns the live channel, reconnects and dispatches frames
use crate::application::dispatcher::{Dispatch, MessageDispatcher};
use crate::application::scheduler::ScheduledTask;
use crate::domain::messages::ClientInit;
use crate::error::TransportError;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// One established full-duplex channel. Dropping it closes the channel.
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<String>,
    /// Ends when the remote side closes.
    pub inbound: BoxStream<'static, Result<String, TransportError>>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Connection, TransportError>;
}

/// Told when the link to the server is (re)established or lost.
pub trait LivenessObserver: Send + Sync {
    fn online(&self);
    fn offline(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub reconnect_delay: Duration,
    pub liveness_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(10),
            liveness_timeout: Duration::from_secs(120),
        }
    }
}

enum Event {
    Connect,
    Opened {
        generation: u64,
        result: Result<Connection, TransportError>,
    },
    Frame {
        generation: u64,
        text: String,
    },
    Closed {
        generation: u64,
    },
    ReconnectDue {
        token: u64,
    },
    LivenessExpired {
        token: u64,
    },
    Send(String),
    Shutdown,
}

/// Cheap handle for talking to a running [`ConnectionManager`].
#[derive(Clone)]
pub struct ConnectionHandle {
    events: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    /// Fire-and-forget. Dropped when the channel is not open.
    pub fn send<T: Serialize>(&self, message: &T) {
        match serde_json::to_string(message) {
            Ok(text) => {
                let _ = self.events.send(Event::Send(text));
            }
            Err(e) => tracing::warn!("Dropping unserializable outbound message: {}", e),
        }
    }

    /// Connect now, cancelling any pending reconnect.
    pub fn connect(&self) {
        let _ = self.events.send(Event::Connect);
    }

    pub fn shutdown(&self) {
        let _ = self.events.send(Event::Shutdown);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

/// Event loop owning the single live connection.
///
/// Every input (connection results, frames, closes, timer firings, outbound
/// sends) is queued as an event and handled one at a time, in arrival order.
/// A new connection bumps the generation; events from older generations are
/// discarded.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    dispatcher: MessageDispatcher,
    observers: Vec<Arc<dyn LivenessObserver>>,
    settings: ConnectionSettings,
    generation: u64,
    announce_reconnect: bool,
    outbound: Option<mpsc::UnboundedSender<String>>,
    connecting: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    reconnect_timer: Option<(u64, ScheduledTask)>,
    liveness_timer: Option<(u64, ScheduledTask)>,
    next_token: u64,
    online: Option<bool>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        dispatcher: MessageDispatcher,
        settings: ConnectionSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        Self {
            connector,
            dispatcher,
            observers: Vec::new(),
            settings,
            generation: 0,
            announce_reconnect: false,
            outbound: None,
            connecting: None,
            reader: None,
            reconnect_timer: None,
            liveness_timer: None,
            next_token: 0,
            online: None,
            events_tx,
            events_rx,
            state_tx,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LivenessObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            events: self.events_tx.clone(),
            state: self.state_tx.subscribe(),
        }
    }

    /// Connect and process events until [`ConnectionHandle::shutdown`].
    pub async fn run(mut self) {
        self.connect();

        while let Some(event) = self.events_rx.recv().await {
            match event {
                Event::Connect => self.connect(),
                Event::Opened { generation, result } => self.on_opened(generation, result),
                Event::Frame { generation, text } => self.on_frame(generation, &text),
                Event::Closed { generation } => self.on_closed(generation),
                Event::ReconnectDue { token } => {
                    if self.reconnect_timer.as_ref().is_some_and(|(t, _)| *t == token) {
                        self.reconnect_timer = None;
                        self.connect();
                    }
                }
                Event::LivenessExpired { token } => {
                    if self.liveness_timer.as_ref().is_some_and(|(t, _)| *t == token) {
                        self.liveness_timer = None;
                        tracing::warn!("No message within {:?}", self.settings.liveness_timeout);
                        self.set_online(false);
                    }
                }
                Event::Send(text) => self.send_raw(text),
                Event::Shutdown => break,
            }
        }

        self.cancel_timers();
        self.discard_connection();
        self.set_state(ConnectionState::Closed);
        tracing::info!("Connection manager stopped");
    }

    fn connect(&mut self) {
        if let Some((_, pending)) = self.reconnect_timer.take() {
            pending.cancel();
        }
        self.discard_connection();

        // Only the very first attempt announces itself as a fresh client.
        self.announce_reconnect = self.generation > 0;
        self.generation += 1;
        self.set_state(ConnectionState::Connecting);

        let generation = self.generation;
        let connector = self.connector.clone();
        let events = self.events_tx.clone();
        self.connecting = Some(tokio::spawn(async move {
            let result = connector.connect().await;
            let _ = events.send(Event::Opened { generation, result });
        }));
    }

    fn on_opened(&mut self, generation: u64, result: Result<Connection, TransportError>) {
        if generation != self.generation {
            tracing::debug!("Discarding connection from stale attempt {}", generation);
            return;
        }
        self.connecting = None;

        let connection = match result {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!("Connection attempt failed: {}", e);
                self.on_closed(generation);
                return;
            }
        };

        tracing::info!("Live channel open (reconnect: {})", self.announce_reconnect);
        self.outbound = Some(connection.outbound);
        self.set_state(ConnectionState::Open);
        self.send_message(&ClientInit {
            reconnect: self.announce_reconnect,
        });

        let events = self.events_tx.clone();
        let mut inbound = connection.inbound;
        self.reader = Some(tokio::spawn(async move {
            while let Some(frame) = inbound.next().await {
                match frame {
                    Ok(text) => {
                        if events.send(Event::Frame { generation, text }).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Live channel failed: {}", e);
                        break;
                    }
                }
            }
            let _ = events.send(Event::Closed { generation });
        }));
    }

    fn on_frame(&mut self, generation: u64, text: &str) {
        if generation != self.generation {
            return;
        }
        self.arm_liveness();

        match self.dispatcher.dispatch(text) {
            Ok(Dispatch::Handled(message_type)) => {
                tracing::debug!("Dispatched {} message", message_type);
            }
            Ok(Dispatch::Ignored(message_type)) => {
                tracing::debug!("Ignoring {} message", message_type);
            }
            Err(e) => tracing::warn!("Dropping malformed frame: {}", e),
        }
    }

    fn on_closed(&mut self, generation: u64) {
        if generation != self.generation {
            return;
        }
        self.discard_connection();
        if let Some((_, watchdog)) = self.liveness_timer.take() {
            watchdog.cancel();
        }
        self.set_state(ConnectionState::Closed);
        self.set_online(false);

        let token = self.token();
        let events = self.events_tx.clone();
        let delay = self.settings.reconnect_delay;
        let timer = ScheduledTask::after(delay, async move {
            let _ = events.send(Event::ReconnectDue { token });
        });
        if let Some((_, previous)) = self.reconnect_timer.replace((token, timer)) {
            previous.cancel();
        }
        tracing::info!("Live channel closed, reconnecting in {:?}", delay);
    }

    fn arm_liveness(&mut self) {
        self.set_online(true);

        let token = self.token();
        let events = self.events_tx.clone();
        let timer = ScheduledTask::after(self.settings.liveness_timeout, async move {
            let _ = events.send(Event::LivenessExpired { token });
        });
        if let Some((_, previous)) = self.liveness_timer.replace((token, timer)) {
            previous.cancel();
        }
    }

    fn send_message<T: Serialize>(&self, message: &T) {
        match serde_json::to_string(message) {
            Ok(text) => self.send_raw(text),
            Err(e) => tracing::warn!("Dropping unserializable outbound message: {}", e),
        }
    }

    fn send_raw(&self, text: String) {
        let open = *self.state_tx.borrow() == ConnectionState::Open;
        match self.outbound.as_ref().filter(|_| open) {
            Some(outbound) => {
                if outbound.send(text).is_err() {
                    tracing::debug!("Dropping outbound message: {}", TransportError::NotOpen);
                }
            }
            None => tracing::debug!("Dropping outbound message: {}", TransportError::NotOpen),
        }
    }

    fn set_online(&mut self, online: bool) {
        if self.online == Some(online) {
            return;
        }
        self.online = Some(online);
        for observer in &self.observers {
            if online {
                observer.online();
            } else {
                observer.offline();
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn discard_connection(&mut self) {
        if let Some(attempt) = self.connecting.take() {
            attempt.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.outbound = None;
    }

    fn cancel_timers(&mut self) {
        if let Some((_, timer)) = self.reconnect_timer.take() {
            timer.cancel();
        }
        if let Some((_, timer)) = self.liveness_timer.take() {
            timer.cancel();
        }
    }

    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}
