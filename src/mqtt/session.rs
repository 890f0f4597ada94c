use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::eq3::codec::{self, Command};
use crate::eq3::{Event, SettableMode};
use crate::error::Result;

use super::topics::Topics;

/// The half of an MQTT client the session needs. Both calls only enqueue.
pub trait Transport {
    fn publish(&self, topic: &str, payload: &str) -> Result<()>;
    fn subscribe(&self, topic: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Subscribing,
    Ready,
    /// The last connection attempt failed; the transport may still reconnect.
    Faulted,
}

/// Fire-and-forget command surface. Cheap to clone when the transport is.
#[derive(Debug, Clone)]
pub struct Commands<T> {
    transport: T,
    topics: Topics,
}

impl<T: Transport> Commands<T> {
    pub fn new(transport: T, topics: Topics) -> Self {
        Self { transport, topics }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    fn publish(&self, topic: &str, payload: &str) {
        if let Err(e) = self.transport.publish(topic, payload) {
            error!("Failed to publish {} to {}: {}", payload, topic, e);
        }
    }

    fn send(&self, bleaddr: &str, command: Command) {
        self.publish(self.topics.command_topic(), &command.encode(bleaddr));
    }

    pub fn scan_for_devices(&self) {
        debug!("Sending scan command");
        self.publish(self.topics.scan_topic(), "scan");
    }

    pub fn set_power(&self, bleaddr: &str, on: bool) {
        let command = Command::Power(on);
        info!("Set power to {} ({})", command.action(), bleaddr);
        self.send(bleaddr, command);
    }

    pub fn set_boost_mode(&self, bleaddr: &str, on: bool) {
        let command = Command::Boost(on);
        info!("Set boost mode to {} ({})", command.action(), bleaddr);
        self.send(bleaddr, command);
    }

    pub fn set_mode(&self, bleaddr: &str, mode: SettableMode) {
        info!("Set mode to {} ({})", mode, bleaddr);
        self.send(bleaddr, Command::Mode(mode));
    }

    pub fn set_offset_temp(&self, bleaddr: &str, offset: f64) {
        info!("Set offset temperature to {} ({})", offset, bleaddr);
        self.send(bleaddr, Command::Offset(offset));
    }

    pub fn set_temp(&self, bleaddr: &str, temp: f64) {
        info!("Set temperature to {} ({})", temp, bleaddr);
        self.send(bleaddr, Command::SetTemp(temp));
    }

    pub fn set_display_lock(&self, bleaddr: &str, locked: bool) {
        let command = Command::DisplayLock(locked);
        info!("Set display lock to {} ({})", command.action(), bleaddr);
        self.send(bleaddr, command);
    }
}

/// Shared registry of event listeners. Clones register into the same list,
/// so a host can subscribe while the driver owns the session.
#[derive(Debug, Clone, Default)]
pub struct Listeners {
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<Event>>>>,
}

impl Listeners {
    /// Register a listener. Every later event is delivered to it in order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn emit(&self, event: Event) {
        debug!("Emitting {}", event.name());
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<Event>>> {
        // A listener list is still usable after a panic elsewhere.
        self.senders.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Connection lifecycle and message dispatch for one bridge.
///
/// The session performs no I/O of its own: the driver reports transport
/// events through the `on_*` methods and the session answers by publishing
/// through its [`Transport`] and emitting [`Event`]s to its listeners.
pub struct Session<T> {
    commands: Commands<T>,
    state: SessionState,
    pending_subscriptions: usize,
    listeners: Listeners,
    /// Publishes the transport refused for lack of room, oldest first.
    outbox: VecDeque<(String, String)>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, topics: Topics) -> Self {
        info!("In topic: {}", topics.in_topic());
        info!("Out topic: {}", topics.out_topic());

        Self {
            commands: Commands::new(transport, topics),
            state: SessionState::Disconnected,
            pending_subscriptions: 0,
            listeners: Listeners::default(),
            outbox: VecDeque::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn commands(&self) -> &Commands<T> {
        &self.commands
    }

    pub fn topics(&self) -> &Topics {
        self.commands.topics()
    }

    pub fn listeners(&self) -> Listeners {
        self.listeners.clone()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        self.listeners.subscribe()
    }

    /// Number of publishes still waiting for room in the transport.
    pub fn queued(&self) -> usize {
        self.outbox.len()
    }

    /// The driver is about to (re)open the transport connection.
    pub fn on_connecting(&mut self) {
        if self.state != SessionState::Connecting {
            debug!("Connecting to MQTT broker");
            self.state = SessionState::Connecting;
        }
    }

    pub fn on_connected(&mut self) {
        info!("Connected to MQTT broker");

        let topics = [self.topics().subscribe_topic().to_string()];
        self.state = SessionState::Subscribing;
        self.pending_subscriptions = 0;

        for topic in &topics {
            match self.commands.transport.subscribe(topic) {
                Ok(()) => self.pending_subscriptions += 1,
                Err(e) => error!("Failed to subscribe to {}: {}", topic, e),
            }
        }

        if self.pending_subscriptions == 0 {
            self.on_ready();
        }
    }

    /// Account for one subscription answer; rejections do not block startup.
    pub fn on_subscribe_ack(&mut self, granted: bool) {
        if self.state != SessionState::Subscribing {
            debug!("Ignoring subscription ack in state {:?}", self.state);
            return;
        }

        if granted {
            debug!("Subscription granted");
        } else {
            error!("Subscription rejected by broker");
        }

        self.pending_subscriptions = self.pending_subscriptions.saturating_sub(1);
        if self.pending_subscriptions == 0 {
            self.on_ready();
        }
    }

    fn on_ready(&mut self) {
        self.state = SessionState::Ready;
        self.commands.scan_for_devices();
    }

    /// The connection failed or was dropped. Reconnecting is up to the transport;
    /// a later [`on_connected`](Self::on_connected) resubscribes and rescans.
    pub fn on_connection_error(&mut self, reason: &str) {
        error!("MQTT connection error: {}", reason);
        self.state = SessionState::Faulted;
        self.pending_subscriptions = 0;
    }

    /// Dispatch one inbound message. Decode failures drop the message.
    pub fn on_message(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        debug!("Received MQTT message on {}", topic);

        if topic == self.topics().devlist_topic() {
            let list = codec::decode_device_list(topic, payload)?;
            debug!("Received device list: {:?}", list.devices);

            let addrs: Vec<String> = list.devices.iter().map(|d| d.bleaddr.clone()).collect();
            self.listeners.emit(Event::DevicesDiscovered(list.devices));
            for addr in &addrs {
                self.queue_display_lock(addr);
            }
            self.flush_outbox();
        } else if topic == self.topics().status_topic() {
            let status = codec::decode_status(topic, payload)?;
            debug!("Received status: {:?}", status);

            for event in codec::status_events(status) {
                self.listeners.emit(event);
            }
        }

        Ok(())
    }

    fn queue_display_lock(&mut self, bleaddr: &str) {
        let command = Command::DisplayLock(true);
        info!("Set display lock to {} ({})", command.action(), bleaddr);
        let entry = (
            self.topics().command_topic().to_string(),
            command.encode(bleaddr),
        );
        self.outbox.push_back(entry);
    }

    /// Hand queued publishes to the transport until it refuses one.
    pub fn flush_outbox(&mut self) {
        while let Some((topic, payload)) = self.outbox.front() {
            if let Err(e) = self.commands.transport.publish(topic, payload) {
                warn!(
                    "Deferring {} queued publish(es) to {}: {}",
                    self.outbox.len(),
                    topic,
                    e
                );
                return;
            }
            self.outbox.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::error::Error;

    #[derive(Clone, Default)]
    struct Recorder {
        published: Arc<Mutex<Vec<(String, String)>>>,
        subscribed: Arc<Mutex<Vec<String>>>,
        refuse_subscribe: bool,
        /// Publishes accepted before the transport reports it is full.
        room: Option<Rc<Cell<usize>>>,
    }

    impl Transport for Recorder {
        fn publish(&self, topic: &str, payload: &str) -> Result<()> {
            if let Some(room) = &self.room {
                if room.get() == 0 {
                    return Err(Error::Transport("request queue full".into()));
                }
                room.set(room.get() - 1);
            }
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }

        fn subscribe(&self, topic: &str) -> Result<()> {
            if self.refuse_subscribe {
                return Err(Error::Transport("queue full".into()));
            }
            self.subscribed.lock().unwrap().push(topic.to_string());
            Ok(())
        }
    }

    fn session() -> (Session<Recorder>, Recorder) {
        let recorder = Recorder::default();
        (Session::new(recorder.clone(), Topics::new("eq3")), recorder)
    }

    #[test]
    fn scans_only_after_subscription_ack() {
        let (mut session, recorder) = session();
        assert_eq!(session.state(), SessionState::Disconnected);

        session.on_connecting();
        assert_eq!(session.state(), SessionState::Connecting);

        session.on_connected();
        assert_eq!(session.state(), SessionState::Subscribing);
        assert_eq!(*recorder.subscribed.lock().unwrap(), vec!["/eq3radout/#"]);
        assert!(recorder.published.lock().unwrap().is_empty());

        session.on_subscribe_ack(true);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(
            *recorder.published.lock().unwrap(),
            vec![("/eq3radin/scan".to_string(), "scan".to_string())]
        );
    }

    #[test]
    fn rejected_subscription_still_reaches_ready() {
        let (mut session, recorder) = session();
        session.on_connected();
        session.on_subscribe_ack(false);

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(recorder.published.lock().unwrap().len(), 1);
    }

    #[test]
    fn refused_subscribe_request_counts_as_answered() {
        let recorder = Recorder {
            refuse_subscribe: true,
            ..Default::default()
        };
        let mut session = Session::new(recorder.clone(), Topics::new("eq3"));
        session.on_connected();

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(recorder.published.lock().unwrap()[0].1, "scan");
    }

    #[test]
    fn stray_ack_is_ignored() {
        let (mut session, recorder) = session();
        session.on_connecting();
        session.on_subscribe_ack(true);

        assert_eq!(session.state(), SessionState::Connecting);
        assert!(recorder.published.lock().unwrap().is_empty());
    }

    #[test]
    fn connection_error_faults_until_next_connect() {
        let (mut session, recorder) = session();
        session.on_connected();
        session.on_connection_error("connection refused");
        assert_eq!(session.state(), SessionState::Faulted);

        // The ack for the lost connection's subscribe must not trigger a scan.
        session.on_subscribe_ack(true);
        assert!(recorder.published.lock().unwrap().is_empty());

        session.on_connecting();
        session.on_connected();
        session.on_subscribe_ack(true);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn dropped_listeners_are_pruned() {
        let (session, _) = session();
        let _kept = session.subscribe();
        drop(session.subscribe());

        session.listeners.emit(Event::Boost(true));
        assert_eq!(session.listeners().len(), 1);
    }

    #[test]
    fn listener_handle_registers_on_the_session() {
        let (mut session, _) = session();
        let handle = session.listeners();
        let mut rx = handle.subscribe();

        session
            .on_message("/eq3radout/devlist", br#"{"devices":[]}"#)
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), Event::DevicesDiscovered(vec![]));
    }

    #[test]
    fn display_locks_wait_for_room_in_the_transport() {
        let room = Rc::new(Cell::new(2));
        let recorder = Recorder {
            room: Some(room.clone()),
            ..Default::default()
        };
        let mut session = Session::new(recorder.clone(), Topics::new("eq3"));

        let payload = br#"{"devices":[
            {"bleaddr":"a","rssi":-1},{"bleaddr":"b","rssi":-1},
            {"bleaddr":"c","rssi":-1},{"bleaddr":"d","rssi":-1}
        ]}"#;
        session.on_message("/eq3radout/devlist", payload).unwrap();
        assert_eq!(recorder.published.lock().unwrap().len(), 2);
        assert_eq!(session.queued(), 2);

        room.set(10);
        session.flush_outbox();
        assert_eq!(session.queued(), 0);

        let payloads: Vec<String> = recorder
            .published
            .lock()
            .unwrap()
            .iter()
            .map(|(_, p)| p.clone())
            .collect();
        assert_eq!(payloads, vec!["a unlock", "b unlock", "c unlock", "d unlock"]);
    }
}
