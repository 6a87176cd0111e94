//! MQTT broker adapter.
//!
//! Implements [`BrokerPort`] for the [`SessionManager`](crate::session::SessionManager).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: raw ESP-MQTT client. Auto-reconnect is
//!   disabled so each `connect()` is exactly one attempt; the CONNACK return
//!   code is captured in the event handler and mapped with
//!   [`ConnectError::from_connack`].
//! - **all other targets**: deterministic simulation with scripted connect
//!   results, recorded publishes and injectable inbound messages.
//!
//! Inbound messages are only accepted when they arrive in one piece and fit
//! [`InboundMessage`]; everything else is dropped with a warning.

use core::sync::atomic::Ordering;
#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::adapters::wifi::LinkFlag;
use crate::app::ports::{BrokerError, BrokerPort, ConnectError, InboundMessage};

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, AtomicU8};
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use std::ffi::CString;

/// Build an [`InboundMessage`], or `None` if topic or payload do not fit.
pub fn inbound_message(topic: &[u8], payload: &[u8]) -> Option<InboundMessage> {
    let topic = core::str::from_utf8(topic).ok()?;
    let mut msg = InboundMessage {
        topic: heapless::String::new(),
        payload: heapless::Vec::new(),
    };
    msg.topic.push_str(topic).ok()?;
    msg.payload.extend_from_slice(payload).ok()?;
    Some(msg)
}

// ───────────────────────────────────────────────────────────────
// Shared state written by the ESP-MQTT event task
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
const ATTEMPT_PENDING: u8 = 0xFF;
#[cfg(target_os = "espidf")]
const ATTEMPT_TRANSPORT: u8 = 0xFE;

#[cfg(target_os = "espidf")]
struct Shared {
    connected: AtomicBool,
    /// CONNACK code of the running attempt, or one of the `ATTEMPT_*` markers.
    attempt: AtomicU8,
    inbound: heapless::mpmc::Q4<InboundMessage>,
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn on_mqtt_event(
    arg: *mut core::ffi::c_void,
    _base: esp_event_base_t,
    event_id: i32,
    event_data: *mut core::ffi::c_void,
) {
    // SAFETY: `arg` is the boxed `Shared` owned by the adapter, which
    // destroys the client before dropping it.
    let shared = unsafe { &*(arg as *const Shared) };
    let event = event_data as esp_mqtt_event_handle_t;
    if event.is_null() {
        return;
    }
    // SAFETY: ESP-MQTT passes a valid event for the duration of the call.
    let event = unsafe { &*event };

    match event_id as esp_mqtt_event_id_t {
        esp_mqtt_event_id_t_MQTT_EVENT_CONNECTED => {
            shared.connected.store(true, Ordering::Release);
            shared.attempt.store(0, Ordering::Release);
        }
        esp_mqtt_event_id_t_MQTT_EVENT_DISCONNECTED => {
            shared.connected.store(false, Ordering::Release);
            // A disconnect before CONNACK is a transport failure.
            let _ = shared.attempt.compare_exchange(
                ATTEMPT_PENDING,
                ATTEMPT_TRANSPORT,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
        esp_mqtt_event_id_t_MQTT_EVENT_ERROR => {
            let code = if event.error_handle.is_null() {
                ATTEMPT_TRANSPORT
            } else {
                // SAFETY: non-null error handle from the same event.
                let err = unsafe { &*event.error_handle };
                if err.error_type == esp_mqtt_error_type_t_MQTT_ERROR_TYPE_CONNECTION_REFUSED {
                    err.connect_return_code as u8
                } else {
                    ATTEMPT_TRANSPORT
                }
            };
            let _ = shared.attempt.compare_exchange(
                ATTEMPT_PENDING,
                code,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
        esp_mqtt_event_id_t_MQTT_EVENT_DATA => {
            if event.current_data_offset != 0 || event.data_len != event.total_data_len {
                warn!("MQTT: dropping fragmented message ({} bytes)", event.total_data_len);
                return;
            }
            if event.topic.is_null() || event.data.is_null() {
                return;
            }
            // SAFETY: pointers and lengths come from the same event.
            let (topic, data) = unsafe {
                (
                    core::slice::from_raw_parts(event.topic as *const u8, event.topic_len as usize),
                    core::slice::from_raw_parts(event.data as *const u8, event.data_len as usize),
                )
            };
            match inbound_message(topic, data) {
                Some(msg) => {
                    if shared.inbound.enqueue(msg).is_err() {
                        warn!("MQTT: inbound queue full, message dropped");
                    }
                }
                None => warn!("MQTT: dropping oversized message ({} bytes)", data.len()),
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct MqttAdapter {
    link: LinkFlag,
    #[cfg(target_os = "espidf")]
    client: esp_mqtt_client_handle_t,
    #[cfg(target_os = "espidf")]
    started: bool,
    #[cfg(target_os = "espidf")]
    connect_timeout_ms: u32,
    #[cfg(target_os = "espidf")]
    shared: Box<Shared>,
    // Strings referenced by the client config.
    #[cfg(target_os = "espidf")]
    _strings: [CString; 4],

    #[cfg(not(target_os = "espidf"))]
    connected: bool,
    #[cfg(not(target_os = "espidf"))]
    script: VecDeque<Result<(), ConnectError>>,
    #[cfg(not(target_os = "espidf"))]
    connects: u32,
    #[cfg(not(target_os = "espidf"))]
    subscriptions: Vec<String>,
    #[cfg(not(target_os = "espidf"))]
    published: Vec<(String, Vec<u8>)>,
    #[cfg(not(target_os = "espidf"))]
    inbound: VecDeque<InboundMessage>,
}

// SAFETY: the ESP-MQTT handle is thread-safe; `Shared` only holds atomics
// and a lock-free queue.
#[cfg(target_os = "espidf")]
unsafe impl Send for MqttAdapter {}

impl MqttAdapter {
    /// Create the client without connecting. Credentials may be empty.
    #[cfg(target_os = "espidf")]
    pub fn new(
        network: &crate::config::NetworkConfig,
        client_id: &str,
        connect_timeout_ms: u32,
        link: LinkFlag,
    ) -> Result<Self, crate::error::CommsError> {
        use crate::error::CommsError;

        let cstr = |s: &str| CString::new(s).map_err(|_| CommsError::MqttClientInitFailed);
        let strings = [
            cstr(&network.broker_url)?,
            cstr(client_id)?,
            cstr(&network.broker_username)?,
            cstr(&network.broker_password)?,
        ];

        let mut cfg = esp_mqtt_client_config_t::default();
        cfg.broker.address.uri = strings[0].as_ptr();
        cfg.credentials.client_id = strings[1].as_ptr();
        if !network.broker_username.is_empty() {
            cfg.credentials.username = strings[2].as_ptr();
            cfg.credentials.authentication.password = strings[3].as_ptr();
        }
        cfg.network.disable_auto_reconnect = true;
        cfg.network.timeout_ms = connect_timeout_ms as i32;

        // SAFETY: config and strings outlive the call; the client copies them.
        let client = unsafe { esp_mqtt_client_init(&cfg) };
        if client.is_null() {
            return Err(CommsError::MqttClientInitFailed);
        }

        let shared = Box::new(Shared {
            connected: AtomicBool::new(false),
            attempt: AtomicU8::new(ATTEMPT_PENDING),
            inbound: heapless::mpmc::Q4::new(),
        });
        let arg = &*shared as *const Shared as *mut core::ffi::c_void;
        // SAFETY: `shared` is heap allocated and lives as long as the client.
        let ret = unsafe {
            esp_mqtt_client_register_event(
                client,
                esp_mqtt_event_id_t_MQTT_EVENT_ANY,
                Some(on_mqtt_event),
                arg,
            )
        };
        if ret != ESP_OK {
            unsafe { esp_mqtt_client_destroy(client) };
            return Err(CommsError::MqttClientInitFailed);
        }

        info!("MqttAdapter: client '{client_id}' for {}", network.broker_url.as_str());
        Ok(Self {
            link,
            client,
            started: false,
            connect_timeout_ms,
            shared,
            _strings: strings,
        })
    }

    /// Simulation client. Connect attempts succeed unless scripted otherwise.
    #[cfg(not(target_os = "espidf"))]
    pub fn new(link: LinkFlag) -> Self {
        info!("MqttAdapter: simulation backend");
        Self {
            link,
            connected: false,
            script: VecDeque::new(),
            connects: 0,
            subscriptions: Vec::new(),
            published: Vec::new(),
            inbound: VecDeque::new(),
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectError> {
        self.shared.attempt.store(ATTEMPT_PENDING, Ordering::Release);
        // SAFETY: valid handle created in `new`.
        let ret = if self.started {
            unsafe { esp_mqtt_client_reconnect(self.client) }
        } else {
            unsafe { esp_mqtt_client_start(self.client) }
        };
        if ret != ESP_OK {
            return Err(ConnectError::Transport);
        }
        self.started = true;

        const POLL_MS: u32 = 20;
        let mut waited = 0;
        loop {
            match self.shared.attempt.load(Ordering::Acquire) {
                ATTEMPT_PENDING if waited >= self.connect_timeout_ms => {
                    return Err(ConnectError::Timeout);
                }
                ATTEMPT_PENDING => {
                    std::thread::sleep(std::time::Duration::from_millis(u64::from(POLL_MS)));
                    waited += POLL_MS;
                }
                ATTEMPT_TRANSPORT => return Err(ConnectError::Transport),
                code => {
                    return match ConnectError::from_connack(code) {
                        None => Ok(()),
                        Some(e) => Err(e),
                    };
                }
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectError> {
        self.connects += 1;
        let result = self.script.pop_front().unwrap_or(Ok(()));
        self.connected = result.is_ok();
        result
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.connected
    }

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        let topic = CString::new(topic).map_err(|_| BrokerError::Rejected)?;
        // SAFETY: valid handle and NUL-terminated topic.
        let id = unsafe { esp_mqtt_client_subscribe_single(self.client, topic.as_ptr(), 0) };
        if id < 0 { Err(BrokerError::Rejected) } else { Ok(()) }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.subscriptions.push(topic.to_owned());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let topic = CString::new(topic).map_err(|_| BrokerError::Rejected)?;
        // SAFETY: the client copies the payload before returning.
        let id = unsafe {
            esp_mqtt_client_publish(
                self.client,
                topic.as_ptr(),
                payload.as_ptr().cast(),
                payload.len() as i32,
                0,
                0,
            )
        };
        if id < 0 { Err(BrokerError::Rejected) } else { Ok(()) }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.published.push((topic.to_owned(), payload.to_vec()));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_take_inbound(&mut self) -> Option<InboundMessage> {
        self.shared.inbound.dequeue()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_take_inbound(&mut self) -> Option<InboundMessage> {
        self.inbound.pop_front()
    }
}

#[cfg(target_os = "espidf")]
impl Drop for MqttAdapter {
    fn drop(&mut self) {
        // SAFETY: stops the event task before `shared` is freed.
        unsafe { esp_mqtt_client_destroy(self.client) };
    }
}

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    /// Simulation: results for the next connect attempts, in order.
    pub fn sim_script(&mut self, results: impl IntoIterator<Item = Result<(), ConnectError>>) {
        self.script.extend(results);
    }

    /// Simulation: the broker closes the session.
    pub fn sim_drop_session(&mut self) {
        self.connected = false;
    }

    /// Simulation: a message arrives on a subscribed topic.
    pub fn sim_deliver(&mut self, topic: &str, payload: &[u8]) {
        if !self.subscriptions.iter().any(|t| t == topic) {
            return;
        }
        if let Some(msg) = inbound_message(topic.as_bytes(), payload) {
            self.inbound.push_back(msg);
        }
    }

    pub fn sim_connects(&self) -> u32 {
        self.connects
    }

    pub fn sim_subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub fn sim_published(&self) -> &[(String, Vec<u8>)] {
        &self.published
    }
}

impl BrokerPort for MqttAdapter {
    fn link_up(&self) -> bool {
        self.link.load(Ordering::Acquire)
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn connect(&mut self) -> Result<(), ConnectError> {
        if !self.link_up() {
            return Err(ConnectError::Transport);
        }
        self.platform_connect()
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if !self.platform_is_connected() {
            return Err(BrokerError::NotConnected);
        }
        if topic.len() > 64 {
            return Err(BrokerError::TopicTooLong);
        }
        self.platform_subscribe(topic)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.platform_is_connected() {
            return Err(BrokerError::NotConnected);
        }
        if topic.len() > 64 {
            return Err(BrokerError::TopicTooLong);
        }
        self.platform_publish(topic, payload)
    }

    fn take_inbound(&mut self) -> Option<InboundMessage> {
        self.platform_take_inbound()
    }
}
