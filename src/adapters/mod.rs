//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements       | Connects to                 |
//! |-------------|------------------|-----------------------------|
//! | `device_id` | (helper)         | eFuse MAC → MQTT client id  |
//! | `hardware`  | (power sampling) | ESP32 ADC1                  |
//! | `log_sink`  | EventSink        | Serial log output           |
//! | `mqtt`      | BrokerPort       | ESP-MQTT client             |
//! | `nvs`       | ConfigPort       | NVS / in-memory store       |
//! | `time`      | (clock)          | ESP32 system timer          |
//! | `uart`      | SerialSource     | PM2.5 sensor UART           |
//! | `wifi`      | ConnectivityPort | ESP-IDF WiFi STA            |

pub mod device_id;
pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub mod uart;
pub mod wifi;
