//! Provisioning portal, served on the soft-AP while unprovisioned and on
//! the station address afterwards.
//!
//! Request handling is transport-independent: [`ProvisioningPortal::handle`]
//! maps `(method, path, body)` to a [`PortalOutcome`].  On ESP-IDF the
//! [`server`] module binds it to `EspHttpServer`; host tests call it
//! directly.
//!
//! | Route          | Response                                          |
//! |----------------|---------------------------------------------------|
//! | `GET /`        | 200, credentials form                             |
//! | `POST /save`   | 303 → `/success`; 400 invalid; 429 flood; 500 I/O |
//! | `GET /success` | 200, then [`PortalAction::Restart`]               |
//! | anything else  | 404                                               |
//!
//! Bodies that do not fit [`MAX_BODY`] are answered 413 before routing.
//!
//! The stored password is never logged.

use burster::Limiter;
use core::fmt;
use core::time::Duration;
use log::{info, warn};

use super::utils::is_printable_field;
use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::{ConfigField, DeviceConfig, FIELD_CAPACITY};

/// Save requests allowed per second, and the burst the bucket starts with.
const SAVE_RATE_PER_SEC: u64 = 3;
const SAVE_BURST: u64 = 3;

const MIN_PASSWORD_LEN: usize = 8;

/// Digits of the largest valid port, with room for leading zeros.
type PortField = heapless::String<8>;

const FORM_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\
<title>Sensor setup</title></head><body><h1>Sensor setup</h1>\
<form method=\"POST\" action=\"/save\">\
<label>WiFi SSID <input name=\"ssid\" maxlength=\"32\" required></label><br>\
<label>WiFi password <input name=\"password\" type=\"password\" minlength=\"8\" maxlength=\"32\" required></label><br>\
<label>MQTT server <input name=\"mqttServer\" maxlength=\"32\" required></label><br>\
<label>MQTT port <input name=\"mqttPort\" type=\"number\" min=\"1\" max=\"65535\" value=\"1883\" required></label><br>\
<input type=\"submit\" value=\"Save\"></form></body></html>";

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
<title>Saved</title></head><body><h1>Settings saved</h1>\
<p>The device will restart and join your network.</p></body></html>";

/// Largest form body accepted; the form has four short fields.
pub const MAX_BODY: usize = 512;

const CONTENT_HTML: &str = "text/html";
const CONTENT_TEXT: &str = "text/plain";

// ── Request / response model ─────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortalResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: &'static str,
    /// Set on redirects.
    pub location: Option<&'static str>,
}

impl PortalResponse {
    const fn html(body: &'static str) -> Self {
        Self {
            status: 200,
            content_type: CONTENT_HTML,
            body,
            location: None,
        }
    }

    const fn text(status: u16, body: &'static str) -> Self {
        Self {
            status,
            content_type: CONTENT_TEXT,
            body,
            location: None,
        }
    }

    pub const fn payload_too_large() -> Self {
        Self::text(413, "request body too large")
    }

    const fn see_other(location: &'static str) -> Self {
        Self {
            status: 303,
            content_type: CONTENT_TEXT,
            body: "",
            location: Some(location),
        }
    }
}

/// Follow-up the host loop must carry out once the response is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalAction {
    None,
    Restart { after_ms: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortalOutcome {
    pub response: PortalResponse,
    pub action: PortalAction,
}

impl From<PortalResponse> for PortalOutcome {
    fn from(response: PortalResponse) -> Self {
        Self {
            response,
            action: PortalAction::None,
        }
    }
}

// ── Form decoding ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningError {
    InvalidUtf8,
    MalformedEscape,
    FieldTooLong,
    InvalidSsid,
    InvalidPassword,
    InvalidServer,
    InvalidPort,
}

impl ProvisioningError {
    /// Plain-text reason returned in the 400 body.
    pub const fn reason(self) -> &'static str {
        match self {
            Self::InvalidUtf8 => "form data is not valid UTF-8",
            Self::MalformedEscape => "malformed percent-escape in form data",
            Self::FieldTooLong => "a field exceeds 32 bytes",
            Self::InvalidSsid => "ssid must be 1-32 printable ASCII characters",
            Self::InvalidPassword => "password must be 8-32 bytes",
            Self::InvalidServer => "mqttServer must be 1-32 printable ASCII characters",
            Self::InvalidPort => "mqttPort must be a number between 1 and 65535",
        }
    }
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

impl core::error::Error for ProvisioningError {}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode one `application/x-www-form-urlencoded` component into `out`.
fn decode_component<const N: usize>(
    raw: &[u8],
    out: &mut heapless::String<N>,
) -> Result<(), ProvisioningError> {
    let mut bytes: heapless::Vec<u8, N> = heapless::Vec::new();
    let mut i = 0;
    while i < raw.len() {
        let b = match raw[i] {
            b'+' => b' ',
            b'%' => {
                let hi = raw.get(i + 1).copied().and_then(hex_value);
                let lo = raw.get(i + 2).copied().and_then(hex_value);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        i += 2;
                        (hi << 4) | lo
                    }
                    _ => return Err(ProvisioningError::MalformedEscape),
                }
            }
            other => other,
        };
        bytes.push(b).map_err(|_| ProvisioningError::FieldTooLong)?;
        i += 1;
    }
    let s = core::str::from_utf8(&bytes).map_err(|_| ProvisioningError::InvalidUtf8)?;
    out.clear();
    out.push_str(s).map_err(|_| ProvisioningError::FieldTooLong)
}

/// Parse and validate a posted credentials form.
///
/// Unknown keys are ignored; a repeated key keeps its last value.
pub fn parse_form(body: &[u8]) -> Result<DeviceConfig, ProvisioningError> {
    let mut cfg = DeviceConfig::default();
    let mut port = PortField::new();

    for pair in body.split(|&b| b == b'&').filter(|p| !p.is_empty()) {
        let (key, value) = match pair.iter().position(|&b| b == b'=') {
            Some(eq) => (&pair[..eq], &pair[eq + 1..]),
            None => (pair, &[][..]),
        };
        match key {
            b"ssid" => decode_component(value, &mut cfg.ssid)?,
            b"password" => decode_component(value, &mut cfg.password)?,
            b"mqttServer" => decode_component(value, &mut cfg.mqtt_server)?,
            b"mqttPort" => {
                decode_component(value, &mut port).map_err(|_| ProvisioningError::InvalidPort)?
            }
            _ => {}
        }
    }

    validate_text(&cfg.ssid).ok_or(ProvisioningError::InvalidSsid)?;
    if !(MIN_PASSWORD_LEN..=FIELD_CAPACITY).contains(&cfg.password.len()) {
        return Err(ProvisioningError::InvalidPassword);
    }
    validate_text(&cfg.mqtt_server).ok_or(ProvisioningError::InvalidServer)?;
    cfg.mqtt_port = match port.trim().parse::<u16>() {
        Ok(p) if p > 0 => p,
        _ => return Err(ProvisioningError::InvalidPort),
    };

    Ok(cfg)
}

fn validate_text(field: &ConfigField) -> Option<()> {
    is_printable_field(field, FIELD_CAPACITY).then_some(())
}

// ── Portal ───────────────────────────────────────────────────

pub struct ProvisioningPortal {
    save_limiter: burster::TokenBucket<fn() -> Duration>,
    restart_delay_ms: u32,
}

impl ProvisioningPortal {
    pub fn new(restart_delay_ms: u32) -> Self {
        Self::with_time_provider(restart_delay_ms, platform_now)
    }

    /// Same as [`new`](Self::new) with an explicit clock for the save limiter.
    pub fn with_time_provider(restart_delay_ms: u32, now: fn() -> Duration) -> Self {
        Self {
            save_limiter: burster::TokenBucket::new_with_time_provider(
                SAVE_RATE_PER_SEC,
                SAVE_BURST,
                now,
            ),
            restart_delay_ms,
        }
    }

    /// Serve one request.  `path` may carry a query string; it is ignored.
    pub fn handle(
        &mut self,
        method: HttpMethod,
        path: &str,
        body: &[u8],
        store: &impl ConfigPort,
    ) -> PortalOutcome {
        let path = path.split('?').next().unwrap_or(path);
        match (method, path) {
            (HttpMethod::Get, "/") => PortalResponse::html(FORM_PAGE).into(),
            (HttpMethod::Post, "/save") => self.save(body, store).into(),
            (HttpMethod::Get, "/success") => PortalOutcome {
                response: PortalResponse::html(SUCCESS_PAGE),
                action: PortalAction::Restart {
                    after_ms: self.restart_delay_ms,
                },
            },
            _ => PortalResponse::text(404, "not found").into(),
        }
    }

    fn save(&mut self, body: &[u8], store: &impl ConfigPort) -> PortalResponse {
        if self.save_limiter.try_consume(1).is_err() {
            warn!("Portal: save rate limit exceeded");
            return PortalResponse::text(429, "too many requests");
        }

        let cfg = match parse_form(body) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Portal: rejected form ({})", e);
                return PortalResponse::text(400, e.reason());
            }
        };

        match store.save(&cfg) {
            Ok(()) => {
                info!(
                    "Portal: saved ssid='{}' broker={}:{}",
                    cfg.ssid, cfg.mqtt_server, cfg.mqtt_port
                );
                PortalResponse::see_other("/success")
            }
            Err(ConfigError::ValidationFailed(reason)) => {
                warn!("Portal: store rejected config ({})", reason);
                PortalResponse::text(400, reason)
            }
            Err(e) => {
                warn!("Portal: could not persist config ({})", e);
                PortalResponse::text(500, "could not save settings")
            }
        }
    }
}

// ── Request body ─────────────────────────────────────────────

/// Result of draining a request body into a fixed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyRead {
    /// The whole body fit; holds its length.
    Complete(usize),
    /// More bytes followed a full buffer.  Nothing may be parsed.
    TooLarge,
}

/// Fill `buf` from `read` until end of body.  A full buffer is followed by
/// one extra read so an exactly-sized body is still accepted.
pub fn read_body<E>(
    buf: &mut [u8],
    mut read: impl FnMut(&mut [u8]) -> Result<usize, E>,
) -> Result<BodyRead, E> {
    let mut len = 0;
    while len < buf.len() {
        let n = read(&mut buf[len..])?;
        if n == 0 {
            return Ok(BodyRead::Complete(len));
        }
        len += n;
    }
    let mut extra = [0u8; 1];
    match read(&mut extra)? {
        0 => Ok(BodyRead::Complete(len)),
        _ => Ok(BodyRead::TooLarge),
    }
}

// ── Platform time for rate limiter ───────────────────────────

#[cfg(target_os = "espidf")]
fn platform_now() -> Duration {
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

#[cfg(not(target_os = "espidf"))]
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

// ── ESP-IDF HTTP binding ─────────────────────────────────────

/// Binds a [`ProvisioningPortal`] to `EspHttpServer`.
///
/// Every GET and POST is routed through the portal, which owns the 404
/// decision.  A restart requested by `/success` is latched for the main
/// loop; the handler itself never blocks on it.
#[cfg(target_os = "espidf")]
pub mod server {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use esp_idf_svc::http::Method;
    use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
    use esp_idf_svc::io::{Read, Write};
    use log::{info, warn};

    use super::{
        BodyRead, HttpMethod, MAX_BODY, PortalAction, PortalOutcome, PortalResponse,
        ProvisioningPortal, read_body,
    };
    use crate::app::ports::ConfigPort;

    /// Sentinel for "no restart pending".
    const NO_RESTART: u32 = u32::MAX;

    pub struct PortalServer {
        _server: EspHttpServer<'static>,
        restart_after_ms: Arc<AtomicU32>,
    }

    impl PortalServer {
        pub fn start<S>(portal: ProvisioningPortal, store: S, port: u16) -> anyhow::Result<Self>
        where
            S: ConfigPort + Send + 'static,
        {
            let conf = Configuration {
                http_port: port,
                uri_match_wildcard: true,
                ..Default::default()
            };
            let mut server = EspHttpServer::new(&conf)?;
            let shared = Arc::new(Mutex::new((portal, store)));
            let restart_after_ms = Arc::new(AtomicU32::new(NO_RESTART));

            for (method, kind) in [(Method::Get, HttpMethod::Get), (Method::Post, HttpMethod::Post)] {
                let shared = Arc::clone(&shared);
                let restart = Arc::clone(&restart_after_ms);
                server.fn_handler::<anyhow::Error, _>("/*", method, move |req| {
                    serve(req, kind, &shared, &restart)
                })?;
            }

            info!("Portal: HTTP server listening on port {}", port);
            Ok(Self {
                _server: server,
                restart_after_ms,
            })
        }

        /// Restart delay requested by the success page, if any.
        pub fn pending_restart(&self) -> Option<u32> {
            match self.restart_after_ms.load(Ordering::Acquire) {
                NO_RESTART => None,
                ms => Some(ms),
            }
        }
    }

    fn serve<S: ConfigPort>(
        mut req: Request<&mut EspHttpConnection<'_>>,
        method: HttpMethod,
        shared: &Mutex<(ProvisioningPortal, S)>,
        restart: &AtomicU32,
    ) -> anyhow::Result<()> {
        let path: heapless::String<64> =
            heapless::String::try_from(req.uri()).unwrap_or_else(|_| heapless::String::new());

        let mut body = [0u8; MAX_BODY];
        let read = if method == HttpMethod::Post {
            read_body(&mut body, |chunk| req.read(chunk))?
        } else {
            BodyRead::Complete(0)
        };

        let outcome = match read {
            BodyRead::TooLarge => {
                warn!("Portal: {} body exceeds {} bytes", path, MAX_BODY);
                PortalOutcome::from(PortalResponse::payload_too_large())
            }
            BodyRead::Complete(len) => {
                let mut guard = shared
                    .lock()
                    .map_err(|_| anyhow::anyhow!("portal state poisoned"))?;
                let (portal, store) = &mut *guard;
                portal.handle(method, &path, &body[..len], &*store)
            }
        };

        let r = outcome.response;
        let mut headers: heapless::Vec<(&str, &str), 2> = heapless::Vec::new();
        let _ = headers.push(("Content-Type", r.content_type));
        if let Some(location) = r.location {
            let _ = headers.push(("Location", location));
        }
        let mut resp = req.into_response(r.status, None, &headers)?;
        resp.write_all(r.body.as_bytes())?;
        resp.flush()?;

        if let PortalAction::Restart { after_ms } = outcome.action {
            warn!("Portal: restart requested in {} ms", after_ms);
            restart.store(after_ms, Ordering::Release);
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────
