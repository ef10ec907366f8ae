//! Pinwatch firmware — main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  HardwareReader   LogEventSink   NvsAdapter   Esp32Time      │
//! │  (PinReader)      (EventSink)    (Config)     (u32 ms clock) │
//! │  WifiAdapter      MqttAdapter    PortalServer                │
//! │  (Connectivity)   (MqttPort)     (provisioning HTTP)         │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────┐      │
//! │  │          NodeService (pure logic)                  │      │
//! │  │  connection supervision · PinThrottle              │      │
//! │  └────────────────────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::info;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyInputPin, Input, PinDriver, Pull};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::reset;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use pinwatch::adapters::hardware::HardwareReader;
use pinwatch::adapters::log_sink::LogEventSink;
use pinwatch::adapters::mqtt::MqttAdapter;
use pinwatch::adapters::nvs::NvsAdapter;
use pinwatch::adapters::portal::ProvisioningPortal;
use pinwatch::adapters::portal::server::PortalServer;
use pinwatch::adapters::time::Esp32TimeAdapter;
use pinwatch::adapters::wifi::WifiAdapter;
use pinwatch::app::events::AppEvent;
use pinwatch::app::ports::EventSink;
use pinwatch::app::service::{NodeService, TickOutcome};
use pinwatch::config::RuntimeConfig;
use pinwatch::pins;

/// Main-loop period; also yields to the idle task.
const LOOP_PERIOD_MS: u32 = 10;

/// Time for the UART to drain before a software restart.
const RESTART_FLUSH_MS: u32 = 100;

type MotionPin = PinDriver<'static, AnyInputPin, Input>;

fn restart() -> ! {
    FreeRtos::delay_ms(RESTART_FLUSH_MS);
    reset::restart()
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Pinwatch v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let runtime = RuntimeConfig::default();
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    // ── 2. Config store ───────────────────────────────────────
    let nvs = NvsAdapter::new()?;

    // ── 3. Construct adapters ─────────────────────────────────
    let wifi = WifiAdapter::new(BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sysloop.clone(), None)?,
        sysloop,
    )?);
    let mut node: NodeService<WifiAdapter, MqttAdapter> =
        NodeService::new(runtime.clone(), wifi, MqttAdapter::new());

    let mut reader: HardwareReader<MotionPin, 4> = HardwareReader::new();
    let mut motion = PinDriver::input(AnyInputPin::from(peripherals.pins.gpio16))?;
    motion.set_pull(Pull::Down)?;
    reader.add_digital(pins::MOTION_SENSOR_GPIO, motion)?;

    let mut sink = LogEventSink::new();
    let mut delay = FreeRtos;
    let time = Esp32TimeAdapter::new();

    // ── 4. Monitors ───────────────────────────────────────────
    node.register_motion_sensor()?;

    node.init_analog_inputs()?;

    // ── 5. Start: soft-AP or station, then the portal ─────────
    if node.start(&nvs, &mut delay, &mut sink) == TickOutcome::Restart {
        restart();
    }

    // Served in both modes: on the soft-AP while provisioning, on the
    // station IP once connected, so a working node can be reconfigured.
    let portal = PortalServer::start(
        ProvisioningPortal::new(runtime.restart_delay_ms),
        nvs.clone(),
        runtime.portal_port,
    )?;
    info!("Portal: serving in {:?} mode", node.mode());

    // ── 6. Main loop ──────────────────────────────────────────
    info!("Entering main loop");
    loop {
        if let Some(after_ms) = portal.pending_restart() {
            sink.emit(&AppEvent::RestartRequested);
            FreeRtos::delay_ms(after_ms);
            restart();
        }

        let outcome = node.tick(time.uptime_ms(), &mut reader, &nvs, &mut delay, &mut sink);
        if outcome == TickOutcome::Restart {
            restart();
        }

        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
