use std::time::Duration;

use tracing::info;

use gearvr_bridge::domain::models::PointerConfig;
use gearvr_bridge::domain::settings::SettingsService;
use gearvr_bridge::infrastructure::logging;
use gearvr_bridge::infrastructure::output::TraceSink;
use gearvr_bridge::infrastructure::radio::gearvr::GearVrAdapter;
use gearvr_bridge::infrastructure::radio::mock::MockRadio;
use gearvr_bridge::infrastructure::radio::supervisor::Supervisor;
use gearvr_bridge::infrastructure::radio::RadioConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();

    let _logging_guard = logging::init_logger(&settings.log)?;
    info!("Starting Gear VR controller bridge");

    // Simulated controller backend; a platform BLE backend plugs in here.
    let (radio, peer) = MockRadio::with_stubborn_peer();

    let mut supervisor = Supervisor::new(radio);
    supervisor.register_adapter(Box::new(GearVrAdapter::new(
        PointerConfig::from(&settings.pointer),
        Box::new(TraceSink),
    )));
    supervisor.initialize(&RadioConfig::from(&settings.radio))?;

    // Status indicator: log the link state whenever it changes.
    let shared_state = supervisor.shared_state();
    tokio::spawn(async move {
        let mut last = shared_state.get();
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        loop {
            interval.tick().await;
            let state = shared_state.get();
            if state != last {
                info!(?state, "link state changed");
                last = state;
            }
        }
    });

    let tick_ms = settings.radio.tick_ms;
    let mut ticker = tokio::time::interval(Duration::from_millis(tick_ms));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                supervisor.tick(tick_ms as u32);
                peer.step(tick_ms as u32);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
