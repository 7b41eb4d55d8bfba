//! Login demo: QR login against the in-memory client, then list devices.
//!
//! Run with: `cargo run --example login`

use std::sync::Arc;
use std::time::Duration;
use whatsapp_app::store::{Device, MemoryStore};
use whatsapp_app::{AppConfig, AppService, Error, Jid, MemoryClient, QrEvent, QrScript};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = AppConfig::load(None)?;
    let store = Arc::new(MemoryStore::new());
    let client = Arc::new(MemoryClient::new(store.clone()));
    client
        .set_qr_script(QrScript {
            events: vec![QrEvent::code(
                "2@demo-ref,demo-noise-key,demo-identity-key,demo-adv",
                Duration::from_secs(60),
            )],
            hold_open: true,
        })
        .await;
    let service = AppService::new(Some(client.clone()), store, config);

    let qr = service.login().await?;
    println!(
        "Scan {} with WhatsApp > Linked devices (valid {}s)",
        qr.image_path.display(),
        qr.duration.as_secs()
    );

    // Pretend the phone scanned it.
    client
        .complete_pairing(Device {
            id: Some(Jid::new_ad("6281234567890", 0, 12, "s.whatsapp.net")),
            push_name: Some("Demo phone".into()),
            platform: Some("android".into()),
            ..Default::default()
        })
        .await?;

    match service.login().await {
        Err(Error::AlreadyLoggedIn) => println!("Already logged in."),
        other => println!("Unexpected login result: {other:?}"),
    }

    for device in service.fetch_devices().await? {
        println!("{} ({})", device.device, device.name);
    }

    service.logout().await?;
    println!("Logged out.");
    Ok(())
}
