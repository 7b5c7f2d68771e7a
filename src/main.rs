mod app;
mod config;
mod context;
mod event;
mod portal;
mod record;
mod theme;
mod wallet;

use app::GifPortApp;
use config::Config;
use eframe::egui;
use portal::PortalClient;
use record::rpc::{JsonRpcProgram, ProgramRpc};
use std::sync::{mpsc, Arc};
use tracing_subscriber::EnvFilter;
use wallet::local::LocalKeyWallet;
use wallet::{WalletCapability, WalletSession};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load();
    let (tx, rx) = mpsc::channel();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("gifport-runtime")
        .build()?;

    // Capability detection happens exactly once per launch.
    let capability = LocalKeyWallet::discover(&config.wallet_dir)
        .map(|wallet| Arc::new(wallet) as Arc<dyn WalletCapability>);
    let session = WalletSession::detect(capability);

    let rpc = Arc::new(JsonRpcProgram::new()) as Arc<dyn ProgramRpc>;
    let portal = PortalClient::new(
        config.connection(),
        config.record_identity(),
        rpc,
        session,
        tx,
        runtime.handle().clone(),
    );
    portal.start();

    let app = GifPortApp::new(rx, portal);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([880.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "GIF Portal",
        native_options,
        Box::new(move |creation_context| {
            app.theme().apply_visuals(&creation_context.egui_ctx);
            Ok(Box::new(app))
        }),
    )?;

    Ok(())
}
