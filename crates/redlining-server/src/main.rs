// The binary uses the library, not duplicate modules
use redlining_server::{Settings, init_tracing, start_server};

fn main() {
    init_tracing();
    let settings = Settings::from_cli();

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(start_server(settings)) {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}
