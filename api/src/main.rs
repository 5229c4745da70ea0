#[tokio::main]
async fn main() {
    if let Err(e) = portal_api::run_server().await {
        eprintln!("portal-api failed: {:#}", e);
        std::process::exit(1);
    }
}
