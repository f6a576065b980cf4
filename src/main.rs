#[tokio::main]
async fn main() {
    if let Err(e) = idvault_lib::run().await {
        eprintln!("idvault: {e}");
        std::process::exit(1);
    }
}
