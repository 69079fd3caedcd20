#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = telebus::app::startup::startup().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
