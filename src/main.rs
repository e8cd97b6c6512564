use venus_bridge::prelude::*;

#[tokio::main]
async fn main() {
    let options = Options::new();

    if let Err(e) = venus_bridge::run(options).await {
        error!("Application error: {}", e);
        std::process::exit(255);
    }
}
