use std::env;

#[tokio::main]
async fn main() {
    println!("Backend RPC Probe");
    println!("This checks the enforcement backend endpoints the panel polls");

    // Get backend base URL from command line or use the default
    let base = env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8090".to_string());
    let base = base.trim_end_matches('/').to_string();

    println!("Probing backend at: {}", base);

    let client = reqwest::Client::new();
    for endpoint in ["connections", "allowed_ips", "geolocation_status"] {
        let url = format!("{}/{}", base, endpoint);
        println!("Requesting {}...", url);
        match client.get(&url).send().await {
            Ok(response) => {
                let status = response.status();
                match response.text().await {
                    Ok(body) => {
                        println!("  {} -> HTTP {} ({} bytes)", endpoint, status, body.len());
                    }
                    Err(e) => {
                        println!("  {} -> failed to read body: {}", endpoint, e);
                    }
                }
            }
            Err(e) => {
                println!("  {} -> request failed: {}", endpoint, e);
            }
        }
    }

    println!("Probe completed");
}
