/// Example demonstrating custom timeout configuration.
///
/// Scans on busy radios and connections through slow DHCP servers may need
/// more than the default 30 seconds.
use connmrs::{ConnectionManager, TechnologyType, TimeoutConfig};
use std::time::Duration;

#[tokio::main]
async fn main() -> connmrs::Result<()> {
    let config = TimeoutConfig::new()
        .with_scan_timeout(Duration::from_secs(45))
        .with_connect_timeout(Duration::from_secs(60));

    let cm = ConnectionManager::with_config(config).await?;
    println!("Scan timeout:    {:?}", cm.timeouts().scan_timeout);
    println!("Connect timeout: {:?}", cm.timeouts().connect_timeout);

    cm.technology(TechnologyType::Wifi).await?.scan().await?;
    println!("Scan finished");

    Ok(())
}
