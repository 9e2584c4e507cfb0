use connmrs::{ConnectionManager, TechnologyType};

#[tokio::main]
async fn main() -> connmrs::Result<()> {
    let cm = ConnectionManager::new().await?;

    let wifi = cm.technology(TechnologyType::Wifi).await?;
    println!("Scanning for WiFi networks...");
    wifi.scan().await?;

    for service in cm.list_services(Some(TechnologyType::Wifi)).await? {
        println!(
            "{:30} {:>4}% {:12} {}",
            service.name().unwrap_or("<hidden>"),
            service.strength().unwrap_or(0),
            service.state().map_or("?", |s| s.as_str()),
            service.security().join(",")
        );
    }

    Ok(())
}
