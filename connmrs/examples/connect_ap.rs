/// Example connecting to a Wi-Fi access point and following its progress.
///
/// The passphrase is supplied through an [`Agent`], which the daemon would
/// query during the connection.
use async_trait::async_trait;
use connmrs::{Agent, ConnectionManager, PropertyMap, TechnologyType};
use std::sync::Arc;

#[derive(Debug)]
struct PassphraseAgent {
    passphrase: String,
}

#[async_trait]
impl Agent for PassphraseAgent {
    async fn request_input(&self, service: &str, fields: &PropertyMap) -> connmrs::Result<PropertyMap> {
        println!("{service} asks for {:?}", fields.keys().collect::<Vec<_>>());
        let mut reply = PropertyMap::new();
        if fields.contains_key("Passphrase") {
            reply.insert("Passphrase".into(), self.passphrase.clone().into());
        }
        Ok(reply)
    }

    async fn report_error(&self, service: &str, error: &str) -> connmrs::Result<()> {
        eprintln!("{service}: {error}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> connmrs::Result<()> {
    let target = std::env::args().nth(1).unwrap_or_else(|| "MyNetwork".to_string());
    let passphrase = std::env::var("WIFI_PASSWORD").unwrap_or_else(|_| "password".to_string());

    let cm = ConnectionManager::new()
        .await?
        .with_agent(Arc::new(PassphraseAgent { passphrase }));

    let wifi = cm.technology(TechnologyType::Wifi).await?;
    println!("Scanning ...");
    wifi.scan().await?;

    let mut service = cm.handle(TechnologyType::Wifi).await?;
    let mut events = service.events();
    let progress = tokio::spawn(async move {
        while let Some(change) = events.next().await {
            println!("{} = {}", change.name, change.value);
        }
    });

    println!("Connecting to {target} ...");
    service.connect_and_wait(Some(&target)).await?;
    println!("Connected");

    drop(service);
    progress.abort();
    Ok(())
}
