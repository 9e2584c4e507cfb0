use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use connmrs::{ConnectionManager, ManagerEvent, Service, TechnologyType};

#[derive(Parser, Debug)]
#[command(name = "connmrsctl")]
#[command(version, about = "Manage ConnMan connections")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List services, optionally of one technology type
    Services {
        #[arg(short = 't', long = "type", value_parser = parse_kind)]
        kind: Option<TechnologyType>,
    },
    /// List technologies
    Technologies,
    /// Scan a technology for services
    Scan {
        #[arg(default_value = "wifi", value_parser = parse_kind)]
        kind: TechnologyType,
    },
    /// Connect to an access point by name
    Connect {
        name: String,
        #[arg(short = 't', long = "type", default_value = "wifi", value_parser = parse_kind)]
        kind: TechnologyType,
        /// Wait until the service is online
        #[arg(short, long)]
        wait: bool,
    },
    /// Disconnect a service by identifier
    Disconnect { id: String },
    /// Forget a Wi-Fi service by identifier
    Remove { id: String },
    /// Turn offline mode on or off
    Offline {
        #[arg(value_parser = parse_switch)]
        enabled: bool,
    },
    /// Turn tethering on or off
    Tether {
        #[arg(value_parser = parse_kind)]
        kind: TechnologyType,
        #[arg(value_parser = parse_switch)]
        enabled: bool,
        #[arg(long)]
        ssid: Option<String>,
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// Print manager events as they arrive
    Monitor,
}

fn parse_kind(s: &str) -> Result<TechnologyType, String> {
    s.parse().map_err(|e: connmrs::ConnmanError| e.to_string())
}

fn parse_switch(s: &str) -> Result<bool, String> {
    match s {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        other => Err(format!("expected on or off, got '{other}'")),
    }
}

fn print_service(service: &Service) {
    println!(
        "{:<40} {:<10} {:<14} {:>4}  {}",
        service.name().unwrap_or("<hidden>"),
        service.raw_type().unwrap_or("?"),
        service.state().map_or("?", |s| s.as_str()),
        service
            .strength()
            .map(|s| format!("{s}%"))
            .unwrap_or_default(),
        service.id()
    );
}

pub async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let cm = ConnectionManager::new()
        .await
        .context("cannot reach connmand")?;

    match args.command {
        Command::Services { kind } => {
            for service in cm.list_services(kind).await? {
                print_service(&service);
            }
        }
        Command::Technologies => {
            for info in cm.technology_infos().await? {
                println!(
                    "{:<12} powered={} connected={} tethering={}",
                    info.name().unwrap_or("?"),
                    info.powered(),
                    info.connected(),
                    info.tethering()
                );
            }
        }
        Command::Scan { kind } => {
            let technology = cm.technology(kind).await?;
            technology.scan().await?;
            for service in technology.services().await? {
                print_service(&service);
            }
        }
        Command::Connect { name, kind, wait } => {
            let mut handle = cm.handle(kind).await?;
            if wait {
                handle.connect_and_wait(Some(&name)).await?;
                println!("Connected to {name}");
            } else {
                handle.connect(Some(&name)).await?;
                println!("Connecting to {name}");
            }
        }
        Command::Disconnect { id } => {
            let mut handle = cm.resolve_service(&id).await?;
            handle.disconnect().await?;
        }
        Command::Remove { id } => {
            let mut handle = cm.resolve_service(&id).await?;
            let Some(wifi) = handle.as_wifi_mut() else {
                bail!("{id} is not a Wi-Fi service");
            };
            wifi.remove().await?;
        }
        Command::Offline { enabled } => cm.set_offline_mode(enabled).await?,
        Command::Tether {
            kind,
            enabled,
            ssid,
            passphrase,
        } => {
            let technology = cm.technology(kind).await?;
            if enabled {
                technology
                    .enable_tethering(ssid.as_deref(), passphrase.as_deref())
                    .await?;
            } else {
                technology.disable_tethering().await?;
            }
        }
        Command::Monitor => {
            let mut events = cm.events();
            while let Some(event) = events.next().await {
                match event {
                    ManagerEvent::PropertyChanged { name, value } => println!("{name} = {value}"),
                    ManagerEvent::TechnologyAdded { technology } => {
                        println!("+ {}", technology.path)
                    }
                    ManagerEvent::TechnologyRemoved { path } => println!("- {path}"),
                    ManagerEvent::ServicesChanged { changed, removed } => {
                        for service in &changed {
                            print_service(service);
                        }
                        for path in removed {
                            println!("- {path}");
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
