//! Tests for `ConnectionManager` against the in-memory daemon.

mod common;

use common::{
    FakeDaemon, SERVICE_UNKNOWN, manager, service_path, technology_path, timeouts, within,
};
use connmrs::{
    ConnectionManager, ConnmanError, ManagerEvent, PropertyValue, Query, ServiceHandle,
    TechnologyType,
};
use std::collections::HashSet;

#[tokio::test]
async fn initialization_enumerates_technologies() {
    let daemon = FakeDaemon::standard();
    let cm = manager(&daemon).await;

    assert_eq!(daemon.count("GetTechnologies"), 1);
    let technologies = cm.technologies().await.unwrap();
    assert_eq!(technologies.len(), 2);
    assert_eq!(
        technologies[&TechnologyType::Wifi].path(),
        "/net/connman/technology/wifi"
    );
    assert_eq!(daemon.count("GetTechnologies"), 1);
}

#[tokio::test]
async fn unreachable_manager_object() {
    let daemon = FakeDaemon::standard();
    daemon.make_unreachable("/");

    let err = ConnectionManager::with_bus(daemon.bus(), timeouts())
        .await
        .unwrap_err();
    assert!(matches!(err, ConnmanError::Unreachable(_)));
}

#[tokio::test]
async fn missing_daemon_during_enumeration_is_unreachable() {
    let daemon = FakeDaemon::standard();
    daemon.fail(
        "/",
        "GetTechnologies",
        SERVICE_UNKNOWN,
        "The name net.connman was not provided by any .service files",
    );

    let err = ConnectionManager::with_bus(daemon.bus(), timeouts())
        .await
        .unwrap_err();
    assert!(matches!(err, ConnmanError::Unreachable(ref msg) if msg.contains("net.connman")));
}

#[tokio::test]
async fn zero_services_is_an_empty_list() {
    let daemon = FakeDaemon::new();
    daemon.add_technology("wifi", "WiFi");
    let cm = manager(&daemon).await;

    assert!(cm.list_services(None).await.unwrap().is_empty());
    assert!(
        cm.list_services(Some(TechnologyType::Wifi))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn type_filter_partitions_the_enumeration() {
    let daemon = FakeDaemon::standard();
    daemon.add_technology("bluetooth", "Bluetooth");
    daemon.add_service("bluetooth_001122334455_pan", "bluetooth", "Phone", "idle");
    daemon.add_service("ethernet_0a0b0c_cable", "ethernet", "Wired", "idle");
    let cm = manager(&daemon).await;

    let all = cm.list_services(None).await.unwrap();
    assert_eq!(all.len(), 5);

    let mut seen = HashSet::new();
    for kind in TechnologyType::ALL {
        for service in cm.list_services(Some(kind)).await.unwrap() {
            assert_eq!(service.raw_type(), Some(kind.as_str()));
            assert!(all.contains(&service));
            assert!(seen.insert(service.path.clone()), "{} listed twice", service.path);
        }
    }
    assert_eq!(seen.len(), all.len());
}

#[tokio::test]
async fn enumeration_keeps_daemon_order_and_paths() {
    let daemon = FakeDaemon::standard();
    let cm = manager(&daemon).await;

    let ids: Vec<String> = cm
        .list_services(Some(TechnologyType::Wifi))
        .await
        .unwrap()
        .iter()
        .map(|s| s.id().to_string())
        .collect();
    assert_eq!(
        ids,
        [
            "wifi_112233_436f66666565_managed_psk",
            "wifi_445566_4c696272617279_managed_none"
        ]
    );
}

#[tokio::test]
async fn resolving_an_absent_service_names_it() {
    let daemon = FakeDaemon::standard();
    let cm = manager(&daemon).await;

    let err = cm
        .resolve_service("wifi_aabbcc_managed_psk")
        .await
        .unwrap_err();
    assert!(matches!(err, ConnmanError::ServiceNotFound(ref id) if id == "wifi_aabbcc_managed_psk"));
    assert!(err.to_string().contains("wifi_aabbcc_managed_psk"));
}

#[tokio::test]
async fn resolve_dispatches_on_service_type() {
    let daemon = FakeDaemon::standard();
    let cm = manager(&daemon).await;

    let wifi = cm
        .resolve_service("wifi_445566_4c696272617279_managed_none")
        .await
        .unwrap();
    assert!(matches!(wifi, ServiceHandle::Wifi(_)));
    assert_eq!(
        wifi.path(),
        Some(service_path("wifi_445566_4c696272617279_managed_none").as_str())
    );

    let wired = cm
        .resolve_service(&service_path("ethernet_080027_cable"))
        .await
        .unwrap();
    assert!(wired.as_wired().is_some());
    assert_eq!(wired.kind(), TechnologyType::Ethernet);
}

#[tokio::test]
async fn resolve_does_not_cache() {
    let daemon = FakeDaemon::standard();
    let cm = manager(&daemon).await;

    cm.resolve_service("ethernet_080027_cable").await.unwrap();
    cm.resolve_service("ethernet_080027_cable").await.unwrap();
    assert_eq!(daemon.count("GetServices"), 2);
}

#[tokio::test]
async fn unsupported_and_unknown_service_types() {
    let daemon = FakeDaemon::standard();
    daemon.add_technology("vpn", "VPN");
    daemon.add_service("vpn_office", "vpn", "Office", "idle");
    daemon.add_service("zigbee_1", "zigbee", "Sensor", "idle");
    let cm = manager(&daemon).await;

    let err = cm.resolve_service("vpn_office").await.unwrap_err();
    assert!(matches!(err, ConnmanError::UnsupportedServiceType(ref t) if t == "vpn"));
    assert!(err.to_string().contains("no suitable interface"));

    let err = cm.resolve_service("zigbee_1").await.unwrap_err();
    assert!(matches!(err, ConnmanError::InvalidArgument(ref msg) if msg.contains("zigbee")));
}

#[tokio::test]
async fn search_accepts_any_listed_state() {
    let daemon = FakeDaemon::standard();
    let cm = manager(&daemon).await;

    let query = Query::new().any_of("State", ["ready", "online"]);
    let (handle, service) = cm
        .search_service(&query, Some(TechnologyType::Wifi))
        .await
        .unwrap();
    assert_eq!(service.name(), Some("Library"));
    assert_eq!(handle.path(), Some(service.path.as_str()));

    let idle_only = Query::new()
        .eq("Name", "CoffeeShop")
        .any_of("State", ["ready", "online"]);
    let err = cm.search_service(&idle_only, None).await.unwrap_err();
    assert!(matches!(err, ConnmanError::NoMatchingService));
}

#[tokio::test]
async fn search_without_type_uses_daemon_order() {
    let daemon = FakeDaemon::standard();
    let cm = manager(&daemon).await;

    let query = Query::new().any_of("State", ["ready", "online"]);
    let (handle, service) = cm.search_service(&query, None).await.unwrap();
    assert_eq!(service.id(), "ethernet_080027_cable");
    assert!(handle.as_wired().is_some());
}

#[tokio::test]
async fn offline_mode_round_trip() {
    let daemon = FakeDaemon::standard();
    let cm = manager(&daemon).await;
    let mut events = cm.events();

    cm.set_offline_mode(true).await.unwrap();

    let event = within(events.next()).await;
    assert_eq!(
        event,
        Some(ManagerEvent::PropertyChanged {
            name: "OfflineMode".into(),
            value: PropertyValue::Bool(true),
        })
    );
    let props = cm.get_properties().await.unwrap();
    assert_eq!(props["OfflineMode"], PropertyValue::Bool(true));
}

#[tokio::test]
async fn failed_property_write_is_reported_verbatim() {
    let daemon = FakeDaemon::standard();
    daemon.fail(
        "/",
        "OfflineMode",
        "net.connman.Error.PermissionDenied",
        "Permission denied",
    );
    let cm = manager(&daemon).await;

    let err = cm.set_offline_mode(true).await.unwrap_err();
    assert_eq!(err.failed_property(), Some("OfflineMode"));
    assert_eq!(err.remote_name(), Some("net.connman.Error.PermissionDenied"));
    assert!(err.to_string().contains("Permission denied"));
}

#[tokio::test]
async fn registry_follows_technology_signals() {
    let daemon = FakeDaemon::standard();
    let cm = manager(&daemon).await;
    let mut events = cm.events();
    let enumerations = daemon.count("GetTechnologies");

    daemon.announce_technology("bluetooth", "Bluetooth");
    match within(events.next()).await {
        Some(ManagerEvent::TechnologyAdded { technology }) => {
            assert_eq!(technology.path, "/net/connman/technology/bluetooth");
            assert_eq!(technology.name(), Some("Bluetooth"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    let technologies = cm.technologies().await.unwrap();
    assert!(technologies.contains_key(&TechnologyType::Bluetooth));

    daemon.retract_technology("bluetooth");
    match within(events.next()).await {
        Some(ManagerEvent::TechnologyRemoved { path }) => {
            assert_eq!(path, "/net/connman/technology/bluetooth");
        }
        other => panic!("unexpected event {other:?}"),
    }
    let technologies = cm.technologies().await.unwrap();
    assert!(!technologies.contains_key(&TechnologyType::Bluetooth));
    assert!(technologies.contains_key(&TechnologyType::Wifi));

    assert_eq!(daemon.count("GetTechnologies"), enumerations);
}

#[tokio::test]
async fn unknown_technology_is_announced_but_not_registered() {
    let daemon = FakeDaemon::standard();
    let cm = manager(&daemon).await;
    let mut events = cm.events();

    daemon.announce_technology("zigbee", "ZigBee");

    match within(events.next()).await {
        Some(ManagerEvent::TechnologyAdded { technology }) => {
            assert_eq!(technology.path, "/net/connman/technology/zigbee");
            assert!(technology.technology_type().is_err());
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(cm.technologies().await.unwrap().len(), 2);

    daemon.announce_technology("cellular", "Cellular");
    match within(events.next()).await {
        Some(ManagerEvent::TechnologyAdded { technology }) => {
            assert_eq!(technology.technology_type().unwrap(), TechnologyType::Cellular);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(cm.technologies().await.unwrap().len(), 3);
}

#[tokio::test]
async fn technology_that_cannot_be_bound_is_still_announced() {
    let daemon = FakeDaemon::standard();
    daemon.make_unreachable(&technology_path("bluetooth"));
    let cm = manager(&daemon).await;
    let mut events = cm.events();

    daemon.announce_technology("bluetooth", "Bluetooth");

    match within(events.next()).await {
        Some(ManagerEvent::TechnologyAdded { technology }) => {
            assert_eq!(technology.name(), Some("Bluetooth"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    let technologies = cm.technologies().await.unwrap();
    assert!(!technologies.contains_key(&TechnologyType::Bluetooth));
    assert_eq!(technologies.len(), 2);
}

#[tokio::test]
async fn services_changed_is_re_emitted() {
    let daemon = FakeDaemon::standard();
    let cm = manager(&daemon).await;
    let mut events = cm.events();

    let path = daemon.add_service("wifi_778899_managed_psk", "wifi", "Guest", "idle");
    daemon.announce_services(&[&path], &["/net/connman/service/wifi_gone_managed_none"]);

    match within(events.next()).await {
        Some(ManagerEvent::ServicesChanged { changed, removed }) => {
            assert_eq!(changed.len(), 1);
            assert_eq!(changed[0].name(), Some("Guest"));
            assert_eq!(removed, ["/net/connman/service/wifi_gone_managed_none"]);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn missing_technology() {
    let daemon = FakeDaemon::standard();
    let cm = manager(&daemon).await;

    let err = cm.technology(TechnologyType::Cellular).await.unwrap_err();
    assert!(matches!(err, ConnmanError::TechnologyNotFound(ref t) if t == "cellular"));

    let err = cm.handle(TechnologyType::Vpn).await.unwrap_err();
    assert!(matches!(err, ConnmanError::UnsupportedServiceType(_)));
}

#[tokio::test]
async fn technology_is_bound_lazily_when_announced_late() {
    let daemon = FakeDaemon::new();
    let cm = manager(&daemon).await;
    assert!(cm.technologies().await.unwrap().is_empty());

    daemon.add_technology("wifi", "WiFi");
    let technologies = cm.technologies().await.unwrap();
    assert!(technologies.contains_key(&TechnologyType::Wifi));
}
