//! In-memory stand-in for `connmand`.
//!
//! Implements [`Bus`] and [`RemoteObject`] over shared state: objects with
//! property maps, ordered service and technology lists, a call log, injected
//! failures and per-object signal subscribers.

#![allow(dead_code)]

use async_trait::async_trait;
use connmrs::dbus::{Bus, Call, Interface, RemoteObject, Reply, Signal, SignalKind, SignalStream};
use connmrs::{ConnectionManager, ConnmanError, PropertyMap, PropertyValue, TimeoutConfig};
use futures::StreamExt;
use futures::channel::mpsc;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const MANAGER: &str = "/";
pub const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";

pub fn service_path(id: &str) -> String {
    format!("/net/connman/service/{id}")
}

pub fn technology_path(kind: &str) -> String {
    format!("/net/connman/technology/{kind}")
}

pub fn props(entries: &[(&str, PropertyValue)]) -> PropertyMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Order in which a scripted `Connect` reply and its state changes arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// State changes are emitted, then the reply is sent after a delay.
    SignalsFirst,
    /// The reply is sent, then the state changes follow after a delay.
    ReplyFirst,
}

/// What the daemon does when `Connect` is called on a service.
#[derive(Debug, Clone)]
pub struct ConnectScript {
    pub states: Vec<&'static str>,
    pub error: Option<&'static str>,
    pub order: Order,
}

impl ConnectScript {
    pub fn succeed(order: Order) -> Self {
        Self {
            states: vec!["association", "configuration", "ready", "online"],
            error: None,
            order,
        }
    }

    pub fn fail(error: &'static str, order: Order) -> Self {
        Self {
            states: vec!["association", "failure"],
            error: Some(error),
            order,
        }
    }
}

const SCRIPT_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct State {
    objects: HashMap<String, PropertyMap>,
    services: Vec<String>,
    technologies: Vec<String>,
    calls: Vec<(String, Call)>,
    failures: HashMap<(String, String), (String, String)>,
    unreachable: HashSet<String>,
    subscribers: HashMap<(String, SignalKind), Vec<mpsc::UnboundedSender<Signal>>>,
    connect_scripts: HashMap<String, ConnectScript>,
    scan_delay: Option<Duration>,
}

impl State {
    fn emit(&mut self, path: &str, signal: Signal) {
        let kind = match &signal {
            Signal::PropertyChanged { .. } => SignalKind::PropertyChanged,
            Signal::TechnologyAdded { .. } => SignalKind::TechnologyAdded,
            Signal::TechnologyRemoved { .. } => SignalKind::TechnologyRemoved,
            Signal::ServicesChanged { .. } => SignalKind::ServicesChanged,
        };
        if let Some(subscribers) = self.subscribers.get_mut(&(path.to_string(), kind)) {
            subscribers.retain(|tx| tx.unbounded_send(signal.clone()).is_ok());
        }
    }

    fn store(&mut self, path: &str, name: &str, value: PropertyValue) {
        self.objects
            .entry(path.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    fn update(&mut self, path: &str, name: &str, value: PropertyValue) {
        self.store(path, name, value.clone());
        self.emit(
            path,
            Signal::PropertyChanged {
                name: name.to_string(),
                value,
            },
        );
    }

    fn listing(&self, paths: &[String]) -> Vec<(String, PropertyMap)> {
        paths
            .iter()
            .map(|p| (p.clone(), self.objects.get(p).cloned().unwrap_or_default()))
            .collect()
    }

    fn play(&mut self, path: &str, script: &ConnectScript) {
        if let Some(error) = script.error {
            self.update(path, "Error", error.into());
        }
        for state in &script.states {
            self.update(path, "State", (*state).into());
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeDaemon {
    state: Arc<Mutex<State>>,
}

impl FakeDaemon {
    pub fn new() -> Self {
        let daemon = Self::default();
        daemon.with_state(|s| {
            s.objects.insert(
                MANAGER.to_string(),
                props(&[("State", "idle".into()), ("OfflineMode", false.into())]),
            );
        });
        daemon
    }

    /// Ethernet and Wi-Fi technologies with one wired and two Wi-Fi services.
    pub fn standard() -> Self {
        let daemon = Self::new();
        daemon.add_technology("ethernet", "Wired");
        daemon.add_technology("wifi", "WiFi");
        daemon.add_service("ethernet_080027_cable", "ethernet", "Wired", "online");
        daemon.add_service("wifi_112233_436f66666565_managed_psk", "wifi", "CoffeeShop", "idle");
        daemon.add_service("wifi_445566_4c696272617279_managed_none", "wifi", "Library", "ready");
        daemon
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut guard = self.state.lock().unwrap();
        f(&mut guard)
    }

    pub fn bus(&self) -> Arc<dyn Bus> {
        Arc::new(self.clone())
    }

    fn technology_props(kind: &str, name: &str) -> PropertyMap {
        props(&[
            ("Name", name.into()),
            ("Type", kind.into()),
            ("Powered", true.into()),
            ("Connected", false.into()),
            ("Tethering", false.into()),
        ])
    }

    pub fn add_technology(&self, kind: &str, name: &str) -> String {
        let path = technology_path(kind);
        self.with_state(|s| {
            s.objects
                .insert(path.clone(), Self::technology_props(kind, name));
            s.technologies.push(path.clone());
        });
        path
    }

    pub fn add_service(&self, id: &str, kind: &str, name: &str, state: &str) -> String {
        let path = service_path(id);
        self.with_state(|s| {
            s.objects.insert(
                path.clone(),
                props(&[
                    ("Name", name.into()),
                    ("Type", kind.into()),
                    ("State", state.into()),
                    ("Security", vec!["psk".to_string()].into()),
                    ("Favorite", false.into()),
                    ("AutoConnect", false.into()),
                ]),
            );
            s.services.push(path.clone());
        });
        path
    }

    pub fn set_interface(&self, path: &str, interface: &str) {
        let ethernet = props(&[("Interface", interface.into())]);
        self.with_state(|s| s.store(path, "Ethernet", ethernet.into()));
    }

    /// Changes a property without emitting a signal.
    pub fn set(&self, path: &str, name: &str, value: impl Into<PropertyValue>) {
        self.with_state(|s| s.store(path, name, value.into()));
    }

    /// Changes a property and emits `PropertyChanged` on the object.
    pub fn emit_property(&self, path: &str, name: &str, value: impl Into<PropertyValue>) {
        self.with_state(|s| s.update(path, name, value.into()));
    }

    pub fn property(&self, path: &str, name: &str) -> Option<PropertyValue> {
        self.with_state(|s| s.objects.get(path).and_then(|p| p.get(name)).cloned())
    }

    /// Makes calls of `key` (a method name, or a property name for
    /// `SetProperty`) on `path` fail with the given daemon error.
    pub fn fail(&self, path: &str, key: &str, name: &str, message: &str) {
        self.with_state(|s| {
            s.failures.insert(
                (path.to_string(), key.to_string()),
                (name.to_string(), message.to_string()),
            );
        });
    }

    pub fn make_unreachable(&self, path: &str) {
        self.with_state(|s| {
            s.unreachable.insert(path.to_string());
        });
    }

    pub fn on_connect(&self, path: &str, script: ConnectScript) {
        self.with_state(|s| {
            s.connect_scripts.insert(path.to_string(), script);
        });
    }

    pub fn set_scan_delay(&self, delay: Duration) {
        self.with_state(|s| s.scan_delay = Some(delay));
    }

    /// Adds a technology and announces it with `TechnologyAdded`.
    pub fn announce_technology(&self, kind: &str, name: &str) -> String {
        let path = self.add_technology(kind, name);
        self.with_state(|s| {
            let properties = s.objects.get(&path).cloned().unwrap_or_default();
            s.emit(
                MANAGER,
                Signal::TechnologyAdded {
                    path: path.clone(),
                    properties,
                },
            );
        });
        path
    }

    /// Removes a technology and announces it with `TechnologyRemoved`.
    pub fn retract_technology(&self, kind: &str) {
        let path = technology_path(kind);
        self.with_state(|s| {
            s.technologies.retain(|p| *p != path);
            s.objects.remove(&path);
            s.emit(MANAGER, Signal::TechnologyRemoved { path: path.clone() });
        });
    }

    pub fn announce_services(&self, changed: &[&str], removed: &[&str]) {
        self.with_state(|s| {
            let changed = changed
                .iter()
                .map(|p| (p.to_string(), s.objects.get(*p).cloned().unwrap_or_default()))
                .collect();
            let removed = removed.iter().map(|p| p.to_string()).collect();
            s.emit(MANAGER, Signal::ServicesChanged { changed, removed });
        });
    }

    pub fn calls(&self) -> Vec<(String, Call)> {
        self.with_state(|s| s.calls.clone())
    }

    /// Number of calls of `method` on any object.
    pub fn count(&self, method: &str) -> usize {
        self.with_state(|s| {
            s.calls
                .iter()
                .filter(|(_, call)| call.method_name() == method)
                .count()
        })
    }

    /// Names passed to `SetProperty` on `path`, in call order.
    pub fn properties_set(&self, path: &str) -> Vec<String> {
        self.with_state(|s| {
            s.calls
                .iter()
                .filter(|(p, _)| p == path)
                .filter_map(|(_, call)| match call {
                    Call::SetProperty(name, _) => Some(name.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    /// Value passed in the last `SetProperty(name)` on `path`.
    pub fn last_set(&self, path: &str, name: &str) -> Option<PropertyValue> {
        self.with_state(|s| {
            s.calls.iter().rev().find_map(|(p, call)| match call {
                Call::SetProperty(n, value) if p == path && n == name => Some(value.clone()),
                _ => None,
            })
        })
    }

    fn handle(&self, path: &str, call: Call) -> (connmrs::Result<Reply>, Option<Duration>) {
        self.with_state(|s| {
            s.calls.push((path.to_string(), call.clone()));

            let key = match &call {
                Call::SetProperty(name, _) => name.clone(),
                other => other.method_name().to_string(),
            };
            if let Some((name, message)) = s.failures.get(&(path.to_string(), key)) {
                return (
                    Err(ConnmanError::Remote {
                        name: name.clone(),
                        message: message.clone(),
                    }),
                    None,
                );
            }

            match call {
                Call::GetProperties => match s.objects.get(path) {
                    Some(props) => (Ok(Reply::Properties(props.clone())), None),
                    None => (
                        Err(ConnmanError::Remote {
                            name: "org.freedesktop.DBus.Error.UnknownObject".into(),
                            message: format!("no object at {path}"),
                        }),
                        None,
                    ),
                },
                Call::SetProperty(name, value) => {
                    s.update(path, &name, value);
                    (Ok(Reply::Unit), None)
                }
                Call::GetServices => (Ok(Reply::Objects(s.listing(&s.services))), None),
                Call::GetTechnologies => (Ok(Reply::Objects(s.listing(&s.technologies))), None),
                Call::Scan => (Ok(Reply::Unit), s.scan_delay),
                Call::Connect => match s.connect_scripts.get(path).cloned() {
                    Some(script) if script.order == Order::SignalsFirst => {
                        s.play(path, &script);
                        (Ok(Reply::Unit), Some(SCRIPT_DELAY))
                    }
                    Some(script) => {
                        let daemon = self.clone();
                        let path = path.to_string();
                        tokio::spawn(async move {
                            tokio::time::sleep(SCRIPT_DELAY).await;
                            daemon.with_state(|s| s.play(&path, &script));
                        });
                        (Ok(Reply::Unit), None)
                    }
                    None => (Ok(Reply::Unit), None),
                },
                Call::Disconnect => {
                    s.update(path, "State", "idle".into());
                    (Ok(Reply::Unit), None)
                }
                Call::Remove => {
                    s.update(path, "Favorite", false.into());
                    (Ok(Reply::Unit), None)
                }
            }
        })
    }
}

#[async_trait]
impl Bus for FakeDaemon {
    async fn object(&self, path: &str, _interface: Interface) -> connmrs::Result<Arc<dyn RemoteObject>> {
        if self.with_state(|s| s.unreachable.contains(path)) {
            return Err(ConnmanError::Remote {
                name: SERVICE_UNKNOWN.into(),
                message: format!("The name net.connman was not provided ({path})"),
            });
        }
        Ok(Arc::new(FakeObject {
            path: path.to_string(),
            daemon: self.clone(),
        }))
    }
}

#[derive(Debug)]
struct FakeObject {
    path: String,
    daemon: FakeDaemon,
}

#[async_trait]
impl RemoteObject for FakeObject {
    fn path(&self) -> &str {
        &self.path
    }

    async fn invoke(&self, call: Call, _timeout: Duration) -> connmrs::Result<Reply> {
        let (reply, delay) = self.daemon.handle(&self.path, call);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        reply
    }

    async fn subscribe(&self, kind: SignalKind) -> connmrs::Result<SignalStream> {
        let (tx, rx) = mpsc::unbounded();
        self.daemon.with_state(|s| {
            s.subscribers
                .entry((self.path.clone(), kind))
                .or_default()
                .push(tx);
        });
        Ok(rx.boxed())
    }
}

pub fn timeouts() -> TimeoutConfig {
    TimeoutConfig::new()
        .with_default_timeout(Duration::from_secs(1))
        .with_scan_timeout(Duration::from_secs(1))
        .with_connect_timeout(Duration::from_secs(2))
}

pub async fn manager(daemon: &FakeDaemon) -> ConnectionManager {
    ConnectionManager::with_bus(daemon.bus(), timeouts())
        .await
        .expect("manager initializes")
}

/// Awaits `fut`, failing the test after two seconds.
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(2), fut)
        .await
        .expect("timed out")
}
