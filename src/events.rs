//! Load notifications
//!
//! Every call to `WasmLoader::load` ends in exactly one event: `wasm-ready`
//! when the instance is usable, `wasm-error` when anything failed. Consumers
//! subscribe an observer instead of polling the loader.

use serde::Serialize;

/// Outcome of a single load attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum LoaderEvent {
    /// The module is instantiated and its memory is available.
    #[serde(rename = "wasm-ready")]
    Ready {
        url: String,
        exports: Vec<String>,
        memory_bytes: usize,
    },
    /// Fetching, compiling or instantiating the module failed.
    #[serde(rename = "wasm-error")]
    Error { url: String, message: String },
}

impl LoaderEvent {
    /// Event name as the page scripts knew it.
    pub fn name(&self) -> &'static str {
        match self {
            LoaderEvent::Ready { .. } => "wasm-ready",
            LoaderEvent::Error { .. } => "wasm-error",
        }
    }

    pub fn url(&self) -> &str {
        match self {
            LoaderEvent::Ready { url, .. } | LoaderEvent::Error { url, .. } => url,
        }
    }

    /// Single-line JSON rendering, used by the CLI's `--events` output.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"type\":\"{}\"}}", self.name()))
    }
}

/// Receiver of loader events.
pub trait LoaderObserver: Send {
    fn on_event(&self, event: &LoaderEvent);
}

impl<F> LoaderObserver for F
where
    F: Fn(&LoaderEvent) + Send,
{
    fn on_event(&self, event: &LoaderEvent) {
        self(event)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered list of observers.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    observers: Vec<(SubscriptionId, Box<dyn LoaderObserver>)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: impl LoaderObserver + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver `event` to every observer in subscription order.
    pub fn dispatch(&self, event: &LoaderEvent) {
        tracing::debug!(target: "events", event = event.name(), url = event.url(), observers = self.observers.len(), "dispatch");
        for (_, observer) in &self.observers {
            observer.on_event(event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn ready() -> LoaderEvent {
        LoaderEvent::Ready {
            url: "lisp.wasm".to_string(),
            exports: vec!["memory".to_string(), "eval".to_string()],
            memory_bytes: 65536,
        }
    }

    #[test]
    fn dispatch_reaches_observers_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let a = seen.clone();
        bus.subscribe(move |e: &LoaderEvent| a.lock().unwrap().push(format!("a:{}", e.name())));
        let b = seen.clone();
        bus.subscribe(move |e: &LoaderEvent| b.lock().unwrap().push(format!("b:{}", e.name())));

        bus.dispatch(&ready());
        assert_eq!(*seen.lock().unwrap(), vec!["a:wasm-ready", "b:wasm-ready"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        let c = count.clone();
        let id = bus.subscribe(move |_: &LoaderEvent| *c.lock().unwrap() += 1);

        bus.dispatch(&ready());
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.dispatch(&ready());

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn json_uses_page_event_names() {
        let json: serde_json::Value = serde_json::from_str(&ready().to_json()).unwrap();
        assert_eq!(json["type"], "wasm-ready");
        assert_eq!(json["memory_bytes"], 65536);

        let err = LoaderEvent::Error {
            url: "x.wasm".to_string(),
            message: "HTTP 404".to_string(),
        };
        let json: serde_json::Value = serde_json::from_str(&err.to_json()).unwrap();
        assert_eq!(json["type"], "wasm-error");
        assert_eq!(json["message"], "HTTP 404");
    }
}
