#![cfg(test)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{span, Subscriber};
use tracing_core::field::{Field, Visit};
use tracing_subscriber::registry;
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

#[derive(Default, Debug)]
pub struct SpanData {
    pub name: String,
    pub fields: Mutex<HashMap<String, String>>, // stringified values
}

impl SpanData {
    pub fn field(&self, key: &str) -> Option<String> {
        self.fields.lock().unwrap().get(key).cloned()
    }
}

#[derive(Default, Debug)]
pub struct SpanStore {
    pub spans: Mutex<Vec<(span::Id, Arc<SpanData>)>>,
    // `message` field of every event, in order
    pub events: Mutex<Vec<String>>,
}

impl SpanStore {
    /// Every captured span with `name`, in creation order.
    pub fn named(&self, name: &str) -> Vec<Arc<SpanData>> {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, d)| d.name == name)
            .map(|(_, d)| d.clone())
            .collect()
    }

    pub fn logged(&self, message: &str) -> bool {
        self.events.lock().unwrap().iter().any(|m| m == message)
    }

    fn get(&self, id: &span::Id) -> Option<Arc<SpanData>> {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(sid, _)| sid == id)
            .map(|(_, d)| d.clone())
    }
}

struct MapVisitor<'a> {
    map: &'a mut HashMap<String, String>,
}

impl Visit for MapVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn core::fmt::Debug) {
        self.map.insert(field.name().to_string(), format!("{value:?}"));
    }
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
    fn record_str(&mut self, field: &Field, value: &str) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
}

#[derive(Clone)]
pub struct CaptureLayer {
    pub store: Arc<SpanStore>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, _ctx: Context<'_, S>) {
        let data = Arc::new(SpanData {
            name: attrs.metadata().name().to_string(),
            ..Default::default()
        });
        attrs.record(&mut MapVisitor {
            map: &mut data.fields.lock().unwrap(),
        });
        self.store.spans.lock().unwrap().push((id.clone(), data));
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, _ctx: Context<'_, S>) {
        if let Some(data) = self.store.get(id) {
            values.record(&mut MapVisitor {
                map: &mut data.fields.lock().unwrap(),
            });
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut MapVisitor { map: &mut fields });
        if let Some(message) = fields.remove("message") {
            self.store.events.lock().unwrap().push(message);
        }
    }
}

static GUARDS: once_cell::sync::Lazy<Mutex<Vec<tracing::subscriber::DefaultGuard>>> =
    once_cell::sync::Lazy::new(|| Mutex::new(Vec::new()));

/// Route this thread's spans and events into a fresh store.
pub fn install_capture() -> Arc<SpanStore> {
    use tracing_subscriber::prelude::*;
    let store = Arc::new(SpanStore::default());
    let layer = CaptureLayer { store: store.clone() };
    let subscriber = registry::Registry::default().with(layer);
    let guard = tracing::subscriber::set_default(subscriber);
    GUARDS.lock().unwrap().push(guard);
    store
}
