//! Progress events emitted while a run is in flight

use serde::{Deserialize, Serialize};

/// Which side of the comparison a graph belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphRole {
    Obfuscated,
    Clean,
}

impl std::fmt::Display for GraphRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphRole::Obfuscated => write!(f, "obfuscated"),
            GraphRole::Clean => write!(f, "clean"),
        }
    }
}

/// Run events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LookupEvent {
    GraphLoading {
        role: GraphRole,
        current: usize,
        total: usize,
    },
    TypeMatched {
        clean: String,
        obfuscated: String,
        score: Option<f32>,
    },
    FieldsTranslated {
        type_name: String,
        count: usize,
    },
    ExportProgress {
        current: usize,
        total: usize,
    },
    Status(String),
}

impl std::fmt::Display for LookupEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupEvent::GraphLoading {
                role,
                current,
                total,
            } => write!(f, "Loaded {current}/{total} {role} types"),
            LookupEvent::TypeMatched {
                clean, obfuscated, ..
            } => write!(f, "Matched {obfuscated} -> {clean}"),
            LookupEvent::FieldsTranslated { type_name, count } => {
                write!(f, "Translated {count} fields of {type_name}")
            }
            LookupEvent::ExportProgress { current, total } => {
                write!(f, "Exported {current}/{total} classes")
            }
            LookupEvent::Status(message) => f.write_str(message),
        }
    }
}

/// Event bus for broadcasting events
pub struct EventBus {
    subscribers: Vec<Box<dyn Fn(&LookupEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: Fn(&LookupEvent) + Send + Sync + 'static,
    {
        self.subscribers.push(Box::new(callback));
    }

    pub fn emit(&self, event: LookupEvent) {
        for subscriber in &self.subscribers {
            subscriber(&event);
        }
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(LookupEvent::Status(message.into()));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Emit through an optional bus
pub fn emit(bus: Option<&EventBus>, event: impl FnOnce() -> LookupEvent) {
    if let Some(bus) = bus {
        bus.emit(event());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_subscribers_receive_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut bus = EventBus::new();
        bus.subscribe(move |event| sink.lock().unwrap().push(event.to_string()));
        bus.status("Deobfuscating binary");
        bus.emit(LookupEvent::GraphLoading {
            role: GraphRole::Clean,
            current: 1,
            total: 4,
        });

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                "Deobfuscating binary".to_string(),
                "Loaded 1/4 clean types".to_string()
            ]
        );
    }

    #[test]
    fn test_emit_without_bus_is_noop() {
        emit(None, || panic!("event must not be built without a bus"));
    }
}
