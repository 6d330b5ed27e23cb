// Test doubles shared by the unit tests of this crate

use freedata_common::{ConfigSnapshot, SurfaceName};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::events::OutboundEvent;
use crate::monitor::{Connector, SocketHandle};
use crate::registry::{
    SurfaceBackend, SurfaceError, SurfaceFactory, SurfaceSpec, WindowRegistry,
};
use crate::supervisor::{ProcessSweeper, SweepCommand};

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Created(SurfaceName),
    Loaded(SurfaceName, String),
    Delivered(SurfaceName, String, Value),
    Visible(SurfaceName, bool),
    Progress(SurfaceName, f64),
    Destroyed(SurfaceName),
}

#[derive(Default)]
struct Inner {
    records: Vec<Record>,
    failing: HashSet<SurfaceName>,
}

/// Shared log of everything the fake backends saw
#[derive(Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<Inner>>,
}

impl Recorder {
    pub fn factory(&self) -> Box<dyn SurfaceFactory> {
        Box::new(RecordingFactory {
            recorder: self.clone(),
        })
    }

    pub fn records(&self) -> Vec<Record> {
        self.inner.lock().unwrap().records.clone()
    }

    pub fn delivered(&self) -> Vec<(SurfaceName, String, Value)> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                Record::Delivered(name, event, payload) => Some((name, event, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn delivered_to(&self, target: SurfaceName) -> Vec<(String, Value)> {
        self.delivered()
            .into_iter()
            .filter(|(name, _, _)| *name == target)
            .map(|(_, event, payload)| (event, payload))
            .collect()
    }

    pub fn created_count(&self, name: SurfaceName) -> usize {
        self.records()
            .iter()
            .filter(|r| **r == Record::Created(name))
            .count()
    }

    pub fn destroyed_count(&self, name: SurfaceName) -> usize {
        self.records()
            .iter()
            .filter(|r| **r == Record::Destroyed(name))
            .count()
    }

    pub fn last_visibility(&self, name: SurfaceName) -> Option<bool> {
        self.records().iter().rev().find_map(|r| match r {
            Record::Visible(n, visible) if *n == name => Some(*visible),
            _ => None,
        })
    }

    /// Make every later delivery to `name` fail
    pub fn fail_deliveries_to(&self, name: SurfaceName) {
        self.inner.lock().unwrap().failing.insert(name);
    }

    fn push(&self, record: Record) {
        self.inner.lock().unwrap().records.push(record);
    }

    fn is_failing(&self, name: SurfaceName) -> bool {
        self.inner.lock().unwrap().failing.contains(&name)
    }
}

struct RecordingFactory {
    recorder: Recorder,
}

impl SurfaceFactory for RecordingFactory {
    fn create(&mut self, spec: &SurfaceSpec) -> Result<Box<dyn SurfaceBackend>, SurfaceError> {
        self.recorder.push(Record::Created(spec.name));
        Ok(Box::new(RecordingBackend {
            name: spec.name,
            recorder: self.recorder.clone(),
        }))
    }
}

struct RecordingBackend {
    name: SurfaceName,
    recorder: Recorder,
}

impl SurfaceBackend for RecordingBackend {
    fn load(&mut self, spec: &SurfaceSpec) -> Result<(), SurfaceError> {
        self.recorder
            .push(Record::Loaded(self.name, spec.content.clone()));
        Ok(())
    }

    fn deliver(&mut self, event: &OutboundEvent) -> Result<(), SurfaceError> {
        if self.recorder.is_failing(self.name) {
            return Err(SurfaceError::Closed(self.name));
        }
        self.recorder.push(Record::Delivered(
            self.name,
            event.name.clone(),
            event.payload.clone(),
        ));
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) -> Result<(), SurfaceError> {
        self.recorder.push(Record::Visible(self.name, visible));
        Ok(())
    }

    fn set_progress(&mut self, fraction: f64) -> Result<(), SurfaceError> {
        self.recorder.push(Record::Progress(self.name, fraction));
        Ok(())
    }

    fn destroy(&mut self) {
        self.recorder.push(Record::Destroyed(self.name));
    }
}

/// Registry with main/chat/log/mesh created hidden
pub fn registry_with_primaries(recorder: &Recorder) -> WindowRegistry {
    let mut registry = WindowRegistry::new(recorder.factory());
    for spec in SurfaceSpec::defaults(&ConfigSnapshot::default()) {
        if spec.name != SurfaceName::Splash {
            registry.create(spec).unwrap();
        }
    }
    registry
}

/// Sweeper that only records what it was asked to run
#[derive(Clone, Default)]
pub struct RecordingSweeper {
    pub commands: Arc<Mutex<Vec<SweepCommand>>>,
    pub fail: bool,
}

impl RecordingSweeper {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn commands(&self) -> Vec<SweepCommand> {
        self.commands.lock().unwrap().clone()
    }
}

impl ProcessSweeper for RecordingSweeper {
    fn sweep(&self, command: &SweepCommand) -> std::io::Result<()> {
        self.commands.lock().unwrap().push(command.clone());
        if self.fail {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no pkill"))
        } else {
            Ok(())
        }
    }
}

/// Connector that records open calls and never reports anything
#[derive(Clone, Default)]
pub struct RecordingConnector {
    pub opened: Arc<Mutex<Vec<(u64, String, u16)>>>,
}

impl RecordingConnector {
    pub fn opened(&self) -> Vec<(u64, String, u16)> {
        self.opened.lock().unwrap().clone()
    }
}

impl Connector for RecordingConnector {
    fn open(&mut self, socket_id: u64, host: &str, port: u16) -> SocketHandle {
        self.opened
            .lock()
            .unwrap()
            .push((socket_id, host.to_string(), port));
        SocketHandle::detached()
    }
}
