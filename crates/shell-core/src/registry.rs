// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 FreeDATA Shell Contributors

//! Window registry
//!
//! Holds every named surface the shell created. The registry owns lifetime
//! and visibility; the actual window lives behind a [`SurfaceBackend`] the
//! host provides through a [`SurfaceFactory`].

use freedata_common::{ConfigSnapshot, SurfaceName};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::OutboundEvent;

/// Failure reported by a surface backend
#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("Surface {0} has no attached client")]
    Detached(SurfaceName),

    #[error("Surface {0} is closed")]
    Closed(SurfaceName),

    #[error("Surface backend error: {0}")]
    Backend(String),
}

/// What happens when the user closes a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosePolicy {
    /// Keep the surface alive and just hide it
    HideOnClose,
    /// Closing the surface tears the application down
    DestroyOnClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Shown,
    Hidden,
}

/// Window size and chrome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub frameless: bool,
}

impl Geometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frameless: false,
        }
    }
}

/// Everything needed to create one surface
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSpec {
    pub name: SurfaceName,
    pub geometry: Geometry,
    /// Page loaded into the surface
    pub content: String,
    /// Bridge script injected before the content
    pub preload: Option<String>,
    pub close_policy: ClosePolicy,
    /// Initial visibility
    pub visible: bool,
}

impl SurfaceSpec {
    /// Specs for the splash and the four primary surfaces.
    ///
    /// The main surface takes its size from the user config.
    pub fn defaults(config: &ConfigSnapshot) -> Vec<SurfaceSpec> {
        let main_width = config.get_u64("screen_width").unwrap_or(1050) as u32;
        let main_height = config.get_u64("screen_height").unwrap_or(430) as u32;

        vec![
            SurfaceSpec {
                name: SurfaceName::Splash,
                geometry: Geometry {
                    width: 250,
                    height: 250,
                    frameless: true,
                },
                content: "src/splash.html".to_string(),
                preload: None,
                close_policy: ClosePolicy::DestroyOnClose,
                visible: true,
            },
            SurfaceSpec {
                name: SurfaceName::Main,
                geometry: Geometry::new(main_width, main_height),
                content: "src/index.html".to_string(),
                preload: Some("preload-main.js".to_string()),
                close_policy: ClosePolicy::DestroyOnClose,
                visible: false,
            },
            SurfaceSpec {
                name: SurfaceName::Chat,
                geometry: Geometry::new(1000, 600),
                content: "src/chat-module.html".to_string(),
                preload: Some("preload-chat.js".to_string()),
                close_policy: ClosePolicy::HideOnClose,
                visible: false,
            },
            SurfaceSpec {
                name: SurfaceName::Log,
                geometry: Geometry::new(600, 900),
                content: "src/log-module.html".to_string(),
                preload: Some("preload-log.js".to_string()),
                close_policy: ClosePolicy::HideOnClose,
                visible: false,
            },
            SurfaceSpec {
                name: SurfaceName::Mesh,
                geometry: Geometry::new(600, 900),
                content: "src/mesh-module.html".to_string(),
                preload: Some("preload-mesh.js".to_string()),
                close_policy: ClosePolicy::HideOnClose,
                visible: false,
            },
        ]
    }
}

/// Host-side window implementation
pub trait SurfaceBackend {
    /// Load content and configure chrome (menu bar hidden)
    fn load(&mut self, spec: &SurfaceSpec) -> Result<(), SurfaceError>;

    /// Deliver one event
    fn deliver(&mut self, event: &OutboundEvent) -> Result<(), SurfaceError>;

    fn set_visible(&mut self, visible: bool) -> Result<(), SurfaceError>;

    /// Task bar progress; surfaces without one ignore it
    fn set_progress(&mut self, _fraction: f64) -> Result<(), SurfaceError> {
        Ok(())
    }

    /// Tear the window down; called exactly once
    fn destroy(&mut self);
}

/// Creates backends for new surfaces
pub trait SurfaceFactory {
    fn create(&mut self, spec: &SurfaceSpec) -> Result<Box<dyn SurfaceBackend>, SurfaceError>;
}

/// Result of a user close request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Hide-on-close surface was hidden
    Hidden,
    /// Destroy-on-close surface: the caller must run shutdown
    Teardown,
    /// No such surface
    Absent,
}

struct Surface {
    spec: SurfaceSpec,
    instance: u64,
    visibility: Visibility,
    backend: Box<dyn SurfaceBackend>,
}

/// Named surfaces, created at startup and destroyed at shutdown
pub struct WindowRegistry {
    factory: Box<dyn SurfaceFactory>,
    surfaces: HashMap<SurfaceName, Surface>,
    next_instance: u64,
}

impl WindowRegistry {
    pub fn new(factory: Box<dyn SurfaceFactory>) -> Self {
        Self {
            factory,
            surfaces: HashMap::new(),
            next_instance: 1,
        }
    }

    /// Create a surface and load its content.
    ///
    /// Creating a name that already exists returns the existing instance.
    pub fn create(&mut self, spec: SurfaceSpec) -> Result<u64, SurfaceError> {
        if let Some(existing) = self.surfaces.get(&spec.name) {
            warn!("Surface {} already exists, keeping it", spec.name);
            return Ok(existing.instance);
        }

        let mut backend = self.factory.create(&spec)?;
        backend.load(&spec)?;

        let visibility = if spec.visible {
            Visibility::Shown
        } else {
            Visibility::Hidden
        };
        if let Err(e) = backend.set_visible(spec.visible) {
            debug!("Initial visibility for {} not applied: {}", spec.name, e);
        }

        let instance = self.next_instance;
        self.next_instance += 1;
        info!(
            "Created surface {} ({}x{}, {:?})",
            spec.name, spec.geometry.width, spec.geometry.height, spec.close_policy
        );

        self.surfaces.insert(
            spec.name,
            Surface {
                spec,
                instance,
                visibility,
                backend,
            },
        );
        Ok(instance)
    }

    /// Deliver to one surface; missing surfaces and delivery failures are dropped
    pub fn send(&mut self, name: SurfaceName, event: &OutboundEvent) -> bool {
        let Some(surface) = self.surfaces.get_mut(&name) else {
            debug!("Dropping {} for missing surface {}", event.name, name);
            return false;
        };

        match surface.backend.deliver(event) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropping {} for {}: {}", event.name, name, e);
                false
            }
        }
    }

    /// Deliver to each listed surface independently; returns the delivered count
    pub fn broadcast(&mut self, names: &[SurfaceName], event: &OutboundEvent) -> usize {
        names
            .iter()
            .filter(|name| self.send(**name, event))
            .count()
    }

    pub fn show(&mut self, name: SurfaceName) -> bool {
        self.set_visibility(name, Visibility::Shown)
    }

    pub fn hide(&mut self, name: SurfaceName) -> bool {
        self.set_visibility(name, Visibility::Hidden)
    }

    fn set_visibility(&mut self, name: SurfaceName, visibility: Visibility) -> bool {
        let Some(surface) = self.surfaces.get_mut(&name) else {
            debug!("Cannot change visibility of missing surface {}", name);
            return false;
        };

        surface.visibility = visibility;
        if let Err(e) = surface
            .backend
            .set_visible(visibility == Visibility::Shown)
        {
            debug!("Visibility change for {} not delivered: {}", name, e);
        }
        true
    }

    /// Task bar progress for a surface, `fraction` clamped to 0..=1
    pub fn set_progress(&mut self, name: SurfaceName, fraction: f64) -> bool {
        let Some(surface) = self.surfaces.get_mut(&name) else {
            return false;
        };
        match surface.backend.set_progress(fraction.clamp(0.0, 1.0)) {
            Ok(()) => true,
            Err(e) => {
                debug!("Progress for {} not delivered: {}", name, e);
                false
            }
        }
    }

    /// Apply the close policy for a user close request
    pub fn request_close(&mut self, name: SurfaceName) -> CloseOutcome {
        let policy = match self.surfaces.get(&name) {
            Some(surface) => surface.spec.close_policy,
            None => return CloseOutcome::Absent,
        };

        match policy {
            ClosePolicy::HideOnClose => {
                self.hide(name);
                CloseOutcome::Hidden
            }
            ClosePolicy::DestroyOnClose => CloseOutcome::Teardown,
        }
    }

    /// Destroy one surface regardless of its close policy
    pub fn destroy(&mut self, name: SurfaceName) -> bool {
        match self.surfaces.remove(&name) {
            Some(mut surface) => {
                surface.backend.destroy();
                info!("Destroyed surface {}", name);
                true
            }
            None => false,
        }
    }

    /// Destroy every surface; returns how many were destroyed
    pub fn destroy_all(&mut self) -> usize {
        let names: Vec<SurfaceName> = self.surfaces.keys().copied().collect();
        names.into_iter().filter(|name| self.destroy(*name)).count()
    }

    pub fn contains(&self, name: SurfaceName) -> bool {
        self.surfaces.contains_key(&name)
    }

    pub fn is_visible(&self, name: SurfaceName) -> bool {
        self.surfaces
            .get(&name)
            .is_some_and(|s| s.visibility == Visibility::Shown)
    }

    /// Identity of the current surface object, stable across hide/show
    pub fn instance_id(&self, name: SurfaceName) -> Option<u64> {
        self.surfaces.get(&name).map(|s| s.instance)
    }

    pub fn spec(&self, name: SurfaceName) -> Option<&SurfaceSpec> {
        self.surfaces.get(&name).map(|s| &s.spec)
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}
