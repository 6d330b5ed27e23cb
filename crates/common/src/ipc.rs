// IPC wire messages between the shell and attached UI surfaces
//
// One JSON object per line. A client first attaches as a named surface, then
// exchanges events with the shell.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::SurfaceName;

/// Message sent by a UI surface to the shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Bind this connection to a surface
    Attach { surface: SurfaceName },

    /// Named inbound event with an opaque payload
    Event {
        event: String,
        #[serde(default)]
        payload: Value,
    },

    /// The user asked to close the surface's window
    CloseRequested,
}

/// Message sent by the shell to an attached surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ShellMessage {
    /// Load content into the surface window
    Load {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        preload: Option<String>,
        width: u32,
        height: u32,
        frameless: bool,
        menu_bar: bool,
    },

    /// Named outbound event
    Event { event: String, payload: Value },

    /// Show or hide the window
    Visibility { visible: bool },

    /// Task bar progress, 0.0..=1.0
    Progress { fraction: f64 },

    /// The surface is gone for good
    Destroy,
}
