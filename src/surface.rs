//! Host-provided drawing surface

use tokio::sync::mpsc;

use crate::models::Frame;

/// A mounted drawing surface with known pixel dimensions
///
/// The widget owns its surface exclusively. After teardown it makes no further calls.
pub trait Surface: Send {
    /// Current size in pixels as (width, height)
    fn size(&self) -> (u32, u32);

    /// Remove everything previously presented
    fn clear(&mut self);

    /// Show a complete frame, replacing the previous one
    fn present(&mut self, frame: Frame);

    /// Start delivering resize notifications; `None` when the host never resizes
    fn subscribe_resize(&mut self) -> Option<mpsc::UnboundedReceiver<(u32, u32)>> {
        None
    }

    /// Stop delivering resize notifications
    fn unsubscribe_resize(&mut self) {}
}
