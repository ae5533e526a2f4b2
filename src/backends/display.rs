// SPDX-License-Identifier: GPL-3.0-only

//! Keep-display-awake lock
//!
//! While the camera preview runs the screen must not blank. On freedesktop
//! systems this is an `Inhibit` call on `org.freedesktop.ScreenSaver`, which
//! returns a cookie that is handed back to `UnInhibit` on release.

use super::camera::{BackendError, BackendResult};
use crate::constants::app;
use tracing::{debug, info, warn};

/// Display-awake request
///
/// `request_release` must be a no-op when nothing is held.
pub trait DisplayRequest: Send {
    /// Prevent the display from sleeping
    fn request_active(&mut self) -> BackendResult<()>;

    /// Allow the display to sleep again
    fn request_release(&mut self);

    /// Whether a request is currently held
    fn is_active(&self) -> bool;
}

/// Display request that does nothing (headless use, tests)
#[derive(Debug, Default)]
pub struct NoopDisplayRequest {
    active: bool,
}

impl DisplayRequest for NoopDisplayRequest {
    fn request_active(&mut self) -> BackendResult<()> {
        self.active = true;
        Ok(())
    }

    fn request_release(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

const SCREENSAVER_SERVICE: &str = "org.freedesktop.ScreenSaver";
const SCREENSAVER_PATH: &str = "/org/freedesktop/ScreenSaver";
const SCREENSAVER_INTERFACE: &str = "org.freedesktop.ScreenSaver";

/// Screensaver inhibitor over the session D-Bus
pub struct ScreenSaverInhibitor {
    connection: Option<zbus::blocking::Connection>,
    cookie: Option<u32>,
}

impl Default for ScreenSaverInhibitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenSaverInhibitor {
    /// Create an inhibitor. The bus connection is opened lazily.
    pub fn new() -> Self {
        Self {
            connection: None,
            cookie: None,
        }
    }

    fn proxy(&mut self) -> BackendResult<zbus::blocking::Proxy<'static>> {
        let connection = match &self.connection {
            Some(conn) => conn.clone(),
            None => {
                let conn = zbus::blocking::Connection::session().map_err(|e| {
                    BackendError::NotAvailable(format!("Failed to connect to session D-Bus: {}", e))
                })?;
                self.connection = Some(conn.clone());
                conn
            }
        };

        zbus::blocking::Proxy::new(
            &connection,
            SCREENSAVER_SERVICE,
            SCREENSAVER_PATH,
            SCREENSAVER_INTERFACE,
        )
        .map_err(|e| BackendError::NotAvailable(format!("Failed to create ScreenSaver proxy: {}", e)))
    }
}

impl DisplayRequest for ScreenSaverInhibitor {
    fn request_active(&mut self) -> BackendResult<()> {
        if self.cookie.is_some() {
            return Ok(());
        }

        let proxy = self.proxy()?;
        let cookie: u32 = proxy
            .call("Inhibit", &(app::APP_NAME, app::INHIBIT_REASON))
            .map_err(|e| BackendError::Other(format!("Inhibit failed: {}", e)))?;

        info!(cookie, "Display sleep inhibited");
        self.cookie = Some(cookie);
        Ok(())
    }

    fn request_release(&mut self) {
        let Some(cookie) = self.cookie.take() else {
            return;
        };

        let result = self.proxy().and_then(|proxy| {
            proxy
                .call::<_, _, ()>("UnInhibit", &(cookie,))
                .map_err(|e| BackendError::Other(e.to_string()))
        });

        match result {
            Ok(()) => debug!(cookie, "Display sleep inhibit released"),
            Err(e) => warn!(cookie, error = %e, "Failed to release display inhibit"),
        }
    }

    fn is_active(&self) -> bool {
        self.cookie.is_some()
    }
}

impl Drop for ScreenSaverInhibitor {
    fn drop(&mut self) {
        self.request_release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_request_tracks_state() {
        let mut request = NoopDisplayRequest::default();
        assert!(!request.is_active());
        request.request_active().unwrap();
        assert!(request.is_active());
        request.request_release();
        request.request_release();
        assert!(!request.is_active());
    }

    #[test]
    fn test_inhibitor_release_without_request_is_noop() {
        let mut inhibitor = ScreenSaverInhibitor::new();
        inhibitor.request_release();
        assert!(!inhibitor.is_active());
        assert!(inhibitor.connection.is_none());
    }
}
