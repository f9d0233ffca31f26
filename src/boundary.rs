//! Fixed-buffer call surface
//!
//! Mirrors the status-code interface external callers are generated against:
//! every call returns `0` (or a byte length) on success and `-1` on failure,
//! and the text of the most recent failure is kept in a single slot.
//!
//! Variable-length results use the two-pass protocol: call once without a
//! buffer to get the byte length, then again with a buffer of at least
//! `len + 1` bytes, which receives the text and a NUL terminator.

use std::fmt::Display;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use mycelia_core::PhysicsRecord;
use tracing::debug;

use crate::config::EngineConfig;
use crate::engine::CatalogEngine;
use crate::error::EngineError;

pub const STATUS_OK: i32 = 0;
pub const STATUS_ERROR: i32 = -1;

/// Fixed-layout physics record: six floats and a presence flag.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NativePhysics {
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
    pub drag: f32,
    pub gravity_scale: f32,
    pub spacing: f32,
    /// 1 when the token declares physics, 0 otherwise (all fields then 0)
    pub has_values: i32,
}

impl From<Option<PhysicsRecord>> for NativePhysics {
    fn from(record: Option<PhysicsRecord>) -> Self {
        match record {
            Some(r) => Self {
                mass: r.mass,
                friction: r.friction,
                restitution: r.restitution,
                drag: r.drag,
                gravity_scale: r.gravity_scale,
                spacing: r.spacing,
                has_values: 1,
            },
            None => Self::default(),
        }
    }
}

/// Engine instance behind the status-code interface.
#[derive(Debug, Default)]
pub struct CatalogHandle {
    engine: CatalogEngine,
    last_error: Mutex<String>,
}

impl CatalogHandle {
    /// Empty handle; every read fails until a catalog is loaded.
    pub fn create() -> Self {
        Self::default()
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            engine: CatalogEngine::new(config),
            last_error: Mutex::new(String::new()),
        }
    }

    pub fn engine(&self) -> &CatalogEngine {
        &self.engine
    }

    pub fn load_catalog(&self, source: &[u8], strict: bool) -> i32 {
        let result = self.engine.load(source, strict).map(|_| STATUS_OK);
        self.status(result)
    }

    pub fn load_catalog_from_path(&self, path: impl AsRef<Path>, strict: bool) -> i32 {
        let result = self
            .engine
            .load_path(path.as_ref(), strict)
            .map(|_| STATUS_OK);
        self.status(result)
    }

    pub fn resolve_and_render(&self, token: &str, args: &[&str], buffer: Option<&mut [u8]>) -> i32 {
        match self.engine.render(token, args) {
            Ok(text) => self.two_pass(&text, buffer),
            Err(e) => self.fail(e),
        }
    }

    /// Like [`Self::resolve_and_render`], with the variant picked by `count`.
    pub fn resolve_and_render_plural(
        &self,
        token: &str,
        count: i64,
        args: &[&str],
        buffer: Option<&mut [u8]>,
    ) -> i32 {
        match self.engine.render_count(token, count, args) {
            Ok(text) => self.two_pass(&text, buffer),
            Err(e) => self.fail(e),
        }
    }

    pub fn get_physics_json(&self, token: &str, args: &[&str], buffer: Option<&mut [u8]>) -> i32 {
        match self.engine.physics_json(token, args) {
            Ok(text) => self.two_pass(&text, buffer),
            Err(e) => self.fail(e),
        }
    }

    /// Single pass. A known token without physics succeeds with
    /// `has_values == 0`; an unknown token fails.
    pub fn get_native_physics(&self, token: &str, args: &[&str], out: &mut NativePhysics) -> i32 {
        match self.engine.physics(token, args) {
            Ok(record) => {
                *out = NativePhysics::from(record);
                STATUS_OK
            }
            Err(e) => {
                *out = NativePhysics::default();
                self.fail(e)
            }
        }
    }

    pub fn export_binary(&self, path: impl AsRef<Path>) -> i32 {
        let result = self.engine.export_binary(path.as_ref()).map(|_| STATUS_OK);
        self.status(result)
    }

    pub fn reload(&self) -> i32 {
        let result = self.engine.reload().map(|_| STATUS_OK);
        self.status(result)
    }

    /// Text of the most recent failure. Not cleared by later successes.
    pub fn last_error_text(&self) -> String {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn status(&self, result: Result<i32, EngineError>) -> i32 {
        result.unwrap_or_else(|e| self.fail(e))
    }

    fn fail(&self, err: impl Display) -> i32 {
        let text = err.to_string();
        debug!(error = %text, "boundary call failed");
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = text;
        STATUS_ERROR
    }

    fn two_pass(&self, text: &str, buffer: Option<&mut [u8]>) -> i32 {
        let Ok(len) = i32::try_from(text.len()) else {
            return self.fail(format!(
                "output of {} bytes exceeds the i32 length range",
                text.len()
            ));
        };
        let Some(buffer) = buffer else {
            return len;
        };
        let needed = text.len() + 1;
        if buffer.len() < needed {
            return self.fail(format!(
                "buffer too small: need {} bytes, got {}",
                needed,
                buffer.len()
            ));
        }
        buffer[..text.len()].copy_from_slice(text.as_bytes());
        buffer[text.len()] = 0;
        len
    }
}
