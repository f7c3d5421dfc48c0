// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host port allocation for published control ports.
//!
//! Ports are handed out round-robin from a configured range. A candidate is
//! only returned if nothing on the host is listening on it; ports found busy
//! are marked held so the next scan skips them.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{Ipv4Addr, TcpListener};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_PORT_MIN: u16 = 19001;
pub const DEFAULT_PORT_MAX: u16 = 29999;

/// Returns true if the port can be bound on the host right now.
pub type PortProbe = Arc<dyn Fn(u16) -> bool + Send + Sync>;

/// Inclusive range of host ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortRange {
    pub min: u16,
    pub max: u16,
}

impl Default for PortRange {
    fn default() -> Self {
        Self { min: DEFAULT_PORT_MIN, max: DEFAULT_PORT_MAX }
    }
}

impl PortRange {
    pub fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.min..=self.max).contains(&port)
    }

    pub fn len(&self) -> usize {
        if self.max < self.min {
            return 0;
        }
        usize::from(self.max - self.min) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate(&self) -> Result<(), PortError> {
        if self.min == 0 || self.min > self.max {
            return Err(PortError::InvalidRange { min: self.min, max: self.max });
        }
        Ok(())
    }

    /// Next port after `port`, wrapping to `min`.
    fn after(&self, port: u16) -> u16 {
        if port >= self.max {
            self.min
        } else {
            port + 1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("no free port in {min}-{max}")]
    Exhausted { min: u16, max: u16 },
    #[error("port {port} is outside {min}-{max}")]
    OutOfRange { port: u16, min: u16, max: u16 },
    #[error("port {0} is not held")]
    NotHeld(u16),
    #[error("invalid port range {min}-{max}")]
    InvalidRange { min: u16, max: u16 },
}

/// Bind-and-release probe on 127.0.0.1.
pub fn loopback_available(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}

struct Cursor {
    next: u16,
    held: HashSet<u16>,
}

/// Hands out each port in the range to at most one holder at a time.
pub struct PortAllocator {
    range: PortRange,
    cursor: Mutex<Cursor>,
    probe: PortProbe,
}

impl PortAllocator {
    pub fn new(range: PortRange) -> Result<Self, PortError> {
        Self::with_probe(range, Arc::new(loopback_available))
    }

    pub fn with_probe(range: PortRange, probe: PortProbe) -> Result<Self, PortError> {
        range.validate()?;
        Ok(Self { range, cursor: Mutex::new(Cursor { next: range.min, held: HashSet::new() }), probe })
    }

    pub fn range(&self) -> PortRange {
        self.range
    }

    /// Reserve the next free port, scanning at most once around the range.
    pub fn allocate(&self) -> Result<u16, PortError> {
        let mut cursor = self.cursor.lock();
        let start = cursor.next;
        let mut candidate = start;
        loop {
            if !cursor.held.contains(&candidate) {
                cursor.held.insert(candidate);
                if (self.probe)(candidate) {
                    cursor.next = self.range.after(candidate);
                    return Ok(candidate);
                }
                tracing::debug!(port = candidate, "port busy on host, marking held");
            }
            candidate = self.range.after(candidate);
            if candidate == start {
                return Err(PortError::Exhausted { min: self.range.min, max: self.range.max });
            }
        }
    }

    pub fn release(&self, port: u16) -> Result<(), PortError> {
        if !self.range.contains(port) {
            return Err(PortError::OutOfRange { port, min: self.range.min, max: self.range.max });
        }
        if !self.cursor.lock().held.remove(&port) {
            return Err(PortError::NotHeld(port));
        }
        Ok(())
    }

    pub fn is_held(&self, port: u16) -> bool {
        self.cursor.lock().held.contains(&port)
    }

    pub fn held_count(&self) -> usize {
        self.cursor.lock().held.len()
    }
}

#[cfg(test)]
#[path = "ports_tests.rs"]
mod tests;
