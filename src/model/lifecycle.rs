//! Soft-delete lifecycle
//!
//! Records are never physically removed. A deleted record is tombstoned and
//! every read goes through [`Stored::live`], which hides it.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Tombstoned { deleted_at: DateTime<Utc> },
}

impl Lifecycle {
    /// Map the nullable `deleted_at` storage column.
    pub fn from_deleted_at(deleted_at: Option<DateTime<Utc>>) -> Self {
        match deleted_at {
            Some(deleted_at) => Lifecycle::Tombstoned { deleted_at },
            None => Lifecycle::Active,
        }
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Lifecycle::Active => None,
            Lifecycle::Tombstoned { deleted_at } => Some(*deleted_at),
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }
}

/// A persisted value together with its lifecycle state.
#[derive(Debug, Clone)]
pub struct Stored<T> {
    value: T,
    lifecycle: Lifecycle,
}

impl<T> Stored<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            lifecycle: Lifecycle::Active,
        }
    }

    pub fn with_lifecycle(value: T, lifecycle: Lifecycle) -> Self {
        Self { value, lifecycle }
    }

    /// The value, unless tombstoned.
    pub fn live(&self) -> Option<&T> {
        self.lifecycle.is_active().then_some(&self.value)
    }

    pub fn live_mut(&mut self) -> Option<&mut T> {
        if self.lifecycle.is_active() {
            Some(&mut self.value)
        } else {
            None
        }
    }

    pub fn into_live(self) -> Option<T> {
        self.lifecycle.is_active().then_some(self.value)
    }

    /// Tombstone the record. Returns false if it already was.
    pub fn tombstone(&mut self, now: DateTime<Utc>) -> bool {
        if !self.lifecycle.is_active() {
            return false;
        }
        self.lifecycle = Lifecycle::Tombstoned { deleted_at: now };
        true
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }
}
