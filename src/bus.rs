use crate::codec::SampleRecord;
use crate::error::{BusError, ConfigError};
use crate::layer::{Layer, LayerHandle, MemberSpec};
use std::sync::MutexGuard;
use tracing::warn;

/// The channel registry: the one explicit context object shared by the
/// capture and replay paths.
///
/// Registration and sampling both go through the per-layer locks, so the
/// layer set is never iterated while a member is mid-mutation.
#[derive(Default)]
pub struct IoBus {
    layers: Vec<LayerHandle>,
}

// A poisoned layer lock means a panic inside an accessor; the layer's data
// is still the best available, so the guard is recovered.
pub(crate) fn lock_layer(handle: &LayerHandle) -> MutexGuard<'_, dyn Layer + 'static> {
    match handle.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl IoBus {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Adds a layer to the registry.
    ///
    /// The descriptor itself was validated at construction; registration only
    /// has to reject a second layer under the same base name.
    pub fn register(&mut self, layer: LayerHandle) -> Result<(), ConfigError> {
        let base_name = lock_layer(&layer).descriptor().base_name().to_owned();

        if self.layers.iter().any(|existing| {
            lock_layer(existing).descriptor().base_name() == base_name
        }) {
            return Err(ConfigError::DuplicateLayer(base_name));
        }

        self.layers.push(layer);
        Ok(())
    }

    /// Removes and closes the layer registered under `base_name`.
    pub fn unregister(&mut self, base_name: &str) {
        let mut removed = Vec::new();

        self.layers.retain(|handle| {
            if lock_layer(handle).descriptor().base_name() == base_name {
                removed.push(handle.clone());
                false
            } else {
                true
            }
        });

        for handle in removed {
            lock_layer(&handle).close();
        }
    }

    /// Closes every layer and empties the registry.
    pub fn close_all(&mut self) {
        for handle in self.layers.drain(..) {
            lock_layer(&handle).close();
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, base_name: &str) -> Option<&LayerHandle> {
        self.layers
            .iter()
            .find(|handle| lock_layer(handle).descriptor().base_name() == base_name)
    }

    /// Layers that declare at least one replay link.
    pub fn replay_targets(&self) -> Vec<LayerHandle> {
        self.layers
            .iter()
            .filter(|handle| !lock_layer(handle).descriptor().replay_links().is_empty())
            .cloned()
            .collect()
    }

    /// Reads every auto-logged member of every registered layer for the
    /// given tick.
    ///
    /// One failing accessor never aborts the pass: the channel is logged and
    /// omitted, and every other layer still contributes its records.
    pub fn sample(&self, cycle: u64) -> Vec<SampleRecord> {
        let mut records = Vec::new();

        for handle in &self.layers {
            let layer = lock_layer(handle);
            let descriptor = layer.descriptor();

            let auto_logged: Vec<MemberSpec> = descriptor
                .members()
                .iter()
                .filter(|m| m.is_auto_logged())
                .cloned()
                .collect();

            for member in auto_logged {
                let key = layer.descriptor().channel_key(&member.name);

                match layer.read(&member.name) {
                    Ok(value) if value.kind() == member.kind => {
                        records.push(SampleRecord {
                            name: key,
                            value,
                            cycle,
                        });
                    }
                    Ok(value) => {
                        warn!(
                            channel = %key,
                            expected = ?member.kind,
                            got = ?value.kind(),
                            "accessor returned mismatched kind, channel skipped this tick"
                        );
                    }
                    Err(reason) => {
                        warn!(
                            channel = %key,
                            %reason,
                            "accessor failed, channel skipped this tick"
                        );
                    }
                }
            }
        }

        records
    }

    /// Routes a value to the matching write-capable member.
    pub fn write(&self, key: &str, value: crate::value::Value) -> Result<(), BusError> {
        let Some((base_name, member_name)) = key.split_once('/') else {
            return Err(BusError::UnknownChannel(key.into()));
        };

        let Some(handle) = self.layer(base_name) else {
            return Err(BusError::UnknownChannel(key.into()));
        };

        let mut layer = lock_layer(handle);

        let Some(member) = layer.descriptor().member(member_name) else {
            return Err(BusError::UnknownChannel(key.into()));
        };

        if !member.is_write() {
            return Err(BusError::PermissionDenied(key.into()));
        }

        if member.kind != value.kind() {
            return Err(BusError::KindMismatch {
                channel: key.into(),
                expected: member.kind,
                got: value.kind(),
            });
        }

        let member_name = member_name.to_owned();
        layer
            .write(&member_name, value)
            .map_err(|reason| BusError::WriteRejected {
                channel: key.into(),
                reason,
            })
    }
}
