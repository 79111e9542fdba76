//! Process-wide driver registry used by [`open`](crate::open).

use crate::driver::Driver;
use crate::error::{DriverError, DriverResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

static DRIVERS: OnceLock<RwLock<BTreeMap<String, Arc<dyn Driver>>>> = OnceLock::new();

fn drivers_map() -> &'static RwLock<BTreeMap<String, Arc<dyn Driver>>> {
    DRIVERS.get_or_init(|| RwLock::new(BTreeMap::new()))
}

/// Make a driver available under `name`.
///
/// Returns [`DriverError::DuplicateDriver`] if the name is taken.
pub fn register(name: impl Into<String>, driver: Arc<dyn Driver>) -> DriverResult<()> {
    let name = name.into();
    let mut drivers = drivers_map().write();
    if drivers.contains_key(&name) {
        return Err(DriverError::DuplicateDriver(name));
    }
    tracing::debug!(target: "sqleak", driver = %name, "registered driver");
    drivers.insert(name, driver);
    Ok(())
}

/// Resolve a registered driver.
pub fn lookup(name: &str) -> DriverResult<Arc<dyn Driver>> {
    drivers_map()
        .read()
        .get(name)
        .cloned()
        .ok_or_else(|| DriverError::UnknownDriver(name.to_string()))
}

/// Sorted names of the registered drivers.
pub fn drivers() -> Vec<String> {
    drivers_map().read().keys().cloned().collect()
}
