//! Shared machine services
//!
//! Long-lived objects several modes need (trough, ball saver, status board)
//! are installed once and looked up by type.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;

use pf_core::{PfError, PfResult};

#[derive(Default)]
pub struct Services {
    entries: HashMap<TypeId, Box<dyn Any>>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a service, replacing any previous one of the same type
    pub fn insert<T: 'static>(&mut self, service: T) -> bool {
        log::debug!("Service installed: {}", type_name::<T>());
        self.entries
            .insert(TypeId::of::<T>(), Box::new(service))
            .is_some()
    }

    pub fn get<T: 'static>(&self) -> PfResult<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<T>())
            .ok_or(PfError::MissingService(type_name::<T>()))
    }

    pub fn get_mut<T: 'static>(&mut self) -> PfResult<&mut T> {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_mut::<T>())
            .ok_or(PfError::MissingService(type_name::<T>()))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Trough {
        balls: u32,
    }

    #[test]
    fn test_lookup_by_type() {
        let mut services = Services::new();
        assert!(matches!(
            services.get::<Trough>(),
            Err(PfError::MissingService(_))
        ));
        assert!(!services.insert(Trough::default()));
        services.get_mut::<Trough>().unwrap().balls = 2;
        assert_eq!(services.get::<Trough>().unwrap().balls, 2);
        assert!(services.insert(Trough::default()));
        assert!(services.contains::<Trough>());
    }
}
