//! Entity registry
//!
//! Tracks every producer and consumer identity a queue has seen, along with its
//! fairness weight and its counters. The registry is not synchronised on its
//! own: it lives inside the queue state and is only touched under the queue
//! lock, which is also what makes first-use registration race free.

use crate::config::QueueConfig;
use crate::{Error, Result};
use core::fmt::Debug;
use core::hash::Hash;
use std::collections::HashMap;

/// What an entity has been used as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Role {
    /// Submits jobs
    Producer,
    /// Takes jobs
    Consumer,
    /// Both submits and takes
    Both,
}

impl Role {
    /// Widen a role with another use of the same entity
    pub fn merge(self, other: Role) -> Role {
        if self == other {
            self
        } else {
            Role::Both
        }
    }

    /// Whether the entity has submitted as a producer
    pub fn produces(self) -> bool {
        matches!(self, Role::Producer | Role::Both)
    }

    /// Whether the entity has taken as a consumer
    pub fn consumes(self) -> bool {
        matches!(self, Role::Consumer | Role::Both)
    }
}

/// Book-keeping for one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entity {
    /// `None` until the entity submits or takes
    pub role: Option<Role>,
    pub weight: u32,
    /// Own jobs admitted
    pub submitted: u64,
    /// Own jobs taken by anyone
    pub consumed: u64,
    /// Jobs taken while acting as a consumer
    pub served: u64,
}

impl Entity {
    fn new(weight: u32) -> Self {
        Self {
            role: None,
            weight,
            submitted: 0,
            consumed: 0,
            served: 0,
        }
    }

    fn assume(&mut self, role: Role) {
        self.role = Some(match self.role {
            Some(current) => current.merge(role),
            None => role,
        });
    }
}

#[derive(Debug)]
pub(crate) struct EntityRegistry<E> {
    entities: HashMap<E, Entity>,
    default_weight: u32,
    require_registration: bool,
}

impl<E> EntityRegistry<E>
where
    E: Eq + Hash + Clone + Debug,
{
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            entities: HashMap::new(),
            default_weight: config.default_weight,
            require_registration: config.require_registration,
        }
    }

    /// Create or re-weight an entity. Counters are kept on re-weighting.
    pub fn register(&mut self, id: &E, weight: u32) -> Result<()> {
        if weight == 0 {
            return Err(Error::InvalidEntity(format!(
                "{id:?}: weight must be positive"
            )));
        }
        match self.entities.get_mut(id) {
            Some(entity) => entity.weight = weight,
            None => {
                self.entities.insert(id.clone(), Entity::new(weight));
            }
        }
        Ok(())
    }

    /// Resolve an entity on use, creating it with the default weight unless
    /// registration is required.
    pub fn touch(&mut self, id: &E, role: Role) -> Result<()> {
        if let Some(entity) = self.entities.get_mut(id) {
            entity.assume(role);
            return Ok(());
        }
        if self.require_registration {
            return Err(Error::InvalidEntity(format!("{id:?} is not registered")));
        }
        let mut entity = Entity::new(self.default_weight);
        entity.assume(role);
        self.entities.insert(id.clone(), entity);
        Ok(())
    }

    pub fn weight(&self, id: &E) -> u32 {
        self.entities
            .get(id)
            .map_or(self.default_weight, |entity| entity.weight)
    }

    pub fn record_submitted(&mut self, id: &E) {
        if let Some(entity) = self.entities.get_mut(id) {
            entity.submitted += 1;
        }
    }

    pub fn record_consumed(&mut self, id: &E) {
        if let Some(entity) = self.entities.get_mut(id) {
            debug_assert!(entity.consumed < entity.submitted);
            entity.consumed += 1;
        }
    }

    pub fn record_served(&mut self, id: &E) {
        if let Some(entity) = self.entities.get_mut(id) {
            entity.served += 1;
        }
    }

    pub fn get(&self, id: &E) -> Option<&Entity> {
        self.entities.get(id)
    }

    #[cfg(test)]
    pub fn contains(&self, id: &E) -> bool {
        self.entities.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&E, &Entity)> {
        self.entities.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entities.len()
    }
}
