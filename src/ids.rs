//! Phantom-typed opaque identifiers.
//!
//! Every foreign reference the scheduler handles (job, program, version,
//! user) is an opaque id minted by an external collaborator. Wrapping each
//! in its own `Id<Tag>` instance keeps a `ProgramId` from being accidentally
//! compared against a `UserId` at the type level, the way the reservation
//! store keeps `ReservationId`/`ClientId`/`ComponentId` distinct.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Id<T> {
    id: Uuid,
    #[serde(skip)]
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub fn new(id: Uuid) -> Self {
        Id { id, _marker: PhantomData }
    }

    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.id
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T> Eq for Id<T> {}

impl<T> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full_name = std::any::type_name::<T>();
        let clean_name = full_name.split("::").last().unwrap_or(full_name);
        write!(f, "{}({})", clean_name, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobTag;
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramTag;
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionTag;
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserTag;

pub type JobId = Id<JobTag>;
pub type ProgramId = Id<ProgramTag>;
pub type VersionId = Id<VersionTag>;
pub type UserId = Id<UserTag>;
