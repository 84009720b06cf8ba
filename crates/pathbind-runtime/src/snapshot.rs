//! Point-in-time views of an observed path.
//!
//! Snapshots hold strong references only for as long as the caller keeps
//! them; observers themselves store the penultimate owner weakly and build a
//! fresh snapshot on every request.

use pathbind_core::{MemberPath, MemberRef, Metadata, Object, Value};

use crate::error::ObserverError;

/// All members of a path plus the objects around them.
#[derive(Debug, Clone)]
pub struct MemberPathMembers {
    path: MemberPath,
    source: Option<Object>,
    penultimate_owner: Option<Object>,
    members: Vec<MemberRef>,
    error: Option<ObserverError>,
    complete: bool,
}

impl MemberPathMembers {
    pub(crate) fn new(
        path: MemberPath,
        source: Option<Object>,
        penultimate_owner: Option<Object>,
        members: Vec<MemberRef>,
        error: Option<ObserverError>,
        complete: bool,
    ) -> Self {
        Self {
            path,
            source,
            penultimate_owner,
            members,
            error,
            complete,
        }
    }

    /// Snapshot with nothing resolved.
    pub(crate) fn unavailable(path: MemberPath, error: Option<ObserverError>) -> Self {
        Self::new(path, None, None, Vec::new(), error, false)
    }

    #[must_use]
    pub fn path(&self) -> &MemberPath {
        &self.path
    }

    /// Root object the walk started from.
    #[must_use]
    pub fn source(&self) -> Option<&Object> {
        self.source.as_ref()
    }

    /// Owner of the last member.
    #[must_use]
    pub fn penultimate_owner(&self) -> Option<&Object> {
        self.penultimate_owner.as_ref()
    }

    /// Resolved members in path order. Truncated when the walk stopped early.
    #[must_use]
    pub fn members(&self) -> &[MemberRef] {
        &self.members
    }

    #[must_use]
    pub fn error(&self) -> Option<&ObserverError> {
        self.error.as_ref()
    }

    /// Every hop resolved, every intermediate value present, no error.
    #[must_use]
    pub fn all_members_available(&self) -> bool {
        self.complete && self.error.is_none() && self.penultimate_owner.is_some()
    }

    /// The terminal slot of this snapshot.
    #[must_use]
    pub fn last_member(&self) -> MemberPathLastMember {
        if self.all_members_available() {
            MemberPathLastMember::new(
                self.path.clone(),
                self.penultimate_owner.clone(),
                self.members.last().cloned(),
                None,
            )
        } else {
            MemberPathLastMember::new(self.path.clone(), None, None, self.error.clone())
        }
    }
}

/// The terminal member and its owner.
#[derive(Debug, Clone)]
pub struct MemberPathLastMember {
    path: MemberPath,
    owner: Option<Object>,
    member: Option<MemberRef>,
    error: Option<ObserverError>,
}

impl MemberPathLastMember {
    pub(crate) fn new(
        path: MemberPath,
        owner: Option<Object>,
        member: Option<MemberRef>,
        error: Option<ObserverError>,
    ) -> Self {
        Self {
            path,
            owner,
            member,
            error,
        }
    }

    #[must_use]
    pub fn owner(&self) -> Option<&Object> {
        self.owner.as_ref()
    }

    #[must_use]
    pub fn member(&self) -> Option<&MemberRef> {
        self.member.as_ref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&ObserverError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.error.is_none() && self.owner.is_some() && self.member.is_some()
    }

    fn parts(&self) -> Result<(&Object, &MemberRef), ObserverError> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        match (&self.owner, &self.member) {
            (Some(owner), Some(member)) => Ok((owner, member)),
            _ => Err(ObserverError::Unavailable {
                path: self.path.to_string(),
            }),
        }
    }

    /// Read the terminal member's current value.
    pub fn get_value(&self, metadata: Option<&Metadata>) -> Result<Value, ObserverError> {
        let (owner, member) = self.parts()?;
        member
            .get_value(owner, metadata)
            .map_err(|source| ObserverError::Member {
                path: self.path.to_string(),
                member: member.name().to_owned(),
                source,
            })
    }

    /// Write through the terminal member on its owner.
    ///
    /// `Ok(false)` means the member does not accept writes.
    pub fn try_set_value(
        &self,
        value: Value,
        metadata: Option<&Metadata>,
    ) -> Result<bool, ObserverError> {
        let (owner, member) = self.parts()?;
        member
            .set_value(owner, value, metadata)
            .map_err(|source| ObserverError::Member {
                path: self.path.to_string(),
                member: member.name().to_owned(),
                source,
            })
    }
}
