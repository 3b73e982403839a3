//! Contact requirements for judging grasp success.

use crate::engine::{BodyHandle, EngineError, LinkId, PhysicsEngine};

/// A nested AND/OR condition over link indices.
///
/// A grasp attempt is judged successful when the requirement is satisfied by
/// the set of links currently in contact: an [`AllOf`](Self::AllOf) node
/// requires every child, an [`AnyOf`](Self::AnyOf) node requires at least
/// one. Owned by the gripper variant and immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactRequirement {
    /// The link with this index must be in contact.
    Link(usize),
    /// At least one child requirement must hold.
    AnyOf(Vec<ContactRequirement>),
    /// Every child requirement must hold.
    AllOf(Vec<ContactRequirement>),
}

impl ContactRequirement {
    /// Evaluate the requirement against a contact predicate.
    pub fn is_satisfied(&self, in_contact: &impl Fn(usize) -> bool) -> bool {
        match self {
            Self::Link(link) => in_contact(*link),
            Self::AnyOf(children) => children.iter().any(|c| c.is_satisfied(in_contact)),
            Self::AllOf(children) => children.iter().all(|c| c.is_satisfied(in_contact)),
        }
    }

    /// Evaluate the requirement against the live contact state of `body`.
    pub fn evaluate<E: PhysicsEngine>(
        &self,
        engine: &E,
        body: BodyHandle,
    ) -> Result<bool, EngineError> {
        match self {
            Self::Link(link) => engine.link_in_contact(body, LinkId::Link(*link)),
            Self::AnyOf(children) => {
                for child in children {
                    if child.evaluate(engine, body)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::AllOf(children) => {
                for child in children {
                    if !child.evaluate(engine, body)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    /// All link indices mentioned by the requirement.
    pub fn links(&self) -> Vec<usize> {
        let mut links = Vec::new();
        self.collect_links(&mut links);
        links
    }

    fn collect_links(&self, out: &mut Vec<usize>) {
        match self {
            Self::Link(link) => out.push(*link),
            Self::AnyOf(children) | Self::AllOf(children) => {
                for child in children {
                    child.collect_links(out);
                }
            }
        }
    }
}
