use std::collections::BTreeSet;
use std::fmt;

/// Three-way difference between the managed memberships of a subject and
/// the ones its definitions now call for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub to_add: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
    pub unchanged: BTreeSet<String>,
}

impl MembershipDiff {
    pub fn compute(previous: &BTreeSet<String>, desired: &BTreeSet<String>) -> Self {
        Self {
            to_add: desired.difference(previous).cloned().collect(),
            to_remove: previous.difference(desired).cloned().collect(),
            unchanged: previous.intersection(desired).cloned().collect(),
        }
    }

    /// Whether applying the diff changes nothing
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

impl fmt::Display for MembershipDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to add, {} to remove, {} unchanged",
            self.to_add.len(),
            self.to_remove.len(),
            self.unchanged.len()
        )
    }
}
