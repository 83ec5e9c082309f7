//! Set difference between channel members and the identities that engaged with a message.

use std::collections::HashSet;

use serde::Serialize;

use crate::{errors::InvalidInputError, identity::UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Per-message engagement outcome, recomputed on every invocation.
pub struct EngagementReport {
    total_members: usize,
    engaged_count: usize,
    non_engaged: Vec<UserId>,
}

impl EngagementReport {
    pub fn total_members(&self) -> usize {
        self.total_members
    }

    /// Members who reacted, replied, or authored the message.
    pub fn engaged_count(&self) -> usize {
        self.engaged_count
    }

    pub fn non_engaged_count(&self) -> usize {
        self.non_engaged.len()
    }

    /// Non-engaged members in channel member order.
    pub fn non_engaged(&self) -> &[UserId] {
        &self.non_engaged
    }

    pub fn is_fully_engaged(&self) -> bool {
        self.non_engaged.is_empty()
    }
}

/// Returns `members − (reactors ∪ repliers ∪ {author})`, preserving member order.
///
/// Reactors, repliers, or an author outside `members` contribute to neither
/// count. A member listed twice is rejected instead of collapsed.
pub fn compute_non_engagers(
    members: &[UserId],
    reactors: &HashSet<UserId>,
    repliers: &HashSet<UserId>,
    author: &UserId,
) -> Result<EngagementReport, InvalidInputError> {
    let mut seen = HashSet::with_capacity(members.len());
    let mut non_engaged = Vec::new();
    for member in members {
        if !seen.insert(member.as_str()) {
            return Err(InvalidInputError::DuplicateMember {
                member: member.to_string(),
            });
        }
        let engaged = member == author || reactors.contains(member) || repliers.contains(member);
        if !engaged {
            non_engaged.push(member.clone());
        }
    }

    let total_members = members.len();
    Ok(EngagementReport {
        total_members,
        engaged_count: total_members.saturating_sub(non_engaged.len()),
        non_engaged,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::compute_non_engagers;
    use crate::{errors::InvalidInputError, identity::UserId};

    fn ids(raw: &[&str]) -> Vec<UserId> {
        raw.iter()
            .map(|value| UserId::parse(*value).expect("valid id"))
            .collect()
    }

    fn set(raw: &[&str]) -> HashSet<UserId> {
        ids(raw).into_iter().collect()
    }

    fn id(raw: &str) -> UserId {
        UserId::parse(raw).expect("valid id")
    }

    #[test]
    fn functional_reactor_and_author_are_engaged() {
        let report = compute_non_engagers(
            &ids(&["A", "B", "C", "D"]),
            &set(&["B"]),
            &set(&[]),
            &id("A"),
        )
        .expect("report");
        assert_eq!(report.non_engaged(), ids(&["C", "D"]).as_slice());
        assert_eq!(report.engaged_count(), 2);
        assert_eq!(report.non_engaged_count(), 2);
        assert_eq!(report.total_members(), 4);
    }

    #[test]
    fn functional_no_engagement_leaves_everyone_but_author() {
        let report =
            compute_non_engagers(&ids(&["A", "B", "C"]), &set(&[]), &set(&[]), &id("A"))
                .expect("report");
        assert_eq!(report.non_engaged(), ids(&["B", "C"]).as_slice());
        assert_eq!(report.engaged_count(), 1);
    }

    #[test]
    fn functional_empty_channel_yields_empty_report() {
        let report = compute_non_engagers(&[], &set(&["X"]), &set(&["Y"]), &id("Z"))
            .expect("report");
        assert!(report.non_engaged().is_empty());
        assert_eq!(report.engaged_count(), 0);
        assert_eq!(report.total_members(), 0);
    }

    #[test]
    fn functional_fully_engaged_channel_is_a_success() {
        let report =
            compute_non_engagers(&ids(&["A", "B"]), &set(&["A", "B"]), &set(&[]), &id("A"))
                .expect("report");
        assert!(report.is_fully_engaged());
        assert_eq!(report.engaged_count(), 2);
    }

    #[test]
    fn regression_author_outside_channel_has_no_effect() {
        let report =
            compute_non_engagers(&ids(&["B", "C"]), &set(&[]), &set(&[]), &id("A"))
                .expect("report");
        assert_eq!(report.non_engaged(), ids(&["B", "C"]).as_slice());
        assert_eq!(report.engaged_count(), 0);
    }

    #[test]
    fn regression_departed_reactors_and_repliers_never_inflate_counts() {
        let report = compute_non_engagers(
            &ids(&["A", "B", "C"]),
            &set(&["GONE1", "B"]),
            &set(&["GONE2"]),
            &id("A"),
        )
        .expect("report");
        assert_eq!(report.non_engaged(), ids(&["C"]).as_slice());
        assert_eq!(report.engaged_count(), 2);
    }

    #[test]
    fn regression_repliers_count_as_engaged() {
        let report = compute_non_engagers(
            &ids(&["A", "B", "C"]),
            &set(&[]),
            &set(&["C"]),
            &id("A"),
        )
        .expect("report");
        assert_eq!(report.non_engaged(), ids(&["B"]).as_slice());
    }

    #[test]
    fn regression_duplicate_member_is_rejected() {
        let error = compute_non_engagers(&ids(&["A", "B", "A"]), &set(&[]), &set(&[]), &id("B"))
            .expect_err("duplicate member must fail");
        assert_eq!(
            error,
            InvalidInputError::DuplicateMember {
                member: "A".to_string()
            }
        );
    }

    fn identity_pool() -> impl Strategy<Value = String> {
        "U[0-9]{1,2}"
    }

    proptest! {
        #[test]
        fn property_partition_is_exact_ordered_and_idempotent(
            member_pool in prop::collection::hash_set(identity_pool(), 0..24),
            reactor_pool in prop::collection::hash_set(identity_pool(), 0..12),
            replier_pool in prop::collection::hash_set(identity_pool(), 0..12),
            author in identity_pool(),
        ) {
            let members = member_pool
                .iter()
                .map(|value| UserId::parse(value.as_str()).expect("valid id"))
                .collect::<Vec<_>>();
            let reactors = reactor_pool
                .iter()
                .map(|value| UserId::parse(value.as_str()).expect("valid id"))
                .collect::<HashSet<_>>();
            let repliers = replier_pool
                .iter()
                .map(|value| UserId::parse(value.as_str()).expect("valid id"))
                .collect::<HashSet<_>>();
            let author = UserId::parse(author).expect("valid id");

            let report = compute_non_engagers(&members, &reactors, &repliers, &author)
                .expect("report");
            let again = compute_non_engagers(&members, &reactors, &repliers, &author)
                .expect("report");
            prop_assert_eq!(&report, &again);

            let mut cursor = members.iter();
            for user in report.non_engaged() {
                prop_assert!(cursor.any(|member| member == user));
                prop_assert!(!reactors.contains(user));
                prop_assert!(!repliers.contains(user));
                prop_assert!(user != &author);
            }

            let engaged_members = members
                .iter()
                .filter(|member| {
                    *member == &author || reactors.contains(*member) || repliers.contains(*member)
                })
                .count();
            prop_assert_eq!(report.engaged_count(), engaged_members);
            prop_assert_eq!(
                report.engaged_count() + report.non_engaged_count(),
                members.len()
            );
        }

        #[test]
        fn property_author_member_is_never_non_engaged(
            member_pool in prop::collection::hash_set(identity_pool(), 1..24),
        ) {
            let members = member_pool
                .iter()
                .map(|value| UserId::parse(value.as_str()).expect("valid id"))
                .collect::<Vec<_>>();
            let author = members[0].clone();
            let report =
                compute_non_engagers(&members, &HashSet::new(), &HashSet::new(), &author)
                    .expect("report");
            prop_assert!(!report.non_engaged().contains(&author));
            prop_assert_eq!(report.non_engaged_count(), members.len() - 1);
        }
    }
}
