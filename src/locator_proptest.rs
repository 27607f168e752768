//! Property-based tests for grouping changed paths into actions.

#[cfg(test)]
mod proptest_tests {
    use crate::locator::{group_actions, Action};
    use proptest::prelude::*;

    fn segment() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,8}"
    }

    fn version() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u8..20, 0u8..20, 0u8..20).prop_map(|(a, b, c)| format!("v{}.{}.{}", a, b, c)),
            (0u8..5).prop_map(|a| format!("v{}", a)),
        ]
    }

    fn changed_file() -> impl Strategy<Value = (String, String, String)> {
        (segment(), version(), prop_oneof![
            Just("README.md".to_string()),
            Just("Dockerfile".to_string()),
            segment().prop_map(|s| format!("src/{}.go", s)),
        ])
    }

    proptest! {
        /// Property: every action appears once, however many of its files changed
        #[test]
        fn group_actions_has_no_duplicates(files in prop::collection::vec(changed_file(), 0..40)) {
            let paths: Vec<String> = files
                .iter()
                .map(|(n, v, f)| format!("actions/{}/{}/{}", n, v, f))
                .collect();
            let actions = group_actions(paths.iter().map(String::as_str), "actions");

            let mut expected: Vec<Action> = files
                .iter()
                .map(|(n, v, _)| Action::new(n.as_str(), v.as_str()))
                .collect();
            expected.sort();
            expected.dedup();
            prop_assert_eq!(actions, expected);
        }

        /// Property: the result is sorted whatever order git reports paths in
        #[test]
        fn group_actions_output_is_sorted(files in prop::collection::vec(changed_file(), 0..40)) {
            let paths: Vec<String> = files
                .iter()
                .map(|(n, v, f)| format!("actions/{}/{}/{}", n, v, f))
                .collect();
            let actions = group_actions(paths.iter().rev().map(String::as_str), "actions");
            prop_assert!(actions.windows(2).all(|w| w[0] < w[1]));
        }

        /// Property: paths outside the actions directory never produce actions
        #[test]
        fn group_actions_ignores_other_directories(files in prop::collection::vec(changed_file(), 0..20)) {
            let paths: Vec<String> = files
                .iter()
                .map(|(n, v, f)| format!("docs/{}/{}/{}", n, v, f))
                .collect();
            prop_assert!(group_actions(paths.iter().map(String::as_str), "actions").is_empty());
        }
    }
}
