//! Property tests for prompt flattening

use clibridge::{ContextMode, PromptBuilder, with_context};
use clibridge_protocol::{ChatTurn, Role};
use proptest::prelude::*;

fn role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::System),
        Just(Role::User),
        Just(Role::Assistant),
        "[a-z_]{1,12}".prop_map(Role::from),
    ]
}

fn turn() -> impl Strategy<Value = ChatTurn> {
    (role(), "[ -~]{0,40}").prop_map(|(role, content)| ChatTurn::new(role, content))
}

proptest! {
    #[test]
    fn prompt_lists_every_turn_in_order(turns in prop::collection::vec(turn(), 0..8)) {
        let prompt = PromptBuilder::build(&turns);
        let expected: String = turns
            .iter()
            .map(|t| format!("{}: {}\n\n", t.role.label(), t.content))
            .collect();

        prop_assert!(prompt.ends_with("Assistant:"));
        prop_assert_eq!(prompt, format!("{}Assistant:", expected));
    }

    #[test]
    fn labels_start_upper_case(name in "[a-z][a-z_]{0,12}") {
        let label = Role::from(name.as_str()).label();
        prop_assert!(label.chars().next().is_some_and(char::is_uppercase));
        prop_assert_eq!(label.to_lowercase(), name);
    }

    #[test]
    fn context_turn_leads_and_keeps_conversation(
        turns in prop::collection::vec(turn(), 0..8),
        context in "[a-z]{1,20}",
    ) {
        let out = with_context(&turns, Some(&context), ContextMode::Hybrid);
        let conversational: Vec<_> = turns.iter().filter(|t| t.role.is_conversational()).cloned().collect();

        prop_assert_eq!(&out[0].role, &Role::System);
        prop_assert!(out[0].content.ends_with(&context));
        prop_assert_eq!(&out[1..], conversational.as_slice());
    }
}

#[test]
fn blank_context_leaves_turns_untouched() {
    let turns = vec![ChatTurn::user("hi"), ChatTurn::new("tool", "x")];
    assert_eq!(with_context(&turns, Some("  \n"), ContextMode::ContextOnly), turns);
    assert_eq!(with_context(&turns, None, ContextMode::Hybrid), turns);
}
