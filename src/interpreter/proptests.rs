//! Property-based tests for the response interpreter
//!
//! These tests verify key invariants hold across generated replies:
//! - Well-formed `{title, steps}` payloads keep their title and step count
//! - Structure-free short text becomes exactly one step holding the input
//! - Interpretation is deterministic
//! - Arbitrary (including broken JSON) input never panics and never comes
//!   back structured without steps

use super::*;
use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// Strategies
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z ,.']{0,40}"
}

/// One step element in any of the shapes agents produce
fn arb_step_element(position: usize) -> impl Strategy<Value = Value> {
    prop_oneof![
        arb_text().prop_map(Value::String),
        (arb_text(), proptest::option::of(arb_text())).prop_map(|(content, strategy)| {
            let mut element = json!({ "Content": content });
            if let Some(strategy) = strategy {
                element["Strategy"] = Value::String(strategy);
            }
            element
        }),
        arb_text().prop_map(|content| json!({ "content": content })),
        (arb_text(), arb_text()).prop_map(move |(content, strategy)| {
            let mut element = serde_json::Map::new();
            element.insert(
                format!("Step {}", position + 1),
                json!({ "Content": content, "Strategy": strategy }),
            );
            Value::Object(element)
        }),
    ]
}

fn arb_steps() -> impl Strategy<Value = Vec<Value>> {
    (1usize..8).prop_flat_map(|len| {
        (0..len)
            .map(arb_step_element)
            .collect::<Vec<_>>()
    })
}

/// How the payload is wrapped in the reply
#[derive(Debug, Clone, Copy)]
enum Wrapping {
    Bare,
    Fenced,
    Prose,
    Pretty,
}

fn arb_wrapping() -> impl Strategy<Value = Wrapping> {
    prop_oneof![
        Just(Wrapping::Bare),
        Just(Wrapping::Fenced),
        Just(Wrapping::Prose),
        Just(Wrapping::Pretty),
    ]
}

fn wrap(payload: &Value, wrapping: Wrapping) -> String {
    match wrapping {
        Wrapping::Bare => payload.to_string(),
        Wrapping::Fenced => format!("Here you go:\n```json\n{payload}\n```\nEnjoy."),
        Wrapping::Prose => format!("Sure, here is the sequence. {payload} Let me know what you think."),
        Wrapping::Pretty => serde_json::to_string_pretty(payload).unwrap(),
    }
}

/// Short text with nothing any structured stage could latch onto
fn arb_unstructured() -> impl Strategy<Value = String> {
    "[a-z][a-z ]{0,24}"
}

fn structural_view(outcome: &ParseOutcome) -> (bool, String, Vec<(u32, String)>, String) {
    match outcome {
        ParseOutcome::Structured {
            sequence,
            display_message,
        } => (
            true,
            sequence.title.clone(),
            sequence
                .steps
                .iter()
                .map(|s| (s.step_number, s.content.clone()))
                .collect(),
            display_message.clone(),
        ),
        ParseOutcome::Unstructured { display_message } => {
            (false, String::new(), vec![], display_message.clone())
        }
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_well_formed_json_keeps_title_and_length(
        title in "[A-Z][A-Za-z ]{0,30}[a-z]",
        steps in arb_steps(),
        wrapping in arb_wrapping(),
    ) {
        let payload = json!({ "title": title, "steps": steps });
        let outcome = interpret(&wrap(&payload, wrapping));

        let sequence = outcome.sequence().expect("structured outcome");
        prop_assert_eq!(&sequence.title, &title);
        prop_assert_eq!(sequence.steps.len(), steps.len());
        prop_assert!(outcome.display_message().contains(&title));
    }

    #[test]
    fn prop_unstructured_text_becomes_single_step(raw in arb_unstructured()) {
        let outcome = interpret(&raw);
        let sequence = outcome.sequence().expect("structured outcome");
        prop_assert_eq!(sequence.steps.len(), 1);
        prop_assert_eq!(sequence.steps[0].step_number, 1);
        prop_assert_eq!(&sequence.steps[0].content, &raw);
        prop_assert_eq!(&sequence.title, DEFAULT_TITLE);
    }

    #[test]
    fn prop_interpret_is_deterministic(raw in ".{0,300}") {
        let first = interpret(&raw);
        let second = interpret(&raw);
        prop_assert_eq!(structural_view(&first), structural_view(&second));
    }

    #[test]
    fn prop_adversarial_json_is_total(raw in r#"[{}\[\]":,a-z0-9 \n`\\]{0,120}"#) {
        let outcome = interpret(&raw);
        match &outcome {
            ParseOutcome::Structured { sequence, .. } => prop_assert!(!sequence.steps.is_empty()),
            ParseOutcome::Unstructured { display_message } => {
                prop_assert!(raw.trim().is_empty());
                prop_assert_eq!(display_message, &raw);
            }
        }
    }

    #[test]
    fn prop_numbered_list_recovers_every_item(
        items in proptest::collection::vec("[A-Za-z][A-Za-z ]{2,30}[a-z]", 2..6),
    ) {
        let raw = items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {item}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        let recovered = ResponseInterpreter::default().recover(&raw).unwrap();
        prop_assert_eq!(recovered.stage, Stage::NumberedList);
        let contents: Vec<String> = recovered.steps.iter().map(|s| s.content.clone()).collect();
        prop_assert_eq!(contents, items);
    }
}
