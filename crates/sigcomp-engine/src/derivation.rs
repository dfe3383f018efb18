//! Explanatory derivation traces for inverse transforms.
//!
//! The trace is picked by matching the input text against a fixed, ordered
//! table of canonical forms. A form may match anywhere in the text, so a sum
//! containing `1/(s+a)` is explained by its first first-order term. The
//! trace never influences the computed inverse.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationStep {
    pub step: String,
    pub value: String,
}

/// Placeholder values a matcher captured from the input
type Bindings = Vec<(&'static str, String)>;

struct Form {
    name: &'static str,
    matcher: fn(&str) -> Option<Bindings>,
    steps: &'static [(&'static str, &'static str)],
}

static FIRST_ORDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"1/\(s\+(\d+(?:\.\d+)?)\)").expect("first-order pattern is a valid regex")
});

static FORMS: &[Form] = &[
    Form {
        name: "first-order decay",
        matcher: first_order,
        steps: &[
            ("Identify form", "1/(s + a)"),
            ("Lookup table", "exp(-at)·u(t)"),
            ("Substitute a", "a = {a}"),
            ("Final result", "{result}"),
        ],
    },
    Form {
        name: "unit step",
        matcher: |text| (text == "1/s").then(Vec::new),
        steps: &[
            ("Identify form", "1/s"),
            ("Lookup table", "u(t)"),
            ("Final result", "{result}"),
        ],
    },
    Form {
        name: "ramp",
        matcher: |text| text.contains("1/s^2").then(Vec::new),
        steps: &[
            ("Identify form", "1/s²"),
            ("Lookup table", "t·u(t)"),
            ("Final result", "{result}"),
        ],
    },
    Form {
        name: "generic",
        matcher: |_| Some(Vec::new()),
        steps: &[
            ("Input expression", "{input}"),
            ("Apply inverse Laplace transform", "{result}"),
        ],
    },
];

fn first_order(text: &str) -> Option<Bindings> {
    let caps = FIRST_ORDER.captures(text)?;
    Some(vec![("a", caps[1].to_string())])
}

/// Steps explaining how `input` maps to `result`
pub fn trace(input: &str, result: &str) -> Vec<DerivationStep> {
    let key: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    for form in FORMS {
        let Some(mut bindings) = (form.matcher)(&key) else {
            continue;
        };
        log::debug!("derivation for '{input}' uses the {} form", form.name);
        bindings.push(("input", input.to_string()));
        bindings.push(("result", result.to_string()));
        return form
            .steps
            .iter()
            .map(|(step, template)| DerivationStep {
                step: step.to_string(),
                value: fill(template, &bindings),
            })
            .collect();
    }
    Vec::new()
}

fn fill(template: &str, bindings: &Bindings) -> String {
    bindings
        .iter()
        .fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{name}}}"), value)
        })
}
