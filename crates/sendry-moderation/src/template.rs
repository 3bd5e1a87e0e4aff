// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tiny `{{placeholder}}` substitution for warning and welcome templates.

use sendry_core::ParticipantId;

/// Replace every `{{key}}` placeholder with its value. Unknown placeholders
/// are left untouched so a typo in a template stays visible.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

/// Mention-friendly short name of a participant: the part of the id before
/// the `@`, or the whole id when there is none.
pub fn display_name(id: &ParticipantId) -> &str {
    id.as_str().split('@').next().unwrap_or(id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_all_known_placeholders() {
        let out = render(
            "Hi {{name}}, welcome to {{group}} ({{name}})",
            &[("name", "sam"), ("group", "Rustaceans")],
        );
        assert_eq!(out, "Hi sam, welcome to Rustaceans (sam)");
    }

    #[test]
    fn unknown_placeholders_survive() {
        assert_eq!(render("hello {{nope}}", &[("name", "x")]), "hello {{nope}}");
    }

    #[test]
    fn display_name_strips_the_host_part() {
        assert_eq!(display_name(&ParticipantId::from("12345@host")), "12345");
        assert_eq!(display_name(&ParticipantId::from("bare-id")), "bare-id");
    }
}
