//! Filter formulas for the table's `filterByFormula` query parameter.

use tb_domain::ticket::TicketStatus;

/// Quote `value` as a single-quoted formula string literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Every ticket still waiting on HR.
pub fn pending() -> String {
    format!("({{Status}} = {})", quote(TicketStatus::Pending.as_str()))
}

/// Pending tickets whose title matches `title` exactly.
pub fn pending_with_title(title: &str) -> String {
    format!(
        "AND({{Title}} = {}, {{Status}} = {})",
        quote(title),
        quote(TicketStatus::Pending.as_str())
    )
}
