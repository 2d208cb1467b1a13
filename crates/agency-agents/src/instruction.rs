use serde_json::{Map, Value};

use crate::loader::is_identifier;

/// Substitute `{key}` placeholders in an instruction from session state.
///
/// `{key}` with no matching state entry is left verbatim; `{key?}` with no
/// entry becomes empty. String values are inserted raw, anything else as
/// JSON. Braces that do not enclose an identifier are untouched.
pub fn render_instruction(template: &str, state: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let inner = &after[..close];
        let (key, optional) = match inner.strip_suffix('?') {
            Some(key) => (key, true),
            None => (inner, false),
        };

        match (is_identifier(key), state.get(key)) {
            (true, Some(Value::String(s))) => out.push_str(s),
            (true, Some(value)) => out.push_str(&value.to_string()),
            (true, None) if optional => {}
            _ => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}
