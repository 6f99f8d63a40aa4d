//! Error buffer translator
//!
//! Turns the engine's accumulated diagnostic text into one message.
//! Only the dispatcher worker calls this, inside an acquired engine context.

use pacgate_engine::PacEngine;

/// Read, clear and translate the engine's diagnostic buffer.
/// Returns `None` without touching the buffer when nothing was written.
pub fn drain<E: PacEngine + ?Sized>(engine: &mut E) -> Option<String> {
    let text = engine.read_diagnostics();
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    engine.clear_diagnostics();
    Some(translate(engine.component(), text))
}

/// Collapse diagnostic lines into a single message.
///
/// Each line loses its `"<component>: <origin>: "` prefix and one trailing
/// period. The final line is a summary of the ones before it and is
/// dropped when there is more than one. When nothing survives the cleanup
/// the raw trimmed text is returned instead.
pub fn translate(component: &str, text: &str) -> String {
    let mut lines: Vec<&str> = text
        .lines()
        .map(|line| clean_line(component, line))
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() > 1 {
        lines.pop();
    }

    if lines.is_empty() {
        return text.trim().to_string();
    }

    lines.join(" ")
}

fn clean_line<'a>(component: &str, line: &'a str) -> &'a str {
    let line = line.trim();
    let line = strip_component(component, line).trim();
    line.strip_suffix('.').unwrap_or(line)
}

fn strip_component<'a>(component: &str, line: &'a str) -> &'a str {
    line.strip_prefix(component)
        .and_then(|rest| rest.strip_prefix(": "))
        .and_then(|rest| rest.split_once(": "))
        .map(|(_, message)| message)
        .unwrap_or(line)
}
