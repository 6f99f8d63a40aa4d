//! Diagnostic text buffer
//!
//! Engines report problems by appending free text lines here rather than
//! returning structured errors. Readers drain it between operations.

#[derive(Debug, Default, Clone)]
pub struct DiagnosticBuffer {
    text: String,
}

impl DiagnosticBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one `"<component>: <origin>: <message>"` line
    pub fn append_line(&mut self, component: &str, origin: &str, message: &str) {
        self.text.push_str(component);
        self.text.push_str(": ");
        self.text.push_str(origin);
        self.text.push_str(": ");
        self.text.push_str(message);
        self.text.push('\n');
    }

    pub fn contents(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}
