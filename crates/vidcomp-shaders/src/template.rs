//! `${NAME}` placeholder substitution.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Rendered with a fixed number of decimals.
    Float { value: f32, precision: usize },
    Text(String),
}

impl Value {
    fn render(&self, out: &mut String) {
        match self {
            Value::Float { value, precision } => {
                out.push_str(&format!("{value:.precision$}"));
            }
            Value::Text(s) => out.push_str(s),
        }
    }
}

/// Placeholder values for one program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderTemplate {
    values: BTreeMap<&'static str, Value>,
}

impl ShaderTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn float(mut self, name: &'static str, value: f32, precision: usize) -> Self {
        self.values.insert(name, Value::Float { value, precision });
        self
    }

    pub fn text(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(name, Value::Text(value.into()));
        self
    }

    /// Replaces every `${NAME}` in one left-to-right pass. Substituted text is not
    /// scanned again. Unknown names are left as they are.
    pub fn render(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len() + 64);
        let mut rest = source;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let name = &after[..end];
                    match self.values.get(name) {
                        Some(v) => v.render(&mut out),
                        None => {
                            tracing::warn!(placeholder = name, "unknown shader placeholder");
                            out.push_str(&rest[start..start + 2 + end + 1]);
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_use_their_precision() {
        let t = ShaderTemplate::new()
            .float("LINE_HEIGHT", 1.0 / 1024.0, 8)
            .float("FB_WIDTH", 1920.0, 1);
        assert_eq!(
            t.render("vec2(0.0, ${LINE_HEIGHT}) * ${FB_WIDTH}"),
            "vec2(0.0, 0.00097656) * 1920.0"
        );
    }

    #[test]
    fn substitution_is_single_pass() {
        let t = ShaderTemplate::new()
            .text("A", "${B}")
            .text("B", "boom");
        assert_eq!(t.render("${A} ${B}"), "${B} boom");
    }

    #[test]
    fn unknown_and_unterminated_placeholders_survive() {
        let t = ShaderTemplate::new().text("SAMPLER", "sampler2D");
        assert_eq!(t.render("${NOPE} ${SAMPLER} ${TAIL"), "${NOPE} sampler2D ${TAIL");
    }
}
