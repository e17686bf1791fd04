//! Extract code from model responses

use regex::Regex;
use std::sync::LazyLock;

static VERILOG_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:verilog|systemverilog|v)[ \t]*\r?\n(.*?)\r?\n[ \t]*```").unwrap());

static ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n]*\r?\n(.*?)\r?\n[ \t]*```").unwrap());

/// Pull code out of a response.
///
/// Prefers a ```verilog fenced block, then any fenced block, then the whole
/// trimmed response.
pub fn extract_code(response: &str) -> String {
    for pattern in [&*VERILOG_FENCE, &*ANY_FENCE] {
        if let Some(code) = pattern.captures(response).and_then(|c| c.get(1)) {
            return code.as_str().trim().to_string();
        }
    }
    response.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verilog_fence_preferred() {
        let text = "Here:\n```\nnot this\n```\n```verilog\nmodule a;\nendmodule\n```\n";
        assert_eq!(extract_code(text), "module a;\nendmodule");
    }

    #[test]
    fn test_plain_fence() {
        let text = "```\nmodule b; endmodule\n```";
        assert_eq!(extract_code(text), "module b; endmodule");
    }

    #[test]
    fn test_unfenced_text_trimmed() {
        assert_eq!(extract_code("\n  module c; endmodule  \n"), "module c; endmodule");
    }
}
