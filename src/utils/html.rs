// src/utils/html.rs

/// Sanitizes admin-entered text before it is stored and shown to respondents.
///
/// Whitelist based: safe inline tags survive, `<script>` and its content,
/// event handler attributes and other dangerous markup are removed.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_scripts_keeps_text() {
        assert_eq!(clean_html("Cost<script>alert(1)</script>"), "Cost");
        assert_eq!(clean_html("<b>Quality</b>"), "<b>Quality</b>");
        assert_eq!(clean_html("Plain label"), "Plain label");
    }
}
