//! detectors/ast/ast.rs
//!
//! Structural locator resolution over a tree-sitter Python syntax tree.

use std::cell::RefCell;

use tree_sitter::{Node, Parser, Tree};

use crate::state::LocatorType;

thread_local! {
    static PY_PARSER: RefCell<Option<Parser>> = RefCell::new(make_python_parser());
}

fn make_python_parser() -> Option<Parser> {
    let mut p = Parser::new();
    p.set_language(&tree_sitter_python::language()).ok()?;
    Some(p)
}

/// Parse Python source. Sources with syntax errors are rejected, matching
/// a strict parser rather than tree-sitter's error recovery.
pub fn parse_source(source: &str) -> Option<Tree> {
    let tree = PY_PARSER.with(|p| p.borrow_mut().as_mut()?.parse(source, None))?;
    if tree.root_node().has_error() {
        return None;
    }
    Some(tree)
}

/// First call at `line` (1-based) whose shape names a locator, in
/// document order.
pub fn find_locator_call(source: &str, line: usize) -> Option<(LocatorType, String)> {
    if line == 0 {
        return None;
    }

    let tree = parse_source(source)?;
    find_call_at(tree.root_node(), line - 1, &|call| locator_of(call, source))
}

/// Pre-order walk returning the first `call` node on `row` for which
/// `pick` yields a value.
pub fn find_call_at<'a, T>(
    node: Node<'a>,
    row: usize,
    pick: &dyn Fn(Node<'a>) -> Option<T>,
) -> Option<T> {
    if node.start_position().row > row || node.end_position().row < row {
        return None;
    }

    if node.kind() == "call" && node.start_position().row == row {
        if let Some(found) = pick(node) {
            return Some(found);
        }
    }

    let mut cursor = node.walk();
    let children: Vec<Node<'a>> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .find_map(|child| find_call_at(child, row, pick))
}

fn locator_of(call: Node, source: &str) -> Option<(LocatorType, String)> {
    let function = call.child_by_field_name("function")?;
    if function.kind() != "attribute" {
        return None;
    }

    let method = function
        .child_by_field_name("attribute")?
        .utf8_text(source.as_bytes())
        .ok()?;

    let args = call.child_by_field_name("arguments")?;
    let positional = positional_args(args);

    match method {
        "locator" => {
            let value = string_literal(*positional.first()?, source)?;
            Some((LocatorType::Playwright, value))
        }
        "find_element" => {
            let value = string_literal(*positional.get(1)?, source)?;
            Some((LocatorType::Selenium, value))
        }
        _ => None,
    }
}

fn positional_args(args: Node) -> Vec<Node> {
    if args.kind() != "argument_list" {
        return Vec::new();
    }

    let mut cursor = args.walk();
    args.named_children(&mut cursor)
        .filter(|n| {
            !matches!(
                n.kind(),
                "keyword_argument" | "dictionary_splat" | "comment"
            )
        })
        .collect()
}

/// Value of a plain `str` literal. f-strings and bytes are not literals.
pub fn string_literal(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "string" => single_string(node, source),
        "concatenated_string" => {
            let mut cursor = node.walk();
            let parts: Option<Vec<String>> = node
                .named_children(&mut cursor)
                .filter(|n| n.kind() != "comment")
                .map(|n| single_string(n, source))
                .collect();
            parts.map(|p| p.concat())
        }
        "parenthesized_expression" => string_literal(node.named_child(0)?, source),
        _ => None,
    }
}

fn single_string(node: Node, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }

    let bytes = source.as_bytes();
    let count = node.child_count();
    if count < 2 {
        return None;
    }
    let start = node.child(0)?;
    let end = node.child(count - 1)?;
    if start.kind() != "string_start" || end.kind() != "string_end" {
        return None;
    }

    let opener = start.utf8_text(bytes).ok()?;
    let prefix: String = opener
        .chars()
        .take_while(|c| *c != '"' && *c != '\'')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }

    let body = source.get(start.end_byte()..end.start_byte())?;
    if prefix.contains('r') {
        Some(body.to_string())
    } else {
        Some(unescape(body))
    }
}

/// Undo Python string escapes. Unknown escapes stay verbatim, as Python
/// keeps them.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{7}'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '\\' | '\'' | '"' => out.push(next),
            '\n' => {}
            '0'..='7' => {
                let mut code = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(code));
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.clone().take(width).collect();
                let decoded = (digits.len() == width && digits.chars().all(|d| d.is_ascii_hexdigit()))
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(ch) => {
                        out.push(ch);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    None => {
                        out.push('\\');
                        out.push(next);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYWRIGHT_TEST: &str = r##"from playwright.sync_api import Page


def test_login(page: Page):
    page.goto("https://example.com/login")
    page.fill("#user", "admin")
    page.locator("button#submit").click()
    assert page.locator('.welcome').is_visible()
"##;

    #[test]
    fn locator_on_exact_line() {
        assert_eq!(
            find_locator_call(PLAYWRIGHT_TEST, 7),
            Some((LocatorType::Playwright, "button#submit".to_string()))
        );
        assert_eq!(
            find_locator_call(PLAYWRIGHT_TEST, 8),
            Some((LocatorType::Playwright, ".welcome".to_string()))
        );
    }

    #[test]
    fn non_locator_lines_yield_nothing() {
        assert_eq!(find_locator_call(PLAYWRIGHT_TEST, 5), None);
        assert_eq!(find_locator_call(PLAYWRIGHT_TEST, 6), None);
        assert_eq!(find_locator_call(PLAYWRIGHT_TEST, 0), None);
        assert_eq!(find_locator_call(PLAYWRIGHT_TEST, 500), None);
    }

    #[test]
    fn find_element_uses_second_argument() {
        let src = "from selenium.webdriver.common.by import By\n\ndef test_x(driver):\n    driver.find_element(By.ID, 'username').send_keys('a')\n";
        assert_eq!(
            find_locator_call(src, 4),
            Some((LocatorType::Selenium, "username".to_string()))
        );
    }

    #[test]
    fn computed_arguments_do_not_match() {
        let src = "def test_x(page, sel):\n    page.locator(sel).click()\n    page.locator(f\"#{sel}\").click()\n";
        assert_eq!(find_locator_call(src, 2), None);
        assert_eq!(find_locator_call(src, 3), None);
    }

    #[test]
    fn outer_chained_call_wins() {
        let src = "def test_x(page):\n    page.locator('form').locator('input[name=q]').fill('x')\n";
        assert_eq!(
            find_locator_call(src, 2),
            Some((LocatorType::Playwright, "input[name=q]".to_string()))
        );
    }

    #[test]
    fn keyword_arguments_are_not_positional() {
        let src = "def test_x(page):\n    page.locator(has_text='x', selector='y')\n";
        assert_eq!(find_locator_call(src, 2), None);
    }

    #[test]
    fn syntax_errors_reject_the_tree() {
        let src = "def test_x(page:\n    page.locator('#a').click()\n";
        assert!(parse_source(src).is_none());
        assert_eq!(find_locator_call(src, 2), None);
    }

    #[test]
    fn string_forms() {
        let src = "def t(p):\n    p.locator(r'\\d+')\n    p.locator('a' 'b')\n    p.locator(\"it\\'s\")\n    p.locator(b'x')\n";
        assert_eq!(find_locator_call(src, 2).map(|v| v.1), Some("\\d+".to_string()));
        assert_eq!(find_locator_call(src, 3).map(|v| v.1), Some("ab".to_string()));
        assert_eq!(find_locator_call(src, 4).map(|v| v.1), Some("it's".to_string()));
        assert_eq!(find_locator_call(src, 5), None);
    }

    #[test]
    fn numeric_escapes_decode() {
        let src = "def t(p):\n    p.locator('\\x23id')\n    p.locator('\\u00e9t\\U0001F600')\n    p.locator('\\043a\\0')\n    p.locator('\\d\\xZZ')\n";
        assert_eq!(find_locator_call(src, 2).map(|v| v.1), Some("#id".to_string()));
        assert_eq!(find_locator_call(src, 3).map(|v| v.1), Some("\u{e9}t\u{1F600}".to_string()));
        assert_eq!(find_locator_call(src, 4).map(|v| v.1), Some("#a\0".to_string()));
        assert_eq!(find_locator_call(src, 5).map(|v| v.1), Some("\\d\\xZZ".to_string()));
    }
}
