//! detectors/replace.rs
//!
//! Rewrites a failed locator in test source. The edit is confined to the
//! same window the lexical resolver scans, so an identical selector
//! elsewhere in the file is left alone.

use regex::Captures;

use crate::detectors::lexical::{window_bounds, DEFAULT_WINDOW};
use crate::detectors::patterns::{
    rewrite_pattern, PLAYWRIGHT_REWRITE, PREFIXED_REWRITE, QUOTES, SELENIUM_REWRITE,
};

pub fn replace_locator(source: &str, old: &str, new: &str, line: Option<usize>) -> Option<String> {
    replace_locator_within(source, old, new, line, DEFAULT_WINDOW)
}

/// Replace `old` with `new` in locator calls around `line` (1-based).
/// Without a usable line the whole source is searched. Returns None when
/// nothing was rewritten.
pub fn replace_locator_within(
    source: &str,
    old: &str,
    new: &str,
    line: Option<usize>,
    window: usize,
) -> Option<String> {
    if source.is_empty() || old.is_empty() || new.is_empty() {
        return None;
    }

    // split keeps line endings intact on reassembly
    let lines: Vec<&str> = source.split('\n').collect();
    let (first, last) = line
        .and_then(|l| window_bounds(l, window, source.lines().count()))
        .unwrap_or((1, lines.len()));

    let region = lines[first - 1..last].join("\n");
    let rewritten = rewrite_region(&region, old, new)?;

    let mut out: Vec<&str> = lines[..first - 1].to_vec();
    out.push(&rewritten);
    out.extend_from_slice(&lines[last..]);
    Some(out.join("\n"))
}

struct Family<'a> {
    templates: Vec<&'static str>,
    old: &'a str,
    new: &'a str,
}

fn families<'a>(old: &'a str, new: &'a str) -> [Family<'a>; 2] {
    let playwright = PREFIXED_REWRITE
        .iter()
        .find_map(|(prefix, template)| {
            let value = old.strip_prefix(prefix).filter(|v| !v.is_empty())?;
            Some(Family {
                templates: vec![*template],
                old: value,
                new: new.strip_prefix(prefix).unwrap_or(new),
            })
        })
        .unwrap_or_else(|| Family {
            templates: PLAYWRIGHT_REWRITE.to_vec(),
            old,
            new,
        });

    let selenium = Family {
        templates: SELENIUM_REWRITE.to_vec(),
        old,
        new,
    };

    [playwright, selenium]
}

fn rewrite_region(region: &str, old: &str, new: &str) -> Option<String> {
    let mut text = region.to_string();

    for family in families(old, new) {
        for template in &family.templates {
            let rules: Vec<_> = QUOTES
                .iter()
                .filter_map(|&q| rewrite_pattern(template, q, family.old).map(|re| (q, re)))
                .collect();
            if !rules.iter().any(|(_, re)| re.is_match(&text)) {
                continue;
            }

            for (q, re) in &rules {
                let value = quoted(family.new, *q);
                text = re
                    .replace_all(&text, |c: &Captures| {
                        format!("{}{q}{}{}{}{q}{}", &c[1], &c[2], value, &c[3], &c[4])
                    })
                    .into_owned();
            }
            break;
        }
    }

    (text != region).then_some(text)
}

/// Escape a value for a Python literal delimited by `quote`.
fn quoted(value: &str, quote: char) -> String {
    value
        .replace('\\', "\\\\")
        .replace(quote, &format!("\\{}", quote))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_TEST: &str = r##"from playwright.sync_api import Page


def test_login(page: Page):
    page.goto("https://example.com/login")
    page.fill("#user", "admin")
    page.locator("#submit").click()
    assert page.locator('form #submit.primary').is_visible()
"##;

    #[test]
    fn playwright_locator_is_rewritten() {
        let out = replace_locator(LOGIN_TEST, "#submit", "#sign-in", Some(7)).unwrap();
        assert!(out.contains(r##"page.locator("#sign-in").click()"##));
        assert!(out.contains("page.locator('form #sign-in.primary')"));
        assert!(out.contains(r##"page.fill("#user", "admin")"##));
        assert!(out.ends_with("is_visible()\n"));
        assert_eq!(out.lines().count(), LOGIN_TEST.lines().count());
    }

    #[test]
    fn edits_stay_inside_the_window() {
        let mut lines = vec!["    page.locator('#a').click()".to_string()];
        lines.extend((0..30).map(|i| format!("    x = {}", i)));
        lines.push("    page.locator('#a').click()".to_string());
        let src = lines.join("\n");

        let out = replace_locator(&src, "#a", "#b", Some(32)).unwrap();
        let got: Vec<&str> = out.lines().collect();
        assert_eq!(got[0], "    page.locator('#a').click()");
        assert_eq!(got[31], "    page.locator('#b').click()");

        let whole = replace_locator(&src, "#a", "#b", None).unwrap();
        assert!(!whole.contains("'#a'"));
        let out_of_range = replace_locator(&src, "#a", "#b", Some(500)).unwrap();
        assert_eq!(out_of_range, whole);
    }

    #[test]
    fn selenium_value_must_match_exactly() {
        let src = "driver.find_element(By.ID, 'pay').click()\ndriver.find_element(By.ID, 'payment')\n";
        let out = replace_locator(src, "pay", "checkout", Some(1)).unwrap();
        assert_eq!(
            out,
            "driver.find_element(By.ID, 'checkout').click()\ndriver.find_element(By.ID, 'payment')\n"
        );
    }

    #[test]
    fn page_locator_calls_take_precedence() {
        let src = "page.locator('#a')\nframe.locator('#a')\n";
        let out = replace_locator(src, "#a", "#b", None).unwrap();
        assert_eq!(out, "page.locator('#b')\nframe.locator('#a')\n");

        let out = replace_locator("frame.locator('#a')\n", "#a", "#b", None).unwrap();
        assert_eq!(out, "frame.locator('#b')\n");
    }

    #[test]
    fn tagged_values_rewrite_their_call() {
        let src = "page.get_by_text('Sign in').click()\npage.get_by_role(\"button\", name=\"Go\")\n";
        let out = replace_locator(src, "text=Sign in", "text=Log in", Some(1)).unwrap();
        assert!(out.starts_with("page.get_by_text('Log in').click()"));

        let out = replace_locator(src, "role=button", "link", Some(2)).unwrap();
        assert!(out.contains(r#"page.get_by_role("link", name="Go")"#));
    }

    #[test]
    fn new_value_is_escaped_for_its_quotes() {
        let out = replace_locator("page.locator('#a')\n", "#a", "text='Save'", None).unwrap();
        assert_eq!(out, "page.locator('text=\\'Save\\'')\n");
    }

    #[test]
    fn nothing_to_rewrite_is_none() {
        assert_eq!(replace_locator("", "#a", "#b", None), None);
        assert_eq!(replace_locator("page.locator('#a')", "", "#b", None), None);
        assert_eq!(replace_locator("page.locator('#a')", "#a", "", None), None);
        assert_eq!(replace_locator("page.locator('#x')", "#a", "#b", Some(1)), None);
        assert_eq!(replace_locator("page.locator('#a')", "#a", "#a", Some(1)), None);
        assert_eq!(replace_locator("print('#a')", "#a", "#b", None), None);
    }
}
