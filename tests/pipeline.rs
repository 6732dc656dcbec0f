use std::fs;
use std::path::PathBuf;

use locator_diag::harness::split_failures;
use locator_diag::{normalize_url, DiagConfig, Diagnoser, FsSource, LocatorType, Strategy};

const LOGIN_TEST: &str = r##"import pytest
from playwright.sync_api import Page


def test_login(page: Page):
    page.goto("https://example.com/login?ref=ci")
    page.fill("#username", "admin")
    page.locator(
        "#sign-in"
    ).click(timeout=1000)
"##;

const CART_TEST: &str = r#"from selenium.webdriver.common.by import By


class TestCart:
    def test_checkout(self, driver):
        driver.get("https://shop.example.com/cart")
        driver.find_element(By.ID, "pay").click()
"#;

const PYTEST_OUTPUT: &str = r##"=================================== FAILURES ===================================
__________________________________ test_login __________________________________

    def test_login(page: Page):
        page.goto("https://example.com/login?ref=ci")
        page.fill("#username", "admin")
>       page.locator(
            "#sign-in"
        ).click(timeout=1000)
E       playwright._impl._errors.TimeoutError: Locator.click: Timeout 1000ms exceeded.

tests/test_login.py:8: TimeoutError
____________________________ TestCart.test_checkout ____________________________

>       driver.find_element(By.ID, "pay").click()
E       selenium.common.exceptions.NoSuchElementException: Message: no such element: Unable to locate element: {"method":"css selector","selector":"[id=\"pay\"]"}

tests/test_cart.py:7: NoSuchElementException
____________________________ test_math ____________________________

    def test_math():
>       assert 1 == 2
E       assert 1 == 2

tests/test_math.py:2: AssertionError
=========================== short test summary info ============================
"##;

fn workspace() -> PathBuf {
    let root = std::env::temp_dir().join(format!("locator-diag-it-{}", uuid::Uuid::new_v4()));
    let tests = root.join("tests");
    fs::create_dir_all(&tests).unwrap();
    fs::write(tests.join("test_login.py"), LOGIN_TEST).unwrap();
    fs::write(tests.join("test_cart.py"), CART_TEST).unwrap();
    fs::write(tests.join("test_math.py"), "def test_math():\n    assert 1 == 2\n").unwrap();
    root
}

#[test]
fn pytest_failures_are_traced_to_locators() {
    let root = workspace();
    let reports = split_failures(PYTEST_OUTPUT);
    assert_eq!(reports.len(), 3);

    let diagnoser = Diagnoser::new(FsSource::rooted(&root), DiagConfig::default());
    let diagnostics: Vec<_> = reports.iter().filter_map(|r| diagnoser.diagnose(r)).collect();

    // test_math has no locator and is suppressed
    assert_eq!(diagnostics.len(), 2);

    let login = &diagnostics[0];
    assert_eq!(login.test_function, "test_login");
    assert_eq!(login.failed_locator.as_deref(), Some("#sign-in"));
    assert_eq!(login.locator_type, LocatorType::Playwright);
    assert_eq!(login.strategy, Strategy::Structural);
    assert_eq!(login.line_number, Some(8));
    assert_eq!(login.test_file.as_deref(), Some("tests/test_login.py"));

    let cart = &diagnostics[1];
    assert_eq!(cart.test_function, "test_checkout");
    assert_eq!(cart.failed_locator.as_deref(), Some(r#"[id="pay"]"#));
    assert_eq!(cart.locator_type, LocatorType::Selenium);
    assert_eq!(cart.strategy, Strategy::Message);

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn diagnostics_serialize_with_snake_case_keys() {
    let report = locator_diag::FailureReport::failed("test_a", "TimeoutError: locator('#a')");
    let d = locator_diag::diagnose(&report).unwrap();
    let json = serde_json::to_value(&d).unwrap();

    assert_eq!(json["failed_locator"], "#a");
    assert_eq!(json["locator_type"], "playwright");
    assert_eq!(json["strategy"], "message");
    assert!(json["page_url"].is_null());
}

#[test]
fn page_urls_normalize() {
    assert_eq!(normalize_url("https://example.com/path?x=1&y=2"), "https://example.com/path");
    assert_eq!(normalize_url(""), "");
}

const PAY_TEST: &str = r#"from selenium.webdriver.common.by import By
from selenium.webdriver.support.ui import WebDriverWait


def test_pay(driver):
    driver.get("https://shop.example.com/cart")
    WebDriverWait(driver, 5).until(lambda d: d.find_element(By.ID, "pay"))
"#;

const WAIT_OUTPUT: &str = r#"=================================== FAILURES ===================================
___________________________________ test_pay ___________________________________

    def test_pay(driver):
        driver.get("https://shop.example.com/cart")
>       WebDriverWait(driver, 5).until(lambda d: d.find_element(By.ID, "pay"))

tests/test_pay.py:7:
_ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _ _

>           raise TimeoutException(message, screen, stacktrace)
E           selenium.common.exceptions.TimeoutException: Message:

venv/lib/python3.12/site-packages/selenium/webdriver/support/wait.py:105: TimeoutException
=========================== short test summary info ============================
"#;

#[test]
fn wait_timeouts_trace_back_to_the_test_file() {
    let root = std::env::temp_dir().join(format!("locator-diag-it-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(root.join("tests")).unwrap();
    fs::write(root.join("tests").join("test_pay.py"), PAY_TEST).unwrap();

    let reports = split_failures(WAIT_OUTPUT);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].source_file, Some(PathBuf::from("tests/test_pay.py")));

    let d = Diagnoser::new(FsSource::rooted(&root), DiagConfig::default())
        .diagnose(&reports[0])
        .unwrap();
    assert_eq!(d.failed_locator.as_deref(), Some("pay"));
    assert_eq!(d.locator_type, LocatorType::Selenium);
    assert_eq!(d.strategy, Strategy::Structural);
    assert_eq!(d.line_number, Some(7));
    assert_eq!(d.page_url.as_deref(), Some("https://shop.example.com/cart"));

    fs::remove_dir_all(&root).unwrap();
}
