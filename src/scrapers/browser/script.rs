//! JavaScript snippets evaluated in the page.
//!
//! Elements are always re-resolved by selector and index, so a node that
//! re-rendered between calls is found afresh or reported missing.

/// Outcome strings returned by [`click`].
pub const CLICK_OK: &str = "ok";
pub const CLICK_MISSING: &str = "missing";
pub const CLICK_INTERCEPTED: &str = "intercepted";

/// Quote `value` as a JavaScript string literal.
fn literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

pub fn count(selector: &str) -> String {
    format!("document.querySelectorAll({}).length", literal(selector))
}

/// Click the `index`-th match, refusing when another element covers it.
pub fn click(selector: &str, index: usize) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelectorAll({sel})[{idx}];
    if (!el) return "{missing}";
    el.scrollIntoView({{ block: "center" }});
    const r = el.getBoundingClientRect();
    const top = document.elementFromPoint(r.left + r.width / 2, r.top + r.height / 2);
    if (top && top !== el && !el.contains(top) && !top.contains(el)) return "{intercepted}";
    el.click();
    return "{ok}";
}})()"#,
        sel = literal(selector),
        idx = index,
        missing = CLICK_MISSING,
        intercepted = CLICK_INTERCEPTED,
        ok = CLICK_OK
    )
}

pub fn text(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); return el ? el.textContent.trim() : null; }})()",
        literal(selector)
    )
}

pub fn texts(selector: &str) -> String {
    format!(
        "Array.from(document.querySelectorAll({})).map(el => el.textContent.trim())",
        literal(selector)
    )
}

pub fn outer_html(selector: &str, index: usize) -> String {
    format!(
        "(() => {{ const el = document.querySelectorAll({})[{}]; return el ? el.outerHTML : null; }})()",
        literal(selector),
        index
    )
}
