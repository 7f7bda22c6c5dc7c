//! Built-in recognizer rules.
//!
//! Each rule pairs one or more literal prefixes (fed to the Aho-Corasick
//! pre-filter) with the full expression that confirms a match. Adding a
//! vendor format means adding one entry here; call sites never change.

/// A single recognizer rule, uncompiled.
pub(super) struct Rule {
    /// Rule identifier.
    pub name: &'static str,
    /// Literal prefixes that must appear before the regex is tried.
    pub prefixes: &'static [&'static str],
    /// Confirming expression, run against the whole input.
    pub expression: &'static str,
}

/// The fixed rule set. Token shapes follow the formats published by each
/// vendor; widths are exact where the vendor guarantees them.
pub(super) const RULES: &[Rule] = &[
    Rule {
        name: "aws-access-key-id",
        prefixes: &["AKIA", "ASIA", "AGPA", "AIDA", "AROA", "AIPA", "ANPA", "ANVA"],
        expression: r"\b(?:A3T[A-Z0-9]|AKIA|AGPA|AIDA|AROA|AIPA|ANPA|ANVA|ASIA)[A-Z0-9]{16}\b",
    },
    Rule {
        name: "github-pat",
        prefixes: &["ghp_"],
        expression: r"\bghp_[0-9a-zA-Z]{36}\b",
    },
    Rule {
        name: "github-oauth-token",
        prefixes: &["gho_"],
        expression: r"\bgho_[0-9a-zA-Z]{36}\b",
    },
    Rule {
        name: "github-app-token",
        prefixes: &["ghu_", "ghs_"],
        expression: r"\b(?:ghu|ghs)_[0-9a-zA-Z]{36}\b",
    },
    Rule {
        name: "github-refresh-token",
        prefixes: &["ghr_"],
        expression: r"\bghr_[0-9a-zA-Z]{76}\b",
    },
    Rule {
        name: "github-fine-grained-pat",
        prefixes: &["github_pat_"],
        expression: r"github_pat_[0-9a-zA-Z]{22}_[0-9a-zA-Z]{59}",
    },
    Rule {
        name: "gitlab-pat",
        prefixes: &["glpat-"],
        expression: r"glpat-[0-9a-zA-Z_\-]{20}",
    },
    Rule {
        name: "huggingface-token",
        prefixes: &["hf_"],
        expression: r"\bhf_[0-9a-zA-Z]{34,40}\b",
    },
    Rule {
        name: "slack-token",
        prefixes: &["xoxb-", "xoxa-", "xoxp-", "xoxr-", "xoxs-"],
        expression: r"xox[baprs]-[0-9a-zA-Z\-]{10,48}",
    },
    Rule {
        name: "stripe-secret-key",
        prefixes: &["sk_test_", "sk_live_"],
        expression: r"(?i)sk_(?:test|live)_[0-9a-z]{10,32}",
    },
    Rule {
        name: "stripe-publishable-key",
        prefixes: &["pk_test_", "pk_live_"],
        expression: r"(?i)pk_(?:test|live)_[0-9a-z]{10,32}",
    },
    Rule {
        name: "openai-api-key",
        prefixes: &["sk-"],
        expression: r"\bsk-(?:proj-)?[a-zA-Z0-9]{20,}\b",
    },
    Rule {
        name: "anthropic-api-key",
        prefixes: &["sk-ant-"],
        expression: r"\bsk-ant-[a-zA-Z0-9_\-]{24,}",
    },
    Rule {
        name: "google-api-key",
        prefixes: &["AIza"],
        expression: r"AIza[0-9A-Za-z_\-]{35}",
    },
    Rule {
        name: "shopify-token",
        prefixes: &["shpss_", "shpat_", "shpca_", "shppa_"],
        expression: r"shp(?:ss|at|ca|pa)_[a-fA-F0-9]{32}",
    },
    Rule {
        name: "pypi-upload-token",
        prefixes: &["pypi-AgEIcHlwaS5vcmc"],
        expression: r"pypi-AgEIcHlwaS5vcmc[A-Za-z0-9_\-]{50,1000}",
    },
    Rule {
        name: "private-key-block",
        prefixes: &["-----BEGIN"],
        expression: r"(?i)-----\s*BEGIN[ A-Z0-9_-]*PRIVATE KEY(?: BLOCK)?\s*-----",
    },
];
