//! Ordered pattern table for field extraction.
//!
//! Each rule is `(field, scope, regex, parse)`. Rules for a field are tried
//! in table order and the first capture the parse function accepts wins.
//! Adding a format means adding a row, not a branch.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};
use rust_decimal::Decimal;

use crate::config::{CustomPattern, PatternField};

/// Value produced by a rule's parse function.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Amount {
        value: Decimal,
        /// ISO code when the text stated one.
        currency: Option<String>,
    },
}

/// Which text a rule runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Body text and document text.
    All,
    /// The first few non-empty lines of the document text only.
    DocumentHead,
}

pub type ParseFn = fn(&Captures<'_>) -> Option<FieldValue>;

pub struct PatternRule {
    pub field: PatternField,
    pub scope: Scope,
    pub name: String,
    pub regex: Regex,
    pub parse: ParseFn,
}

const MONTHS: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec";
const AMOUNT_VALUE: &str = r"\d{1,3}(?:,\d{3})+(?:\.\d{2})?|\d+(?:\.\d{2})?";
const AMOUNT_VALUE_DECIMAL: &str = r"\d{1,3}(?:,\d{3})+(?:\.\d{2})?|\d+\.\d{2}";
const CURRENCY_CODES: &str = "USD|EUR|GBP|CAD|AUD|CHF|JPY";

/// Built-in rules as `(field, scope, name, pattern, parse)`.
fn builtin_rows() -> Vec<(PatternField, Scope, &'static str, String, ParseFn)> {
    vec![
        // Merchant
        (
            PatternField::Merchant,
            Scope::All,
            "merchant_labeled",
            r"(?im)^[ \t]*(?:merchant|store|retailer|sold by|seller|vendor)[ \t]*[:\-][ \t]*(?P<value>[^\r\n]{2,80}?)[ \t]*$"
                .to_string(),
            parse_merchant,
        ),
        (
            PatternField::Merchant,
            Scope::All,
            "merchant_thank_you",
            r"(?i)thank you for (?:shopping|your purchase|your order|ordering)[ \t]+(?:at|with|from)[ \t]+(?P<value>[a-z0-9][a-z0-9&'.\- ]{1,60}?)[ \t]*(?:[.!,\r\n]|$)"
                .to_string(),
            parse_merchant,
        ),
        (
            PatternField::Merchant,
            Scope::DocumentHead,
            "merchant_document_head",
            r"(?m)^[ \t]*(?P<value>[A-Za-z][A-Za-z0-9&'.,\- ]{1,58}[A-Za-z0-9.])[ \t]*$".to_string(),
            parse_merchant,
        ),
        // Purchase date
        (
            PatternField::PurchaseDate,
            Scope::All,
            "date_labeled",
            format!(
                r"(?i)\b(?:purchase date|order date|transaction date|date of purchase|order placed|date)\b[ \t]*[:\-]?[ \t]*(?P<value>\d{{4}}-\d{{2}}-\d{{2}}|\d{{1,2}}/\d{{1,2}}/\d{{2,4}}|(?:{m})[a-z]*\.?[ \t]+\d{{1,2}},?[ \t]+\d{{4}}|\d{{1,2}}[ \t]+(?:{m})[a-z]*\.?,?[ \t]+\d{{4}})",
                m = MONTHS
            ),
            parse_date,
        ),
        (
            PatternField::PurchaseDate,
            Scope::All,
            "date_iso",
            r"\b(?P<value>\d{4}-\d{2}-\d{2})\b".to_string(),
            parse_date,
        ),
        (
            PatternField::PurchaseDate,
            Scope::All,
            "date_us_numeric",
            r"\b(?P<value>\d{1,2}/\d{1,2}/\d{2,4})\b".to_string(),
            parse_date,
        ),
        (
            PatternField::PurchaseDate,
            Scope::All,
            "date_month_name",
            format!(
                r"(?i)\b(?P<value>(?:{m})[a-z]*\.?[ \t]+\d{{1,2}},?[ \t]+\d{{4}})\b",
                m = MONTHS
            ),
            parse_date,
        ),
        (
            PatternField::PurchaseDate,
            Scope::All,
            "date_day_month_name",
            format!(
                r"(?i)\b(?P<value>\d{{1,2}}[ \t]+(?:{m})[a-z]*\.?,?[ \t]+\d{{4}})\b",
                m = MONTHS
            ),
            parse_date,
        ),
        // Amount
        (
            PatternField::Amount,
            Scope::All,
            "amount_labeled",
            format!(
                r"(?i)\b(?:grand total|order total|total(?: amount)?(?: paid| charged| due)?|amount(?: paid| charged| due)?|charged|paid)\b[ \t]*(?:\([^)\r\n]*\))?[ \t]*[:\-]?[ \t]*(?P<currency>[$€£]|{c})?[ \t]*(?P<value>{v})(?:[ \t]*(?P<code>{c})\b)?",
                c = CURRENCY_CODES,
                v = AMOUNT_VALUE
            ),
            parse_amount,
        ),
        (
            PatternField::Amount,
            Scope::All,
            "amount_symbol_prefixed",
            format!(r"(?P<currency>[$€£])[ \t]?(?P<value>{v})", v = AMOUNT_VALUE_DECIMAL),
            parse_amount,
        ),
        (
            PatternField::Amount,
            Scope::All,
            "amount_code_suffixed",
            format!(
                r"\b(?P<value>{v})[ \t]?(?P<currency>{c})\b",
                c = CURRENCY_CODES,
                v = AMOUNT_VALUE_DECIMAL
            ),
            parse_amount,
        ),
        (
            PatternField::Amount,
            Scope::All,
            "amount_code_prefixed",
            format!(
                r"\b(?P<currency>{c})[ \t]?(?P<value>{v})\b",
                c = CURRENCY_CODES,
                v = AMOUNT_VALUE_DECIMAL
            ),
            parse_amount,
        ),
        // Card last 4
        (
            PatternField::CardLast4,
            Scope::All,
            "card_ending_in",
            r"(?i)\bending(?:[ \t]+(?:in|with))?[ \t]*[:#]?[ \t]*(?P<value>\d{4})\b".to_string(),
            parse_last4,
        ),
        (
            PatternField::CardLast4,
            Scope::All,
            "card_last_four",
            r"(?i)\blast[ \t]*(?:4|four)(?:[ \t]+digits)?[ \t]*[:#]?[ \t]*(?P<value>\d{4})\b"
                .to_string(),
            parse_last4,
        ),
        (
            PatternField::CardLast4,
            Scope::All,
            "card_masked_pan",
            r"(?:[*xX•]{2,}[ \t\-]*)+(?P<value>\d{4})\b".to_string(),
            parse_last4,
        ),
        // Card issuer
        (
            PatternField::CardIssuer,
            Scope::All,
            "card_issuer",
            r"(?i)\b(?P<value>visa|master[ \t]?card|american express|amex|discover|diners(?:[ \t]+club)?|jcb)\b"
                .to_string(),
            parse_issuer,
        ),
    ]
}

/// The ordered rule set used by the extractor.
pub struct PatternTable {
    rules: Vec<PatternRule>,
}

impl PatternTable {
    /// Custom patterns run before the built-in rows for their field.
    /// Patterns that fail to compile are skipped (config validation rejects them earlier).
    pub fn new(custom: &[CustomPattern]) -> Self {
        let mut rules: Vec<PatternRule> = custom
            .iter()
            .enumerate()
            .filter_map(|(i, c)| {
                Regex::new(&c.pattern).ok().map(|regex| PatternRule {
                    field: c.field,
                    scope: Scope::All,
                    name: format!("custom_{}_{}", c.field.as_str(), i),
                    regex,
                    parse: parser_for(c.field),
                })
            })
            .collect();

        rules.extend(
            builtin_rows()
                .into_iter()
                .filter_map(|(field, scope, name, pattern, parse)| {
                    Regex::new(&pattern).ok().map(|regex| PatternRule {
                        field,
                        scope,
                        name: name.to_string(),
                        regex,
                        parse,
                    })
                }),
        );

        Self { rules }
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// First accepted value for `field`, with the name of the rule that produced it.
    ///
    /// `head` is only consulted by [`Scope::DocumentHead`] rules.
    pub fn first_match(
        &self,
        field: PatternField,
        text: &str,
        head: &str,
    ) -> Option<(FieldValue, &str)> {
        self.rules
            .iter()
            .filter(|rule| rule.field == field)
            .find_map(|rule| {
                let haystack = match rule.scope {
                    Scope::All => text,
                    Scope::DocumentHead => head,
                };
                rule.regex
                    .captures_iter(haystack)
                    .find_map(|caps| (rule.parse)(&caps))
                    .map(|value| (value, rule.name.as_str()))
            })
    }
}

impl Default for PatternTable {
    fn default() -> Self {
        Self::new(&[])
    }
}

fn parser_for(field: PatternField) -> ParseFn {
    match field {
        PatternField::Merchant => parse_merchant,
        PatternField::PurchaseDate => parse_date,
        PatternField::Amount => parse_amount,
        PatternField::CardLast4 => parse_last4,
        PatternField::CardIssuer => parse_issuer,
    }
}

/// Lines that look like a document title rather than a business name.
const NOT_A_MERCHANT: &[&str] = &[
    "receipt",
    "invoice",
    "tax invoice",
    "order confirmation",
    "statement",
    "page",
    "total",
    "subtotal",
    "thank you",
    "payment",
    "order",
    "summary",
];

fn parse_merchant(caps: &Captures<'_>) -> Option<FieldValue> {
    let raw = caps.name("value")?.as_str();
    let cleaned = raw
        .trim()
        .trim_end_matches(['.', ',', '!', '-'])
        .trim();
    let letters = cleaned.chars().filter(|c| c.is_alphabetic()).count();
    if letters < 2 {
        return None;
    }
    let lower = cleaned.to_lowercase();
    if NOT_A_MERCHANT
        .iter()
        .any(|w| lower == *w || lower.starts_with(&format!("{} ", w)))
    {
        return None;
    }
    Some(FieldValue::Text(cleaned.to_string()))
}

fn parse_date(caps: &Captures<'_>) -> Option<FieldValue> {
    parse_date_value(caps.name("value")?.as_str()).map(FieldValue::Date)
}

/// Parses the date formats the table recognizes.
pub fn parse_date_value(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    let date = if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Some(d)
    } else if value.contains('/') {
        parse_us_numeric(value)
    } else {
        parse_month_name(value)
    }?;

    (1990..=2100).contains(&date.year()).then_some(date)
}

/// `M/D/YY` or `M/D/YYYY`.
fn parse_us_numeric(value: &str) -> Option<NaiveDate> {
    let mut parts = value.split('/');
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    let year_str = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let year: i32 = match year_str.len() {
        2 => 2000 + year_str.parse::<i32>().ok()?,
        4 => year_str.parse().ok()?,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_month_name(value: &str) -> Option<NaiveDate> {
    let normalized = value
        .replace(['.', ','], " ")
        .split_whitespace()
        .map(|w| {
            if w.eq_ignore_ascii_case("sept") {
                "sep"
            } else {
                w
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    ["%B %d %Y", "%b %d %Y", "%d %B %Y", "%d %b %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&normalized, fmt).ok())
}

fn parse_amount(caps: &Captures<'_>) -> Option<FieldValue> {
    let raw = caps.name("value")?.as_str().replace(',', "");
    let value = Decimal::from_str(&raw).ok()?;
    if value.is_sign_negative() {
        return None;
    }
    let currency = caps
        .name("currency")
        .or_else(|| caps.name("code"))
        .and_then(|m| currency_code(m.as_str()));
    Some(FieldValue::Amount { value, currency })
}

/// Maps a symbol or code to an ISO 4217 code.
pub fn currency_code(token: &str) -> Option<String> {
    match token.trim() {
        "$" => Some("USD".to_string()),
        "€" => Some("EUR".to_string()),
        "£" => Some("GBP".to_string()),
        code if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
            Some(code.to_ascii_uppercase())
        }
        _ => None,
    }
}

fn parse_last4(caps: &Captures<'_>) -> Option<FieldValue> {
    let value = caps.name("value")?.as_str();
    (value.len() == 4 && value.chars().all(|c| c.is_ascii_digit()))
        .then(|| FieldValue::Text(value.to_string()))
}

fn parse_issuer(caps: &Captures<'_>) -> Option<FieldValue> {
    normalize_issuer(caps.name("value")?.as_str()).map(|s| FieldValue::Text(s.to_string()))
}

/// Canonical network name for an issuer mention.
pub fn normalize_issuer(raw: &str) -> Option<&'static str> {
    let compact: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    match compact.as_str() {
        "visa" => Some("Visa"),
        "mastercard" => Some("Mastercard"),
        "amex" | "americanexpress" => Some("Amex"),
        "discover" => Some("Discover"),
        "diners" | "dinersclub" => Some("Diners Club"),
        "jcb" => Some("JCB"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn table() -> PatternTable {
        PatternTable::default()
    }

    fn text_of(field: PatternField, text: &str) -> Option<String> {
        match table().first_match(field, text, "") {
            Some((FieldValue::Text(s), _)) => Some(s),
            _ => None,
        }
    }

    fn date_of(text: &str) -> Option<NaiveDate> {
        match table().first_match(PatternField::PurchaseDate, text, "") {
            Some((FieldValue::Date(d), _)) => Some(d),
            _ => None,
        }
    }

    fn amount_of(text: &str) -> Option<(Decimal, Option<String>)> {
        match table().first_match(PatternField::Amount, text, "") {
            Some((FieldValue::Amount { value, currency }, _)) => Some((value, currency)),
            _ => None,
        }
    }

    #[test]
    fn test_all_builtin_patterns_compile() {
        assert_eq!(table().rules().len(), builtin_rows().len());
    }

    #[test]
    fn test_labeled_merchant() {
        assert_eq!(
            text_of(PatternField::Merchant, "MERCHANT: Target\nDATE: 2024-03-01"),
            Some("Target".to_string())
        );
        assert_eq!(
            text_of(PatternField::Merchant, "Sold by: Acme Widgets Inc."),
            Some("Acme Widgets Inc".to_string())
        );
    }

    #[test]
    fn test_thank_you_merchant() {
        assert_eq!(
            text_of(
                PatternField::Merchant,
                "Thank you for shopping at Corner Books! See you soon."
            ),
            Some("Corner Books".to_string())
        );
    }

    #[test]
    fn test_document_head_merchant_skips_titles() {
        let head = "RECEIPT\nJoe's Coffee\n123 Main St";
        let table = table();
        let found = table.first_match(PatternField::Merchant, "", head);
        assert_eq!(
            found.map(|(v, name)| (v, name.to_string())),
            Some((
                FieldValue::Text("Joe's Coffee".to_string()),
                "merchant_document_head".to_string()
            ))
        );
    }

    #[test]
    fn test_no_merchant_in_plain_prose_without_head() {
        assert_eq!(text_of(PatternField::Merchant, "hello there"), None);
    }

    #[test]
    fn test_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert_eq!(date_of("DATE: 2024-03-01"), expected);
        assert_eq!(date_of("Order date: 03/01/2024"), expected);
        assert_eq!(date_of("placed 3/1/24 online"), expected);
        assert_eq!(date_of("March 1, 2024"), expected);
        assert_eq!(date_of("Mar. 1 2024"), expected);
        assert_eq!(date_of("1 March 2024"), expected);
        assert_eq!(
            date_of("Sept 9, 2023"),
            NaiveDate::from_ymd_opt(2023, 9, 9)
        );
    }

    #[test]
    fn test_invalid_dates_rejected() {
        assert_eq!(date_of("DATE: 2024-13-45"), None);
        assert_eq!(date_of("ref 1/1/1850"), None);
    }

    #[test]
    fn test_labeled_total_wins_over_subtotal() {
        let text = "Subtotal: $40.00\nTax: $2.17\nTOTAL: $42.17";
        assert_eq!(amount_of(text), Some((dec!(42.17), Some("USD".to_string()))));
    }

    #[test]
    fn test_amount_without_currency() {
        assert_eq!(amount_of("Amount paid: 19.99"), Some((dec!(19.99), None)));
    }

    #[test]
    fn test_amount_currency_forms() {
        assert_eq!(
            amount_of("Grand Total €1,234.50"),
            Some((dec!(1234.50), Some("EUR".to_string())))
        );
        assert_eq!(
            amount_of("Total 15.00 GBP"),
            Some((dec!(15.00), Some("GBP".to_string())))
        );
        assert_eq!(
            amount_of("You were charged CAD 7.25 today"),
            Some((dec!(7.25), Some("CAD".to_string())))
        );
        assert_eq!(
            amount_of("Price £3.10"),
            Some((dec!(3.10), Some("GBP".to_string())))
        );
    }

    #[test]
    fn test_card_fragments() {
        assert_eq!(
            text_of(PatternField::CardLast4, "CARD ENDING IN 4242"),
            Some("4242".to_string())
        );
        assert_eq!(
            text_of(PatternField::CardLast4, "Visa ending: 1881"),
            Some("1881".to_string())
        );
        assert_eq!(
            text_of(PatternField::CardLast4, "Card: **** **** **** 0005"),
            Some("0005".to_string())
        );
        assert_eq!(
            text_of(PatternField::CardLast4, "XXXX-XXXX-XXXX-1234"),
            Some("1234".to_string())
        );
        assert_eq!(
            text_of(PatternField::CardLast4, "Last 4 digits: 9876"),
            Some("9876".to_string())
        );
        assert_eq!(text_of(PatternField::CardLast4, "Order 12345678"), None);
    }

    #[test]
    fn test_issuer_normalized() {
        assert_eq!(
            text_of(PatternField::CardIssuer, "Paid with MasterCard"),
            Some("Mastercard".to_string())
        );
        assert_eq!(
            text_of(PatternField::CardIssuer, "American Express"),
            Some("Amex".to_string())
        );
        assert_eq!(text_of(PatternField::CardIssuer, "visionary"), None);
    }

    #[test]
    fn test_custom_pattern_runs_first() {
        let custom = vec![CustomPattern {
            field: PatternField::Merchant,
            pattern: r"Shop ID: (?P<value>[A-Z]+)".to_string(),
        }];
        let table = PatternTable::new(&custom);
        let found = table.first_match(
            PatternField::Merchant,
            "Merchant: Somebody\nShop ID: ACME",
            "",
        );
        assert_eq!(
            found.map(|(v, name)| (v, name.to_string())),
            Some((
                FieldValue::Text("ACME".to_string()),
                "custom_merchant_0".to_string()
            ))
        );
    }

    #[test]
    fn test_currency_code() {
        assert_eq!(currency_code("$").as_deref(), Some("USD"));
        assert_eq!(currency_code("eur").as_deref(), Some("EUR"));
        assert_eq!(currency_code("¥"), None);
    }
}
