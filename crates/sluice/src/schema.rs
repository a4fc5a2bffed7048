//! Record schema validation for intake files.
//!
//! A record carries customer identity in exactly one of two shapes:
//! flat (top-level `CustomerID` + `CustomerCardNumber`) or nested (a
//! `Customer` object holding the same fields plus optional free-form
//! `CustomerDetails`). Validation detects the shape, enforces the
//! mutual-exclusivity rule, and accumulates every field violation in a
//! single pass rather than stopping at the first.

use serde_json::Value;
use std::fmt;

/// Field name treated as a secret wherever it appears.
pub const CARD_NUMBER_FIELD: &str = "CustomerCardNumber";

const OPERATOR_ID_MIN_LEN: usize = 5;
const CUSTOMER_ID_MIN_LEN: usize = 7;
const CARD_NUMBER_LEN: usize = 16;

/// Shape in which customer identity appeared, derived during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureType {
    Flat,
    Nested,
}

impl StructureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructureType::Flat => "flat",
            StructureType::Nested => "nested",
        }
    }
}

impl fmt::Display for StructureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated 16-character card number.
///
/// `Debug` and `Display` render a masked form (first four and last four
/// characters visible), so the raw value cannot leak through logging or
/// error formatting. There is deliberately no accessor for the full value.
#[derive(Clone, PartialEq, Eq)]
pub struct CardNumber(String);

impl CardNumber {
    /// Masked rendering: first 4 and last 4 characters visible.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}********{tail}")
    }
}

impl fmt::Debug for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardNumber({})", self.masked())
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Customer identity in exactly one of its two wire shapes.
#[derive(Debug, Clone)]
pub enum CustomerIdentity {
    Flat {
        customer_id: String,
        card_number: CardNumber,
    },
    Nested {
        customer_id: String,
        card_number: CardNumber,
        /// Free-form details object; unknown keys are preserved as-is.
        details: Option<serde_json::Map<String, Value>>,
    },
}

impl CustomerIdentity {
    pub fn customer_id(&self) -> &str {
        match self {
            CustomerIdentity::Flat { customer_id, .. }
            | CustomerIdentity::Nested { customer_id, .. } => customer_id,
        }
    }

    pub fn structure_type(&self) -> StructureType {
        match self {
            CustomerIdentity::Flat { .. } => StructureType::Flat,
            CustomerIdentity::Nested { .. } => StructureType::Nested,
        }
    }
}

/// A validated intake record.
#[derive(Debug, Clone)]
pub struct IngestRecord {
    pub operator_id: String,
    pub identity: CustomerIdentity,
    /// Free-form top-level metadata, if present.
    pub metadata: Option<serde_json::Map<String, Value>>,
}

impl IngestRecord {
    pub fn structure_type(&self) -> StructureType {
        self.identity.structure_type()
    }
}

/// A single violated field constraint.
///
/// Carries the field path and the constraint text only; secret content is
/// never captured, so violations are safe to log and to forward in
/// notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub constraint: String,
}

impl FieldViolation {
    fn new(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            constraint: constraint.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.constraint)
    }
}

/// Render a violation list as one human-readable line.
pub fn describe_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate a parsed record against the intake contract.
///
/// The structural check (exactly one identity shape) runs first and
/// short-circuits; everything after it accumulates, so callers receive
/// the complete list of field violations in one pass. Unrecognized
/// top-level fields are ignored.
pub fn validate(raw: &Value) -> Result<IngestRecord, Vec<FieldViolation>> {
    let Some(root) = raw.as_object() else {
        return Err(vec![FieldViolation::new("$", "record must be a JSON object")]);
    };

    let nested = root.get("Customer").and_then(Value::as_object);
    let has_flat = is_present(root.get("CustomerID")) && is_present(root.get(CARD_NUMBER_FIELD));

    if nested.is_none() && !has_flat {
        return Err(vec![FieldViolation::new(
            "Customer",
            "missing customer identity: provide CustomerID and CustomerCardNumber at the \
             top level, or a nested Customer object with those fields",
        )]);
    }
    if nested.is_some() && has_flat {
        return Err(vec![FieldViolation::new(
            "Customer",
            "ambiguous structure: both top-level customer fields and a nested Customer \
             object are present; exactly one representation is allowed",
        )]);
    }

    let mut violations = Vec::new();

    let operator_id = check_operator_id(root.get("OperatorID"), &mut violations);

    let (fields, prefix) = match nested {
        Some(object) => (object, "Customer."),
        None => (root, ""),
    };
    let customer_id = check_customer_id(fields.get("CustomerID"), prefix, &mut violations);
    let card_number = check_card_number(fields.get(CARD_NUMBER_FIELD), prefix, &mut violations);

    let details = match nested.and_then(|object| object.get("CustomerDetails")) {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => {
            violations.push(FieldViolation::new(
                "Customer.CustomerDetails",
                "must be an object when present",
            ));
            None
        }
    };

    let metadata = root.get("Metadata").and_then(Value::as_object).cloned();

    match (operator_id, customer_id, card_number) {
        (Some(operator_id), Some(customer_id), Some(card_number)) if violations.is_empty() => {
            let identity = if nested.is_some() {
                CustomerIdentity::Nested {
                    customer_id,
                    card_number,
                    details,
                }
            } else {
                CustomerIdentity::Flat {
                    customer_id,
                    card_number,
                }
            };
            Ok(IngestRecord {
                operator_id,
                identity,
                metadata,
            })
        }
        _ => Err(violations),
    }
}

/// Null-valued fields count as absent.
fn is_present(value: Option<&Value>) -> bool {
    value.is_some_and(|v| !v.is_null())
}

fn check_operator_id(
    value: Option<&Value>,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    let Some(operator_id) = value.and_then(Value::as_str) else {
        violations.push(FieldViolation::new(
            "OperatorID",
            "required and must be a string",
        ));
        return None;
    };

    let mut valid = true;
    if !operator_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        violations.push(FieldViolation::new(
            "OperatorID",
            "must contain only alphanumeric characters",
        ));
        valid = false;
    }
    if operator_id.chars().count() < OPERATOR_ID_MIN_LEN {
        violations.push(FieldViolation::new(
            "OperatorID",
            format!("must be at least {OPERATOR_ID_MIN_LEN} characters"),
        ));
        valid = false;
    }

    valid.then(|| operator_id.to_string())
}

fn check_customer_id(
    value: Option<&Value>,
    prefix: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    let field = format!("{prefix}CustomerID");
    let Some(customer_id) = value.and_then(Value::as_str) else {
        violations.push(FieldViolation::new(field, "required and must be a string"));
        return None;
    };

    if customer_id.chars().count() < CUSTOMER_ID_MIN_LEN {
        violations.push(FieldViolation::new(
            field,
            format!("must be at least {CUSTOMER_ID_MIN_LEN} characters"),
        ));
        return None;
    }
    Some(customer_id.to_string())
}

/// The card value itself is never echoed into the violation text.
fn check_card_number(
    value: Option<&Value>,
    prefix: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<CardNumber> {
    let field = format!("{prefix}{CARD_NUMBER_FIELD}");
    let Some(raw) = value.and_then(Value::as_str) else {
        violations.push(FieldViolation::new(field, "required and must be a string"));
        return None;
    };

    if raw.chars().count() != CARD_NUMBER_LEN {
        violations.push(FieldViolation::new(
            field,
            format!("length/format invalid: must be exactly {CARD_NUMBER_LEN} characters"),
        ));
        return None;
    }
    Some(CardNumber(raw.to_string()))
}
