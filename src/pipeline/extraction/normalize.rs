use thiserror::Error;

/// A located token that is not a number once separators are removed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unparseable value token {token:?}")]
pub struct ValueUnparseable {
    pub token: String,
}

/// Strip thousands separators and whitespace, then parse as `f64`.
///
/// Empty results, bare separators ("," / ".") and non-finite values are
/// rejected.
pub fn normalize_value(token: &str) -> Result<f64, ValueUnparseable> {
    let cleaned: String = token
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    let unparseable = || ValueUnparseable {
        token: token.to_string(),
    };

    if cleaned.is_empty() {
        return Err(unparseable());
    }

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(unparseable()),
    }
}
