use chrono::{DateTime, Utc};

use crate::core::{EntityError, Result, Value};

/// Declarative per-property constraint
///
/// Bounds are attached to property names through the entity descriptor and
/// checked against the proposed new value. All limits are inclusive. NULL
/// passes every bound except `Required`.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    /// The property must not be set to an absent or empty value
    Required,

    /// Character-count limits for text values
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },

    /// Inclusive integer limits
    IntRange { min: Option<i64>, max: Option<i64> },

    /// Inclusive float limits
    FloatRange { min: Option<f64>, max: Option<f64> },

    /// Inclusive timestamp limits
    DateRange {
        min: Option<DateTime<Utc>>,
        max: Option<DateTime<Utc>>,
    },
}

impl Bound {
    pub fn max_length(max: usize) -> Self {
        Self::Length {
            min: None,
            max: Some(max),
        }
    }

    pub fn int_range(min: i64, max: i64) -> Self {
        Self::IntRange {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn date_range(min: DateTime<Utc>, max: DateTime<Utc>) -> Self {
        Self::DateRange {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Check a proposed new value against this bound
    ///
    /// Pure over (property, value): unit-testable without an entity.
    pub fn check(&self, property: &str, value: &Value) -> Result<()> {
        match self {
            Self::Required => {
                if value.is_empty() {
                    return Err(EntityError::constraint(property, "value is required"));
                }
                Ok(())
            }

            // NULL passes every non-required bound
            _ if value.is_null() => Ok(()),

            Self::Length { min, max } => {
                let text = value.as_str().ok_or_else(|| {
                    EntityError::TypeMismatch(format!(
                        "length bound on '{}' expects TEXT, got {}",
                        property,
                        value.type_name()
                    ))
                })?;
                let chars = text.chars().count();
                if let Some(min) = min
                    && chars < *min
                {
                    return Err(EntityError::constraint(
                        property,
                        format!("length {} below minimum {}", chars, min),
                    ));
                }
                if let Some(max) = max
                    && chars > *max
                {
                    return Err(EntityError::constraint(
                        property,
                        format!("length {} exceeds maximum {}", chars, max),
                    ));
                }
                Ok(())
            }

            Self::IntRange { min, max } => {
                let n = value.as_i64().ok_or_else(|| {
                    EntityError::TypeMismatch(format!(
                        "integer bound on '{}' expects INTEGER, got {}",
                        property,
                        value.type_name()
                    ))
                })?;
                if let Some(min) = min
                    && n < *min
                {
                    return Err(EntityError::constraint(
                        property,
                        format!("{} below minimum {}", n, min),
                    ));
                }
                if let Some(max) = max
                    && n > *max
                {
                    return Err(EntityError::constraint(
                        property,
                        format!("{} exceeds maximum {}", n, max),
                    ));
                }
                Ok(())
            }

            Self::FloatRange { min, max } => {
                let n = value.as_f64().ok_or_else(|| {
                    EntityError::TypeMismatch(format!(
                        "float bound on '{}' expects FLOAT, got {}",
                        property,
                        value.type_name()
                    ))
                })?;
                if let Some(min) = min
                    && n < *min
                {
                    return Err(EntityError::constraint(
                        property,
                        format!("{} below minimum {}", n, min),
                    ));
                }
                if let Some(max) = max
                    && n > *max
                {
                    return Err(EntityError::constraint(
                        property,
                        format!("{} exceeds maximum {}", n, max),
                    ));
                }
                Ok(())
            }

            Self::DateRange { min, max } => {
                let t = value.as_timestamp().ok_or_else(|| {
                    EntityError::TypeMismatch(format!(
                        "date bound on '{}' expects TIMESTAMP, got {}",
                        property,
                        value.type_name()
                    ))
                })?;
                if let Some(min) = min
                    && t < *min
                {
                    return Err(EntityError::constraint(
                        property,
                        format!("{} before minimum {}", t.to_rfc3339(), min.to_rfc3339()),
                    ));
                }
                if let Some(max) = max
                    && t > *max
                {
                    return Err(EntityError::constraint(
                        property,
                        format!("{} after maximum {}", t.to_rfc3339(), max.to_rfc3339()),
                    ));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_required_bound() {
        assert!(Bound::Required.check("name", &Value::from("Alice")).is_ok());
        assert!(Bound::Required.check("name", &Value::Null).is_err());
        assert!(Bound::Required.check("name", &Value::from("")).is_err());
    }

    #[test]
    fn test_length_bound_inclusive() {
        let bound = Bound::max_length(5);
        assert!(bound.check("code", &Value::from("ABCDE")).is_ok());
        assert!(bound.check("code", &Value::from("ABCDEF")).is_err());
        // NULL passes non-required bounds
        assert!(bound.check("code", &Value::Null).is_ok());
    }

    #[test]
    fn test_length_bound_counts_chars() {
        let bound = Bound::max_length(2);
        assert!(bound.check("code", &Value::from("éé")).is_ok());
    }

    #[test]
    fn test_int_range_inclusive() {
        let bound = Bound::int_range(1, 10);
        assert!(bound.check("qty", &Value::Integer(1)).is_ok());
        assert!(bound.check("qty", &Value::Integer(10)).is_ok());
        assert!(bound.check("qty", &Value::Integer(0)).is_err());
        assert!(bound.check("qty", &Value::Integer(11)).is_err());
    }

    #[test]
    fn test_type_mismatch() {
        let bound = Bound::int_range(1, 10);
        let err = bound.check("qty", &Value::from("five")).unwrap_err();
        assert!(matches!(err, EntityError::TypeMismatch(_)));
    }

    #[test]
    fn test_date_range() {
        let min = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let max = Utc.with_ymd_and_hms(2020, 12, 31, 0, 0, 0).unwrap();
        let bound = Bound::date_range(min, max);

        let inside = Utc.with_ymd_and_hms(2020, 6, 15, 0, 0, 0).unwrap();
        let outside = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert!(bound.check("due", &Value::Timestamp(inside)).is_ok());
        assert!(bound.check("due", &Value::Timestamp(min)).is_ok());
        assert!(bound.check("due", &Value::Timestamp(outside)).is_err());
    }
}
