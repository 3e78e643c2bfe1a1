//! Placement constraints.

use std::fmt;

use serde_json::Value;

use crate::entity::serialize_info;
use crate::error::{MarathonError, Result};
use crate::util::{display_value, Pretty};

/// A placement rule encoded positionally as
/// `[attribute, operator]` or `[attribute, operator, parameter]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    info: Vec<Value>,
}

serialize_info!(Constraint);

impl Constraint {
    pub fn new(value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| MarathonError::Argument("constraint must be an array".to_string()))?;
        if !(2..=3).contains(&items.len()) || !items[0].is_string() || !items[1].is_string() {
            return Err(MarathonError::Argument(
                "constraint must be [attribute, operator, parameter] where only parameter is optional".to_string(),
            ));
        }
        Ok(Self { info: items.clone() })
    }

    pub fn info(&self) -> &[Value] {
        &self.info
    }

    pub fn attribute(&self) -> &str {
        self.info[0].as_str().unwrap_or_default()
    }

    pub fn operator(&self) -> &str {
        self.info[1].as_str().unwrap_or_default()
    }

    pub fn parameter(&self) -> Option<&Value> {
        self.info.get(2).filter(|v| !v.is_null())
    }
}

impl Pretty for Constraint {
    fn to_pretty_string(&self) -> String {
        self.info
            .iter()
            .map(|v| display_value(Some(v)))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constraint {{ attribute: {} operator: {}", self.attribute(), self.operator())?;
        if let Some(parameter) = self.parameter() {
            write!(f, " parameter: {}", display_value(Some(parameter)))?;
        }
        f.write_str(" }")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn two_element_constraint() {
        let c = Constraint::new(&json!(["hostname", "UNIQUE"])).unwrap();
        assert_eq!(c.attribute(), "hostname");
        assert_eq!(c.operator(), "UNIQUE");
        assert!(c.parameter().is_none());
        assert_eq!(c.to_pretty_string(), "hostname:UNIQUE");
        assert_eq!(c.to_string(), "Constraint { attribute: hostname operator: UNIQUE }");
    }

    #[test]
    fn three_element_constraint() {
        let c = Constraint::new(&json!(["rack_id", "GROUP_BY", "3"])).unwrap();
        assert_eq!(c.parameter(), Some(&json!("3")));
        assert_eq!(c.to_pretty_string(), "rack_id:GROUP_BY:3");
        assert_eq!(
            c.to_string(),
            "Constraint { attribute: rack_id operator: GROUP_BY parameter: 3 }"
        );
        assert_eq!(c.to_json(), r#"["rack_id","GROUP_BY","3"]"#);
    }

    #[test]
    fn rejects_wrong_shapes() {
        for bad in [
            json!({"attribute": "hostname"}),
            json!(["hostname"]),
            json!(["a", "b", "c", "d"]),
            json!([1, "UNIQUE"]),
        ] {
            assert!(matches!(Constraint::new(&bad), Err(MarathonError::Argument(_))), "{bad}");
        }
    }
}
