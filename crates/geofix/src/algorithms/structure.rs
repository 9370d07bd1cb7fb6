use serde_json::Value;

use crate::types::GeometryType;

/// Minimal shape checks on a raw geometry object.
///
/// Returns the violations in the order they were found; an empty list means
/// the node is sound enough for topology checks.
pub fn validate(geometry: &Value) -> Vec<String> {
    let Some(object) = geometry.as_object() else {
        return vec!["geometry is not an object".to_string()];
    };

    let geometry_type = match object.get("type") {
        None => return vec!["missing \"type\"".to_string()],
        Some(Value::String(tag)) => match GeometryType::from_tag(tag) {
            Some(geometry_type) => geometry_type,
            None => return vec![format!("unrecognized geometry type \"{tag}\"")],
        },
        Some(_) => return vec!["\"type\" is not a string".to_string()],
    };

    let mut violations = Vec::new();

    if geometry_type == GeometryType::GeometryCollection {
        match object.get("geometries") {
            None => violations.push("GeometryCollection is missing \"geometries\"".to_string()),
            Some(Value::Array(members)) => {
                if let Some(i) = members.iter().position(|m| !m.is_object()) {
                    violations.push(format!("member {i} of \"geometries\" is not an object"));
                }
            }
            Some(_) => violations.push("\"geometries\" is not a list".to_string()),
        }
        return violations;
    }

    let coordinates = match object.get("coordinates") {
        None => {
            violations.push(format!("{geometry_type} is missing \"coordinates\""));
            return violations;
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            violations.push("\"coordinates\" is not a list".to_string());
            return violations;
        }
    };

    if geometry_type == GeometryType::Point {
        if !(2..=3).contains(&coordinates.len()) {
            violations.push(format!(
                "Point must have 2 or 3 components, found {}",
                coordinates.len()
            ));
        }
        let all_finite = coordinates
            .iter()
            .all(|c| c.as_f64().is_some_and(f64::is_finite));
        if !all_finite {
            violations.push("Point components must be finite numbers".to_string());
        }
    } else if coordinates.is_empty() {
        violations.push(format!("{geometry_type} has an empty coordinate list"));
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sound_geometries() {
        let geometries = [
            json!({"type": "Point", "coordinates": [1, 2]}),
            json!({"type": "Point", "coordinates": [1, 2, 3]}),
            json!({"type": "LineString", "coordinates": [[0, 0], [1, 1]]}),
            json!({"type": "GeometryCollection", "geometries": []}),
        ];
        for geometry in geometries {
            assert!(validate(&geometry).is_empty(), "{geometry}");
        }
    }

    #[test]
    fn test_type_problems() {
        assert_eq!(validate(&json!({"coordinates": [1, 2]})), vec!["missing \"type\""]);
        assert_eq!(
            validate(&json!({"type": "Circle", "coordinates": [1, 2]})),
            vec!["unrecognized geometry type \"Circle\""]
        );
        assert_eq!(validate(&json!(42)), vec!["geometry is not an object"]);
    }

    #[test]
    fn test_point_arity() {
        let violations = validate(&json!({"type": "Point", "coordinates": [1]}));
        assert_eq!(violations, vec!["Point must have 2 or 3 components, found 1"]);

        let violations = validate(&json!({"type": "Point", "coordinates": [1, "a"]}));
        assert_eq!(violations, vec!["Point components must be finite numbers"]);
    }

    #[test]
    fn test_coordinates_required() {
        assert_eq!(
            validate(&json!({"type": "Polygon"})),
            vec!["Polygon is missing \"coordinates\""]
        );
        assert_eq!(
            validate(&json!({"type": "MultiPoint", "coordinates": []})),
            vec!["MultiPoint has an empty coordinate list"]
        );
        assert_eq!(
            validate(&json!({"type": "LineString", "coordinates": {}})),
            vec!["\"coordinates\" is not a list"]
        );
        assert_eq!(
            validate(&json!({"type": "GeometryCollection", "geometries": [1]})),
            vec!["member 0 of \"geometries\" is not an object"]
        );
    }
}
