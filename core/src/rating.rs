//! Rating aggregation for employees and officials

use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::models::*;
use crate::store::RemoteStore;

/// Numeric value of a raw rating. Numbers pass through, strings are parsed,
/// anything else (or a non-finite result) has no value.
pub fn parse_rating(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    value.is_finite().then_some(value)
}

/// A rating counts towards the average only if it is numeric and above zero.
/// A "0" is a missing score, not a legitimate one.
pub fn valid_rating(raw: &Value) -> Option<f64> {
    parse_rating(raw).filter(|v| *v > 0.0)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Mean of the valid ratings rounded to one decimal, or `None` when no
/// rating is valid. `None` and `Some(0.0)` are different answers.
pub fn average_rating<'a, I>(ratings: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a Value>,
{
    let (sum, count) = ratings
        .into_iter()
        .filter_map(valid_rating)
        .fold((0.0_f64, 0_usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        None
    } else {
        Some(round_one_decimal(sum / count as f64))
    }
}

/// Project one `employees`/`officials` child into a rated row.
pub fn rated_entity(kind: RatedKind, id: String, record: RatedEntityRecord) -> RatedEntity {
    let entries = keyed_entries::<FeedbackRecord>(&Value::Object(record.feedback));

    let average = average_rating(entries.iter().map(|(_, f)| &f.rating));
    let rating_count = entries
        .iter()
        .filter(|(_, f)| valid_rating(&f.rating).is_some())
        .count();

    let feedback = entries
        .into_iter()
        .map(|(fid, f)| Feedback {
            id: fid,
            rating: parse_rating(&f.rating),
            comment: f.comment,
            citizen: f.citizen,
            timestamp: f.timestamp,
        })
        .collect();

    RatedEntity {
        id,
        kind,
        name: record.name,
        position: record.position,
        contact: record.contact,
        feedback,
        average_rating: average,
        rating_count,
    }
}

/// Project a whole `employees` or `officials` subtree, best rated first.
/// Entities without any rating go last; ties keep name order.
pub fn rated_entities(kind: RatedKind, subtree: &Value) -> Vec<RatedEntity> {
    let mut rows: Vec<RatedEntity> = keyed_entries::<RatedEntityRecord>(subtree)
        .into_iter()
        .map(|(id, record)| rated_entity(kind, id, record))
        .collect();

    rows.sort_by(|a, b| {
        let by_rating = match (a.average_rating, b.average_rating) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        by_rating.then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    rows
}

// ============================================================================
// Roster maintenance
// ============================================================================

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn entity_path(kind: RatedKind, id: &str) -> String {
    format!("{}/{}", kind.root(), id)
}

/// Add an employee or official. Returns the generated id.
pub async fn create_entity<S: RemoteStore>(
    store: &S,
    kind: RatedKind,
    name: &str,
    position: &str,
    contact: Option<&str>,
) -> Result<String> {
    let record = RatedEntityRecord {
        name: required("name", name)?,
        position: required("position", position)?,
        contact: contact.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string),
        feedback: Map::new(),
    };
    store.push(kind.root(), json!(record)).await
}

/// Change name, position and contact. Existing feedback is left alone.
pub async fn update_entity<S: RemoteStore>(
    store: &S,
    kind: RatedKind,
    id: &str,
    name: &str,
    position: &str,
    contact: Option<&str>,
) -> Result<()> {
    let path = entity_path(kind, id);
    let mut fields = Map::new();
    fields.insert("name".to_string(), json!(required("name", name)?));
    fields.insert("position".to_string(), json!(required("position", position)?));
    fields.insert(
        "contact".to_string(),
        contact
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map_or(Value::Null, |c| json!(c)),
    );

    if store.get(&path).await?.is_none() {
        return Err(Error::NotFound(format!("{} {}", kind.root(), id)));
    }
    store.update(&path, fields).await
}

pub async fn delete_entity<S: RemoteStore>(store: &S, kind: RatedKind, id: &str) -> Result<()> {
    let path = entity_path(kind, id);
    if store.get(&path).await?.is_none() {
        return Err(Error::NotFound(format!("{} {}", kind.root(), id)));
    }
    store.remove(&path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_no_valid_ratings_is_none_not_zero() {
        assert_eq!(average_rating(&[] as &[Value]), None);
        let ratings = [json!("abc"), json!("0"), json!(0), json!(-2), json!(null)];
        assert_eq!(average_rating(ratings.iter()), None);
    }

    #[test]
    fn test_average_rounds_to_one_decimal() {
        let ratings = [json!(5), json!("4"), json!(4)];
        assert_eq!(average_rating(ratings.iter()), Some(4.3));

        let ratings = [json!(3.25), json!(3.0)];
        assert_eq!(average_rating(ratings.iter()), Some(3.1));
    }

    #[test]
    fn test_invalid_inputs_are_excluded_from_average() {
        let ratings = [json!(4), json!("abc"), json!("0"), json!(2)];
        assert_eq!(average_rating(ratings.iter()), Some(3.0));
    }

    #[test]
    fn test_parse_rating_keeps_zero_but_valid_rejects_it() {
        assert_eq!(parse_rating(&json!("0")), Some(0.0));
        assert_eq!(valid_rating(&json!("0")), None);
        assert_eq!(parse_rating(&json!(" 4.5 ")), Some(4.5));
        assert_eq!(parse_rating(&json!(true)), None);
    }

    #[test]
    fn test_rated_entities_sort_unrated_last() {
        let subtree = json!({
            "e1": { "name": "Bea", "position": "Clerk", "feedback": {} },
            "e2": { "name": "Ana", "position": "Tanod", "feedback": {
                "f1": { "rating": 3, "citizen": "x" },
            }},
            "e3": { "name": "Carl", "position": "Captain", "feedback": {
                "f1": { "rating": "5" },
                "f2": { "rating": "abc" },
            }},
        });

        let rows = rated_entities(RatedKind::Employee, &subtree);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Carl", "Ana", "Bea"]);

        assert_eq!(rows[0].average_rating, Some(5.0));
        assert_eq!(rows[0].rating_count, 1);
        assert_eq!(rows[0].feedback.len(), 2);
        assert_eq!(rows[2].average_rating, None);
    }

    #[tokio::test]
    async fn test_roster_maintenance() {
        let store = MemoryStore::new();

        let blank = create_entity(&store, RatedKind::Official, "  ", "Kagawad", None).await;
        assert!(matches!(blank, Err(Error::Validation(_))));

        let id = create_entity(&store, RatedKind::Official, "Rosa", "Kagawad", Some(" "))
            .await
            .unwrap();
        let row = store.get(&format!("officials/{}", id)).await.unwrap().unwrap();
        assert_eq!(row["name"], "Rosa");
        assert!(row.get("contact").is_none());

        store
            .set(&format!("officials/{}/feedback/f1", id), json!({ "rating": 4 }))
            .await
            .unwrap();
        update_entity(&store, RatedKind::Official, &id, "Rosa M.", "Captain", Some("0917"))
            .await
            .unwrap();
        let rows = rated_entities(RatedKind::Official, &store.get("officials").await.unwrap().unwrap());
        assert_eq!(rows[0].name, "Rosa M.");
        assert_eq!(rows[0].contact.as_deref(), Some("0917"));
        assert_eq!(rows[0].average_rating, Some(4.0));

        let missing = update_entity(&store, RatedKind::Employee, &id, "A", "B", None).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));

        delete_entity(&store, RatedKind::Official, &id).await.unwrap();
        assert_eq!(store.get("officials").await.unwrap(), None);
        assert!(delete_entity(&store, RatedKind::Official, &id).await.is_err());
    }
}
