//! Domain records as served by the restaurant data service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DataError;

/// Geographic coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
  pub lat: f64,
  pub lng: f64,
}

/// A restaurant record. Canonically owned by the remote service; the local
/// store holds an eventually-consistent copy keyed by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
  pub id: u64,
  pub name: String,
  pub neighborhood: String,
  pub address: String,
  pub latlng: LatLng,
  pub cuisine_type: String,
  pub photograph: Option<String>,
  /// The service serializes this as a boolean or the strings
  /// "true"/"false" depending on which endpoint last wrote it.
  #[serde(default, deserialize_with = "lenient_bool")]
  pub is_favorite: bool,
}

/// A review for a restaurant. `restaurant_id` is a foreign reference and
/// never changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
  pub id: u64,
  pub restaurant_id: u64,
  pub name: String,
  pub rating: u8,
  pub comments: String,
  #[serde(rename = "createdAt")]
  pub created_at: DateTime<Utc>,
}

/// Wire payload for creating a review (`POST /reviews/`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
  pub restaurant_id: u64,
  pub name: String,
  pub rating: u8,
  pub comments: String,
}

/// Form-shaped review input. Numeric fields arrive as text and are coerced
/// during validation.
#[derive(Debug, Clone)]
pub struct ReviewDraft {
  pub restaurant_id: String,
  pub name: String,
  pub rating: String,
  pub comments: String,
}

impl ReviewDraft {
  /// Coerce and bound-check the draft into a wire payload.
  pub fn validate(&self) -> Result<NewReview, DataError> {
    let restaurant_id: u64 = self
      .restaurant_id
      .trim()
      .parse()
      .map_err(|_| DataError::Validation(format!("bad restaurant id '{}'", self.restaurant_id)))?;

    let rating: u8 = self
      .rating
      .trim()
      .parse()
      .map_err(|_| DataError::Validation(format!("bad rating '{}'", self.rating)))?;

    if !(1..=5).contains(&rating) {
      return Err(DataError::Validation(format!(
        "rating {} out of range 1-5",
        rating
      )));
    }

    let name = self.name.trim();
    if name.is_empty() {
      return Err(DataError::Validation("reviewer name is empty".to_string()));
    }

    Ok(NewReview {
      restaurant_id,
      rating,
      name: name.to_string(),
      comments: self.comments.trim().to_string(),
    })
  }
}

/// Accept `true`, `"true"`, `false`, `"false"` (and absent via default).
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum BoolOrString {
    Bool(bool),
    Text(String),
  }

  match BoolOrString::deserialize(deserializer)? {
    BoolOrString::Bool(b) => Ok(b),
    BoolOrString::Text(s) => Ok(s.eq_ignore_ascii_case("true")),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn draft(id: &str, rating: &str) -> ReviewDraft {
    ReviewDraft {
      restaurant_id: id.to_string(),
      name: "Ada".to_string(),
      rating: rating.to_string(),
      comments: "fine".to_string(),
    }
  }

  #[test]
  fn draft_coerces_numeric_fields() {
    let review = draft(" 5 ", "4").validate().unwrap();
    assert_eq!(review.restaurant_id, 5);
    assert_eq!(review.rating, 4);
  }

  #[test]
  fn draft_rejects_non_numeric_and_out_of_range() {
    assert!(matches!(
      draft("abc", "4").validate(),
      Err(DataError::Validation(_))
    ));
    assert!(matches!(
      draft("5", "0").validate(),
      Err(DataError::Validation(_))
    ));
    assert!(matches!(
      draft("5", "6").validate(),
      Err(DataError::Validation(_))
    ));
  }

  #[test]
  fn favorite_flag_accepts_string_booleans() {
    let json = r#"{"id":1,"name":"A","neighborhood":"Queens","address":"x",
      "latlng":{"lat":40.7,"lng":-73.9},"cuisine_type":"Pizza",
      "photograph":"1","is_favorite":"true"}"#;
    let r: Restaurant = serde_json::from_str(json).unwrap();
    assert!(r.is_favorite);

    let json = json.replace("\"true\"", "false");
    let r: Restaurant = serde_json::from_str(&json).unwrap();
    assert!(!r.is_favorite);
  }
}
