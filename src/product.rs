//! Product records and the documents derived from them.
//!
//! A [`Product`] is the unit of search. The embedding record and keyword
//! document for a product are both derived from the same snapshot through
//! [`Product::search_text`], so the two indexes can never disagree about what
//! text a product was indexed under.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{KioskError, Result};

/// A searchable product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Opaque identifier assigned at creation.
    pub id: String,
    pub name: String,
    pub description: String,
    /// Price in the store currency, never negative.
    pub price: f64,
    pub image_id: String,
}

impl Product {
    /// Create a new product.
    pub fn new<S: Into<String>>(
        id: S,
        name: S,
        description: S,
        price: f64,
        image_id: S,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            price,
            image_id: image_id.into(),
        }
    }

    /// The text both indexes are built from: `name + ": " + description`.
    pub fn search_text(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }

    /// Check the record invariants before it is written anywhere.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(KioskError::storage("product id must not be empty"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(KioskError::storage(format!(
                "product {} has invalid price {}",
                self.id, self.price
            )));
        }
        Ok(())
    }

    /// Build the embedding record for this product from its vector.
    pub fn embedding_record(&self, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: self.id.clone(),
            vector,
            text: self.search_text(),
            metadata: self.clone(),
        }
    }

    /// Build the keyword document for this product.
    pub fn keyword_document(&self) -> KeywordDocument {
        KeywordDocument {
            id: self.id.clone(),
            text: self.search_text(),
        }
    }
}

/// A product's dense representation as stored in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    /// Text the vector was produced from.
    pub text: String,
    /// Product snapshot at embedding time.
    pub metadata: Product,
}

/// A product's lexical representation as stored in the keyword index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordDocument {
    pub id: String,
    pub text: String,
}

/// A raw hit returned by the vector or keyword index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredId {
    pub id: String,
    pub score: f32,
}

impl ScoredId {
    pub fn new<S: Into<String>>(id: S, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Order two scores best first. NaN ranks below every number and equal to
/// other NaNs, so the order stays total.
pub fn descending_score(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => b.total_cmp(&a),
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
    }
}

/// A product together with its fused relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub product: Product,
    pub score: f32,
}

/// Turn an image file name into a display name.
///
/// `dark_down_jacket_1.png` becomes `Dark Down Jacket 1`.
pub fn format_image_name(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, ext))
            if !ext.is_empty() && ext.chars().all(|c| c.is_alphanumeric() || c == '_') =>
        {
            stem
        }
        _ => file_name,
    };
    stem.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descending_score_sinks_nan() {
        let mut scores = vec![0.2, f32::NAN, 0.9, f32::NAN, -1.0];
        scores.sort_by(|a, b| descending_score(*a, *b));
        assert_eq!(&scores[..3], &[0.9, 0.2, -1.0]);
        assert!(scores[3].is_nan() && scores[4].is_nan());
    }

    fn jacket() -> Product {
        Product::new(
            "a1",
            "Dark Down Jacket",
            "warm winter coat",
            129.99,
            "dark_down_jacket.png",
        )
    }

    #[test]
    fn test_search_text() {
        assert_eq!(jacket().search_text(), "Dark Down Jacket: warm winter coat");
    }

    #[test]
    fn test_derived_documents_share_text() {
        let product = jacket();
        let record = product.embedding_record(vec![0.1, 0.2]);
        let doc = product.keyword_document();
        assert_eq!(record.id, doc.id);
        assert_eq!(record.text, doc.text);
        assert_eq!(record.metadata, product);
    }

    #[test]
    fn test_validate() {
        assert!(jacket().validate().is_ok());

        let mut negative = jacket();
        negative.price = -1.0;
        assert!(negative.validate().is_err());

        let mut nan = jacket();
        nan.price = f64::NAN;
        assert!(nan.validate().is_err());

        let mut blank = jacket();
        blank.id = " ".to_string();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_json_field_names() {
        let value = serde_json::to_value(jacket()).unwrap();
        assert_eq!(value["imageId"], "dark_down_jacket.png");
        assert!(value.get("image_id").is_none());
        assert_eq!(value["price"], 129.99);
    }

    #[test]
    fn test_format_image_name() {
        assert_eq!(
            format_image_name("dark_down_jacket_1.png"),
            "Dark Down Jacket 1"
        );
        assert_eq!(format_image_name("red_sneakers.jpeg"), "Red Sneakers");
        assert_eq!(format_image_name("plain"), "Plain");
    }
}
