//! Seed files.
//!
//! A seed file is a JSON array of `{ "imageId": ..., "description": ... }`
//! entries. Products built from seeds get a fresh random id, a display name
//! derived from the image file name and a random price. Entries may pin any
//! of `id`, `name` or `price` to make a corpus reproducible.

use std::fs;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{KioskError, Result};
use crate::product::{Product, format_image_name};

/// One entry of a seed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSeed {
    pub image_id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl ProductSeed {
    pub fn new(image_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            description: description.into(),
            id: None,
            name: None,
            price: None,
        }
    }
}

/// Parse the contents of a seed file.
pub fn parse_seeds(json: &str) -> Result<Vec<ProductSeed>> {
    let seeds: Vec<ProductSeed> = serde_json::from_str(json)?;
    for (pos, seed) in seeds.iter().enumerate() {
        if seed.image_id.trim().is_empty() {
            return Err(KioskError::storage(format!(
                "seed entry {pos} has an empty imageId"
            )));
        }
    }
    Ok(seeds)
}

/// Read and parse a seed file.
pub fn load_seed_file<P: AsRef<Path>>(path: P) -> Result<Vec<ProductSeed>> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_seeds(&contents)
}

/// Random price in `[1.00, 1000.00]`, rounded to cents.
pub fn random_price<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let cents: u32 = rng.random_range(100..=100_000);
    f64::from(cents) / 100.0
}

impl Product {
    /// Build a product from a seed entry.
    pub fn from_seed<R: Rng + ?Sized>(seed: &ProductSeed, rng: &mut R) -> Product {
        Product {
            id: seed
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: seed
                .name
                .clone()
                .unwrap_or_else(|| format_image_name(&seed.image_id)),
            description: seed.description.clone(),
            price: seed.price.unwrap_or_else(|| random_price(rng)),
            image_id: seed.image_id.clone(),
        }
    }
}

/// Build products for every seed with a thread-local RNG.
pub fn products_from_seeds(seeds: &[ProductSeed]) -> Vec<Product> {
    let mut rng = rand::rng();
    seeds
        .iter()
        .map(|seed| Product::from_seed(seed, &mut rng))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_from_seed_derives_fields() {
        let mut rng = StdRng::seed_from_u64(7);
        let seed = ProductSeed::new("dark_down_jacket_1.png", "warm winter coat");
        let product = Product::from_seed(&seed, &mut rng);

        assert_eq!(product.name, "Dark Down Jacket 1");
        assert_eq!(product.description, "warm winter coat");
        assert_eq!(product.image_id, "dark_down_jacket_1.png");
        assert!(Uuid::parse_str(&product.id).is_ok());
        assert!((1.0..=1000.0).contains(&product.price));
        assert_eq!((product.price * 100.0).round() / 100.0, product.price);
        assert!(product.validate().is_ok());
    }

    #[test]
    fn test_ids_are_not_content_derived() {
        let mut rng = StdRng::seed_from_u64(7);
        let seed = ProductSeed::new("hat.png", "blue hat");
        let first = Product::from_seed(&seed, &mut rng);
        let second = Product::from_seed(&seed, &mut rng);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_pinned_fields_win() {
        let mut rng = StdRng::seed_from_u64(1);
        let seeds = parse_seeds(
            r#"[{"imageId": "hat.png", "description": "blue hat", "id": "h1", "name": "Hat", "price": 9.5}]"#,
        )
        .unwrap();
        let product = Product::from_seed(&seeds[0], &mut rng);
        assert_eq!(product, Product::new("h1", "Hat", "blue hat", 9.5, "hat.png"));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(parse_seeds("{}"), Err(KioskError::Json(_))));
        assert!(parse_seeds(r#"[{"imageId": " ", "description": "x"}]"#).is_err());
        assert!(parse_seeds(r#"[{"description": "x"}]"#).is_err());
    }

    #[test]
    fn test_load_seed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"imageId": "red_sneakers.png", "description": "running shoes"}}]"#
        )
        .unwrap();

        let seeds = load_seed_file(file.path()).unwrap();
        assert_eq!(seeds, vec![ProductSeed::new("red_sneakers.png", "running shoes")]);
        assert_eq!(products_from_seeds(&seeds)[0].name, "Red Sneakers");
    }

    #[test]
    fn test_random_price_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let price = random_price(&mut rng);
            assert!((1.0..=1000.0).contains(&price));
        }
    }
}
