//! The farm's product catalog.
//!
//! Cart prices always come from here, never from the client.

use rust_decimal::Decimal;
use sakria_core::{ProductId, ProductRef};

pub const ACCOMMODATION: &str = "Accommodation";

/// Products and stays offered on the site.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<ProductRef>,
}

impl Catalog {
    #[must_use]
    pub const fn new(products: Vec<ProductRef>) -> Self {
        Self { products }
    }

    /// The farm shop and the homestay rooms (priced per night).
    #[must_use]
    pub fn farm() -> Self {
        let item = |id: i32, name: &str, price: i64, category: &str, in_stock: bool, about: &str| {
            ProductRef {
                id: ProductId::new(id),
                name: name.to_string(),
                unit_price: Decimal::from(price),
                category: category.to_string(),
                organic: category != ACCOMMODATION,
                in_stock,
                image: Some(format!(
                    "/images/{}.jpg",
                    name.to_lowercase().replace(' ', "-")
                )),
                description: Some(about.to_string()),
            }
        };

        Self::new(vec![
            item(1, "Organic Honey", 2074, "Pantry", true, "Pure wildflower honey from our beehives"),
            item(2, "Fresh Herbs Bundle", 1078, "Fresh Produce", true, "Basil, rosemary, thyme, and oregano"),
            item(3, "Seasonal Vegetables", 1576, "Fresh Produce", true, "Farm-fresh seasonal produce basket"),
            item(4, "Artisan Goat Cheese", 1410, "Dairy", true, "Creamy goat cheese made from our happy goats"),
            item(5, "Free-Range Eggs", 746, "Dairy", true, "Fresh eggs from our pasture-raised chickens"),
            item(6, "Lavender Essential Oil", 2738, "Wellness", false, "Pure lavender oil distilled from our fields"),
            item(101, "The Farmhouse Suite", 12450, ACCOMMODATION, true, "Spacious suite in our historic farmhouse with panoramic valley views"),
            item(102, "Cozy Cottage", 9960, ACCOMMODATION, true, "Intimate cottage perfect for couples, surrounded by herb gardens"),
            item(103, "Barn Loft", 14940, ACCOMMODATION, true, "Converted barn loft with rustic charm and modern amenities"),
        ])
    }

    /// All products, optionally restricted to one category (case-insensitive).
    pub fn list<'a>(&'a self, category: Option<&'a str>) -> impl Iterator<Item = &'a ProductRef> {
        self.products.iter().filter(move |p| {
            category.is_none_or(|c| p.category.eq_ignore_ascii_case(c.trim()))
        })
    }

    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&ProductRef> {
        self.products.iter().find(|p| p.id == id)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::farm()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_farm_catalog_lookup() {
        let catalog = Catalog::farm();
        let honey = catalog.get(ProductId::new(1)).unwrap();
        assert_eq!(honey.name, "Organic Honey");
        assert_eq!(honey.unit_price, Decimal::from(2074));
        assert_eq!(honey.image.as_deref(), Some("/images/organic-honey.jpg"));
        assert!(catalog.get(ProductId::new(42)).is_none());
    }

    #[test]
    fn test_lavender_is_out_of_stock() {
        let catalog = Catalog::farm();
        assert!(!catalog.get(ProductId::new(6)).unwrap().in_stock);
    }

    #[test]
    fn test_list_by_category() {
        let catalog = Catalog::farm();
        assert_eq!(catalog.list(None).count(), 9);
        assert_eq!(catalog.list(Some("dairy")).count(), 2);

        let stays: Vec<_> = catalog.list(Some(ACCOMMODATION)).collect();
        assert_eq!(stays.len(), 3);
        assert!(stays.iter().all(|p| !p.organic));
    }
}
