use serde::{Deserialize, Serialize};

/// Store holding recipient wishlist requests.
pub const WISHLIST_STORE: &str = "wishlist";
/// Store holding actor profiles.
pub const USERS_STORE: &str = "users";

/// The four donation categories. Each category is backed by its own
/// independent store; the mapping below is the single source of truth
/// for store names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Food,
    Clothing,
    Monetary,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Food,
        Category::Clothing,
        Category::Monetary,
        Category::Other,
    ];

    pub fn store_name(self) -> &'static str {
        match self {
            Category::Food => "Food Donations",
            Category::Clothing => "Clothing Donations",
            Category::Monetary => "Monetary Donations",
            Category::Other => "Other donations",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Clothing => "Clothing",
            Category::Monetary => "Monetary",
            Category::Other => "Other",
        }
    }

    /// Parses the labels found in stored documents. Older write paths used
    /// the mobile app's vocabulary ("clothes", "money"), so those are
    /// accepted as aliases.
    pub fn parse(value: &str) -> Option<Category> {
        match value.trim().to_ascii_lowercase().as_str() {
            "food" => Some(Category::Food),
            "clothing" | "clothes" => Some(Category::Clothing),
            "monetary" | "money" => Some(Category::Monetary),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}
