//! Placeholder records handed to the generator so pages have real-looking
//! content and image URLs that resolve

use crate::error::Result;
use chrono::{Duration, Local};
use forge_types::{Archetype, ChatTurn};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

/// Prefix of the system turn carrying the records
pub const SAMPLE_DATA_MARKER: &str = "SAMPLE_DATA:";

const PRODUCT_COUNT: usize = 12;
const USER_COUNT: usize = 4;
const POST_COUNT: usize = 6;

/// Image used when no keyword matches
const DEFAULT_IMAGE: &str =
    "https://images.unsplash.com/photo-1498050108023-c5249f4df085?w=800&h=600&fit=crop";

/// Curated Unsplash photos by keyword
const IMAGE_MAP: &[(&str, &str)] = &[
    (
        "laptop",
        "https://images.unsplash.com/photo-1496181133206-80ce9b88a853?w=800&h=600&fit=crop",
    ),
    (
        "smartphone",
        "https://images.unsplash.com/photo-1511707171634-5f897ff02aa9?w=800&h=600&fit=crop",
    ),
    (
        "headphones",
        "https://images.unsplash.com/photo-1505740420928-5e560c06d30e?w=800&h=600&fit=crop",
    ),
    (
        "pizza",
        "https://images.unsplash.com/photo-1565299624946-b28f40a0ae38?w=800&h=600&fit=crop",
    ),
    (
        "burger",
        "https://images.unsplash.com/photo-1568901346375-23c9450c58cd?w=800&h=600&fit=crop",
    ),
    (
        "coffee",
        "https://images.unsplash.com/photo-1495474472287-4d71bcdd2085?w=800&h=600&fit=crop",
    ),
];

const ADJECTIVES: &[&str] = &[
    "Sleek", "Compact", "Premium", "Classic", "Modern", "Rustic", "Handmade", "Ergonomic",
    "Refined", "Vintage", "Smart", "Fresh",
];

const MATERIALS: &[&str] = &[
    "Steel", "Bamboo", "Cotton", "Granite", "Leather", "Aluminum", "Oak", "Ceramic",
];

const ELECTRONICS: &[&str] = &[
    "Laptop", "Smartphone", "Headphones", "Tablet", "Speaker", "Smartwatch", "Camera",
    "Keyboard",
];

const FOOD: &[&str] = &[
    "Pizza", "Burger", "Coffee", "Salad", "Pasta", "Tacos", "Ramen", "Smoothie",
];

const GOODS: &[&str] = &[
    "Chair", "Lamp", "Backpack", "Notebook", "Mug", "Jacket", "Wallet", "Planter",
];

const FIRST_NAMES: &[&str] = &[
    "Ava", "Liam", "Maya", "Noah", "Zoe", "Ethan", "Iris", "Leo", "Nora", "Kai",
];

const LAST_NAMES: &[&str] = &[
    "Chen", "Garcia", "Patel", "Okafor", "Novak", "Silva", "Kim", "Larsen", "Haddad", "Moreau",
];

const ROLES: &[&str] = &[
    "Product designer",
    "Frontend engineer",
    "Photographer",
    "Food writer",
    "Startup founder",
    "Travel blogger",
];

const TOPICS: &[&str] = &[
    "Designing for Dark Mode",
    "A Week of Slow Travel",
    "Five Recipes for Busy Evenings",
    "What Makes a Landing Page Convert",
    "Building a Home Studio on a Budget",
    "Lessons from Shipping a Side Project",
    "The Case for Fewer Meetings",
    "Choosing Your First Mirrorless Camera",
];

const EXCERPTS: &[&str] = &[
    "A practical walkthrough with the mistakes we made along the way and what we would do differently next time.",
    "Short, opinionated notes collected over a year of trying things out and keeping what worked.",
    "Everything you need to get started, without the jargon, plus a checklist you can reuse.",
    "We asked a dozen people how they approach it and found more agreement than we expected.",
];

/// Kind of records to seed, inferred from the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleCategory {
    Electronics,
    Food,
    Blog,
    Portfolio,
    General,
}

impl SampleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleCategory::Electronics => "electronics",
            SampleCategory::Food => "food",
            SampleCategory::Blog => "blog",
            SampleCategory::Portfolio => "portfolio",
            SampleCategory::General => "general",
        }
    }

    /// Pick a category from the request text, falling back to the archetype
    pub fn infer(message: &str, archetype: Archetype) -> Self {
        let text = message.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| text.contains(*w));

        if mentions(&["e-commerce", "shop", "store", "products"][..]) {
            SampleCategory::Electronics
        } else if mentions(&["restaurant", "food", "menu"][..]) {
            SampleCategory::Food
        } else if mentions(&["blog", "articles", "news"][..]) {
            SampleCategory::Blog
        } else if mentions(&["portfolio", "photographer"][..]) {
            SampleCategory::Portfolio
        } else {
            match archetype {
                Archetype::Ecommerce => SampleCategory::Electronics,
                Archetype::Blog => SampleCategory::Blog,
                _ => SampleCategory::General,
            }
        }
    }

    fn product_nouns(&self) -> &'static [&'static str] {
        match self {
            SampleCategory::Electronics => ELECTRONICS,
            SampleCategory::Food => FOOD,
            _ => GOODS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleProduct {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub category: String,
    pub price: u32,
    pub description: String,
    pub image: String,
    pub image_alt: String,
    pub rating: f32,
    pub reviews: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleUser {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub bio: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePost {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub author: String,
    pub date: String,
    pub reading_time: String,
}

/// Records the generator may use in place of lorem ipsum
#[derive(Debug, Clone, Serialize)]
pub struct SampleData {
    pub products: Vec<SampleProduct>,
    pub users: Vec<SampleUser>,
    pub posts: Vec<SamplePost>,
}

impl SampleData {
    pub fn for_request(message: &str, archetype: Archetype) -> Self {
        let category = SampleCategory::infer(message, archetype);
        let mut rng = rand::thread_rng();
        Self {
            products: (0..PRODUCT_COUNT).map(|_| product(&mut rng, category)).collect(),
            users: (0..USER_COUNT).map(|_| user(&mut rng)).collect(),
            posts: (0..POST_COUNT).map(|_| post(&mut rng)).collect(),
        }
    }

    /// System turn placed between the history and the user's message
    pub fn to_turn(&self) -> Result<ChatTurn> {
        let json = serde_json::to_string_pretty(self)?;
        Ok(ChatTurn::system(format!("{}\n{}", SAMPLE_DATA_MARKER, json)))
    }
}

/// Curated image for a keyword such as a product name
pub fn select_image(keyword: &str) -> &'static str {
    let keyword = keyword.to_lowercase();
    IMAGE_MAP
        .iter()
        .find(|(key, _)| keyword.contains(key))
        .map(|(_, url)| *url)
        .unwrap_or(DEFAULT_IMAGE)
}

/// Lower-case, hyphen-separated form of a title
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn pick<'a, R: Rng>(rng: &mut R, words: &'a [&'a str]) -> &'a str {
    words.choose(rng).copied().unwrap_or_default()
}

fn product<R: Rng>(rng: &mut R, category: SampleCategory) -> SampleProduct {
    let noun = pick(rng, category.product_nouns());
    let name = format!("{} {} {}", pick(rng, ADJECTIVES), pick(rng, MATERIALS), noun);
    let category = category.as_str().to_string();
    SampleProduct {
        id: uuid::Uuid::new_v4().to_string(),
        slug: slugify(&name),
        price: rng.gen_range(5..2000),
        description: format!(
            "The {} is built for everyday use, with a finish that holds up and a design that fits anywhere.",
            name.to_lowercase()
        ),
        image: select_image(&name).to_string(),
        image_alt: format!("{} - {}", category, name),
        rating: (rng.gen_range(30..=50) as f32) / 10.0,
        reviews: rng.gen_range(0..2000),
        category,
        name,
    }
}

fn user<R: Rng>(rng: &mut R) -> SampleUser {
    let first = pick(rng, FIRST_NAMES);
    let last = pick(rng, LAST_NAMES);
    let username = format!("{}{}{}", first.to_lowercase(), last.to_lowercase(), rng.gen_range(1..100));
    SampleUser {
        id: uuid::Uuid::new_v4().to_string(),
        name: format!("{} {}", first, last),
        email: format!("{}@example.com", username),
        avatar: format!("https://i.pravatar.cc/150?u={}", rng.gen_range(100_000..1_000_000)),
        bio: pick(rng, ROLES).to_string(),
        username,
    }
}

fn post<R: Rng>(rng: &mut R) -> SamplePost {
    let title = pick(rng, TOPICS).to_string();
    let date = Local::now() - Duration::days(rng.gen_range(0..30));
    SamplePost {
        id: uuid::Uuid::new_v4().to_string(),
        slug: slugify(&title),
        excerpt: pick(rng, EXCERPTS).to_string(),
        author: format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES)),
        date: date.to_rfc3339(),
        reading_time: format!("{} min read", rng.gen_range(3..=12)),
        title,
    }
}
