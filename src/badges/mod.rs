//! Achievement badges derived from the current dish set.
//!
//! Badges are never persisted; they are recomputed from a snapshot on every request.

use serde::Serialize;

use crate::models::Dish;

const MAIN_DISH_KEYWORDS: [&str; 5] = ["turkey", "ham", "roast", "brisket", "prime rib"];

const DESSERT_KEYWORDS: [&str; 10] = [
    "pie",
    "cake",
    "cookie",
    "brownie",
    "dessert",
    "pudding",
    "tart",
    "cheesecake",
    "cobbler",
    "crisp",
];

/// Fewest total reactions that can earn MVP.
const MVP_MIN_REACTIONS: u64 = 3;

/// A derived achievement label.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Badge {
    pub emoji: &'static str,
    pub label: &'static str,
}

pub const FIRST: Badge = Badge {
    emoji: "🥇",
    label: "First!",
};
pub const DOUBLE_THREAT: Badge = Badge {
    emoji: "🎯",
    label: "Double Threat",
};
pub const MAIN_EVENT: Badge = Badge {
    emoji: "🦃",
    label: "Main Event",
};
pub const SWEET_TOOTH: Badge = Badge {
    emoji: "🍰",
    label: "Sweet Tooth",
};
pub const MVP: Badge = Badge {
    emoji: "⭐",
    label: "MVP",
};

/// Compute the badges `dish` earns within `all_dishes`, in display order.
///
/// Unclaimed dishes earn nothing. "First!" goes to the claimed dish with the
/// oldest `created_at`; claim time is not recorded, so creation time stands in
/// for it. Ties keep the earliest dish in `all_dishes` order.
pub fn evaluate(dish: &Dish, all_dishes: &[Dish]) -> Vec<Badge> {
    let mut badges = Vec::new();

    let Some(owner) = dish.claimed_by.as_deref() else {
        return badges;
    };

    let first_claimed = all_dishes
        .iter()
        .filter(|d| d.is_claimed())
        .reduce(|best, d| if d.created_at < best.created_at { d } else { best });
    if first_claimed.is_some_and(|first| first.id == dish.id) {
        badges.push(FIRST);
    }

    let owned = all_dishes
        .iter()
        .filter(|d| d.claimed_by.as_deref() == Some(owner))
        .count();
    if owned >= 2 {
        badges.push(DOUBLE_THREAT);
    }

    let name = dish.dish_name.to_lowercase();
    if MAIN_DISH_KEYWORDS.iter().any(|k| name.contains(k)) {
        badges.push(MAIN_EVENT);
    }
    if DESSERT_KEYWORDS.iter().any(|k| name.contains(k)) {
        badges.push(SWEET_TOOTH);
    }

    let max_reactions = all_dishes
        .iter()
        .map(Dish::total_reactions)
        .max()
        .unwrap_or(0);
    if max_reactions > 0
        && max_reactions >= MVP_MIN_REACTIONS
        && dish.total_reactions() == max_reactions
    {
        badges.push(MVP);
    }

    badges
}
