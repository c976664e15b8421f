pub const OTHER: &str = "Other";

/// Ordered: earlier categories win ties.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Coverage",
        &["coverage", "signal", "reception", "dead zone", "no service", "bars", "network"],
    ),
    (
        "Price",
        &[
            "price", "cost", "bill", "billing", "expensive", "cheap", "affordable", "plan",
            "payment",
        ],
    ),
    (
        "Customer Service",
        &[
            "service",
            "support",
            "representative",
            "agent",
            "help",
            "customer service",
            "cs",
        ],
    ),
    (
        "Network Speed",
        &["speed", "slow", "fast", "data", "internet", "streaming", "download", "upload"],
    ),
    (
        "Reliability",
        &["reliable", "unreliable", "outage", "down", "working", "broken", "issue", "problem"],
    ),
];

/// Picks the category with the most distinct keyword hits.
pub fn categorize(text: &str) -> &'static str {
    if text.is_empty() {
        return OTHER;
    }

    let lower = text.to_lowercase();
    let mut best: Option<(&'static str, usize)> = None;

    for (category, keywords) in CATEGORY_KEYWORDS {
        let hits = keywords.iter().filter(|kw| lower.contains(*kw)).count();
        if hits == 0 {
            continue;
        }
        match best {
            Some((_, top)) if top >= hits => {}
            _ => best = Some((category, hits)),
        }
    }

    best.map(|(category, _)| category).unwrap_or(OTHER)
}
